use serde::{Deserialize, Serialize};

use crate::domain::{
    Amount, Balances, Expense, ExpenseCategory, LedgerAnomaly, Participant, Roster,
    SETTLED_EPSILON, Settlement,
};

/// Dashboard-style overview of the trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSummary {
    pub home_currency: String,
    pub traveler_count: usize,
    pub expense_count: usize,
    pub total_spent: Amount,
    pub categories: Vec<CategorySummary>,
    pub travelers: Vec<TravelerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ExpenseCategory,
    pub total: Amount,
    pub count: i64,
    pub average: Amount,
    pub percentage: f64,
}

/// What one traveler put in versus what they consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelerSummary {
    pub traveler: Participant,
    pub paid: Amount,
    pub share: Amount,
    pub net: Amount,
}

/// Balances and the payments that settle them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub home_currency: String,
    pub balances: Balances,
    pub settlements: Vec<Settlement>,
    pub anomalies: Vec<LedgerAnomaly>,
}

/// Result of verifying that the ledger balances and the plan settles it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub traveler_count: usize,
    pub expense_count: usize,
    /// Sum of all balances; zero when every name is known
    pub balance_total: Amount,
    /// Largest absolute balance left after applying the settlement plan
    pub max_residual: Amount,
    pub settlement_count: usize,
    pub anomalies: Vec<LedgerAnomaly>,
}

impl CheckReport {
    /// Largest leftover the greedy plan can legitimately leave: each dropped
    /// party may strand up to one epsilon on whoever remains.
    pub fn residual_tolerance(&self) -> Amount {
        SETTLED_EPSILON * self.traveler_count.max(1) as Amount
    }

    pub fn is_healthy(&self) -> bool {
        self.anomalies.is_empty()
            && self.balance_total.abs() < 1e-6
            && self.max_residual <= self.residual_tolerance()
    }
}

/// Paid and consumed totals per roster member. Follows the same filtering
/// as the ledger aggregation, so `net` matches the computed balance.
pub fn traveler_breakdown(roster: &Roster, expenses: &[Expense]) -> Vec<TravelerSummary> {
    let mut rows: Vec<TravelerSummary> = roster
        .iter()
        .map(|p| TravelerSummary {
            traveler: p.clone(),
            paid: 0.0,
            share: 0.0,
            net: 0.0,
        })
        .collect();

    let index_of = |p: &Participant, rows: &[TravelerSummary]| {
        rows.binary_search_by(|row| row.traveler.cmp(p)).ok()
    };

    for expense in expenses {
        let split = roster.restrict(&expense.split);
        if split.is_empty() {
            continue;
        }
        if let Some(i) = index_of(&expense.payer, &rows) {
            rows[i].paid += expense.amount;
        }
        let share = expense.amount / split.len() as Amount;
        for p in &split {
            if let Some(i) = index_of(p, &rows) {
                rows[i].share += share;
            }
        }
    }

    for row in &mut rows {
        row.net = row.paid - row.share;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{compute_balances, parse_split_list};

    fn expense(payer: &str, amount: Amount, split: &str) -> Expense {
        Expense::new(Participant::new(payer), amount, parse_split_list(split))
    }

    #[test]
    fn test_breakdown_matches_balances() {
        let roster = Roster::from_names(["Asha", "Ben", "Chen"]);
        let expenses = vec![
            expense("Asha", 300.0, "Asha,Ben,Chen"),
            expense("Ben", 120.0, "Ben,Chen"),
            expense("Zed", 50.0, "Asha"),
            expense("Chen", 80.0, "Zed"),
        ];

        let breakdown = traveler_breakdown(&roster, &expenses);
        let balances = compute_balances(&roster, &expenses);

        assert_eq!(breakdown.len(), 3);
        for row in &breakdown {
            let balance = balances.get(&row.traveler).unwrap();
            assert!((row.net - balance).abs() < 1e-9, "{}", row.traveler);
        }

        let asha = &breakdown[0];
        assert_eq!(asha.traveler, Participant::new("Asha"));
        assert!((asha.paid - 300.0).abs() < 1e-9);
        assert!((asha.share - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_empty_roster() {
        assert!(traveler_breakdown(&Roster::new(), &[expense("A", 1.0, "A")]).is_empty());
    }

    #[test]
    fn test_check_report_health() {
        let report = CheckReport {
            traveler_count: 2,
            expense_count: 1,
            balance_total: 0.0,
            max_residual: 0.0,
            settlement_count: 1,
            anomalies: vec![],
        };
        assert!(report.is_healthy());

        let drifted = CheckReport {
            balance_total: -100.0,
            ..report
        };
        assert!(!drifted.is_healthy());
    }

    #[test]
    fn test_check_report_allows_stranded_cents() {
        let report = CheckReport {
            traveler_count: 4,
            expense_count: 12,
            balance_total: 0.0,
            max_residual: 0.01,
            settlement_count: 3,
            anomalies: vec![],
        };
        assert!(report.is_healthy());

        let three_cents = CheckReport {
            max_residual: 0.03,
            ..report.clone()
        };
        assert!(three_cents.is_healthy());

        let beyond = CheckReport {
            max_residual: 0.05,
            ..report
        };
        assert!(!beyond.is_healthy());
    }
}
