use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Amount, Expense, ExpenseId, Participant, Roster, is_settled};

/// Net position of every traveler: positive is owed money, negative owes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(BTreeMap<Participant, Amount>);

impl Balances {
    /// Every roster member at zero.
    pub fn zeroed(roster: &Roster) -> Self {
        Self(roster.iter().map(|p| (p.clone(), 0.0)).collect())
    }

    pub fn get(&self, participant: &Participant) -> Option<Amount> {
        self.0.get(participant).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in participant name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Participant, Amount)> {
        self.0.iter().map(|(p, amount)| (p, *amount))
    }

    /// Sum of all balances. Zero (within rounding) for a consistent ledger.
    pub fn total(&self) -> Amount {
        self.0.values().sum()
    }

    /// Number of travelers whose balance is outside the settled band.
    pub fn unsettled_count(&self) -> usize {
        self.0.values().filter(|amount| !is_settled(**amount)).count()
    }

    pub fn is_settled(&self) -> bool {
        self.unsettled_count() == 0
    }

    pub(crate) fn adjust(&mut self, participant: &Participant, delta: Amount) {
        if let Some(balance) = self.0.get_mut(participant) {
            *balance += delta;
        }
    }
}

impl FromIterator<(Participant, Amount)> for Balances {
    fn from_iter<I: IntoIterator<Item = (Participant, Amount)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Something the aggregator had to paper over while reading the expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerAnomaly {
    /// No split member is a known traveler; the expense was ignored.
    EmptySplit { expense: ExpenseId },
    /// The payer is not a known traveler; the split members were still
    /// debited but nobody was credited.
    UnknownPayer {
        expense: ExpenseId,
        payer: Participant,
        amount: Amount,
    },
    /// Split members dropped because they are not known travelers. The
    /// remaining members carry the whole amount.
    UnknownSplitMembers {
        expense: ExpenseId,
        names: Vec<Participant>,
    },
}

/// Balances plus the anomalies encountered while computing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    pub balances: Balances,
    pub anomalies: Vec<LedgerAnomaly>,
}

/// Fold the expense history into per-traveler balances.
///
/// Names outside `roster` are filtered rather than rejected: an expense with
/// no known split member is skipped, an unknown payer is never credited.
/// Every such case is reported in [`LedgerOutcome::anomalies`].
pub fn aggregate(roster: &Roster, expenses: &[Expense]) -> LedgerOutcome {
    let mut balances = Balances::zeroed(roster);
    let mut anomalies = Vec::new();

    for expense in expenses {
        let split = roster.restrict(&expense.split);
        if split.is_empty() {
            anomalies.push(LedgerAnomaly::EmptySplit { expense: expense.id });
            continue;
        }

        let unknown: Vec<Participant> = expense
            .split
            .iter()
            .filter(|p| !roster.contains(p))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            anomalies.push(LedgerAnomaly::UnknownSplitMembers {
                expense: expense.id,
                names: unknown,
            });
        }

        let share = expense.amount / split.len() as Amount;

        if roster.contains(&expense.payer) {
            balances.adjust(&expense.payer, expense.amount);
        } else {
            anomalies.push(LedgerAnomaly::UnknownPayer {
                expense: expense.id,
                payer: expense.payer.clone(),
                amount: expense.amount,
            });
        }

        for participant in &split {
            balances.adjust(participant, -share);
        }
    }

    LedgerOutcome {
        balances,
        anomalies,
    }
}

/// Net balance per traveler for the given expenses.
pub fn compute_balances(roster: &Roster, expenses: &[Expense]) -> Balances {
    aggregate(roster, expenses).balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_split_list;

    fn expense(payer: &str, amount: Amount, split: &str) -> Expense {
        Expense::new(Participant::new(payer), amount, parse_split_list(split))
    }

    fn balance(balances: &Balances, name: &str) -> Amount {
        balances.get(&Participant::new(name)).unwrap()
    }

    fn assert_close(actual: Amount, expected: Amount) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_empty_roster_gives_empty_balances() {
        let balances = compute_balances(&Roster::new(), &[expense("A", 10.0, "A")]);
        assert!(balances.is_empty());
    }

    #[test]
    fn test_no_expenses_all_zero() {
        let roster = Roster::from_names(["A", "B"]);
        let balances = compute_balances(&roster, &[]);
        assert_eq!(balances.len(), 2);
        assert_eq!(balance(&balances, "A"), 0.0);
        assert!(balances.is_settled());
    }

    #[test]
    fn test_two_way_split() {
        let roster = Roster::from_names(["A", "B"]);
        let balances = compute_balances(&roster, &[expense("A", 100.0, "A,B")]);

        assert_close(balance(&balances, "A"), 50.0);
        assert_close(balance(&balances, "B"), -50.0);
    }

    #[test]
    fn test_three_way_split() {
        let roster = Roster::from_names(["A", "B", "C"]);
        let balances = compute_balances(&roster, &[expense("A", 300.0, "A,B,C")]);

        assert_close(balance(&balances, "A"), 200.0);
        assert_close(balance(&balances, "B"), -100.0);
        assert_close(balance(&balances, "C"), -100.0);
    }

    #[test]
    fn test_payer_outside_split() {
        let roster = Roster::from_names(["A", "B", "C"]);
        let balances = compute_balances(&roster, &[expense("A", 90.0, "B,C")]);

        assert_close(balance(&balances, "A"), 90.0);
        assert_close(balance(&balances, "B"), -45.0);
        assert_close(balance(&balances, "C"), -45.0);
    }

    #[test]
    fn test_unknown_only_split_is_skipped() {
        let roster = Roster::from_names(["A", "B"]);
        let zed = expense("A", 100.0, "Z");
        let outcome = aggregate(&roster, std::slice::from_ref(&zed));

        assert!(outcome.balances.iter().all(|(_, amount)| amount == 0.0));
        assert_eq!(
            outcome.anomalies,
            vec![LedgerAnomaly::EmptySplit { expense: zed.id }]
        );
    }

    #[test]
    fn test_unknown_payer_credit_is_dropped() {
        let roster = Roster::from_names(["A", "B"]);
        let stranger = expense("Z", 100.0, "A,B");
        let outcome = aggregate(&roster, std::slice::from_ref(&stranger));

        assert_close(balance(&outcome.balances, "A"), -50.0);
        assert_close(balance(&outcome.balances, "B"), -50.0);
        assert_close(outcome.balances.total(), -100.0);
        assert!(matches!(
            outcome.anomalies.as_slice(),
            [LedgerAnomaly::UnknownPayer { amount, .. }] if *amount == 100.0
        ));
    }

    #[test]
    fn test_unknown_split_member_is_filtered_out() {
        // The known members carry the whole amount between them.
        let roster = Roster::from_names(["A", "B"]);
        let outcome = aggregate(&roster, &[expense("A", 100.0, "A,B,Z")]);

        assert_close(balance(&outcome.balances, "A"), 50.0);
        assert_close(balance(&outcome.balances, "B"), -50.0);
        assert!(matches!(
            outcome.anomalies.as_slice(),
            [LedgerAnomaly::UnknownSplitMembers { names, .. }] if names == &vec![Participant::new("Z")]
        ));
    }

    #[test]
    fn test_duplicate_split_member_counts_once() {
        let roster = Roster::from_names(["A", "B"]);
        let balances = compute_balances(&roster, &[expense("A", 100.0, "B,B,A")]);

        assert_close(balance(&balances, "A"), 50.0);
        assert_close(balance(&balances, "B"), -50.0);
    }

    #[test]
    fn test_zero_amount_expense_is_harmless() {
        let roster = Roster::from_names(["A", "B"]);
        let balances = compute_balances(&roster, &[expense("A", 0.0, "A,B")]);
        assert!(balances.is_settled());
    }

    #[test]
    fn test_many_expenses_sum_to_zero() {
        let roster = Roster::from_names(["A", "B", "C", "D"]);
        let expenses = vec![
            expense("A", 1234.56, "A,B,C,D"),
            expense("B", 99.99, "A,C"),
            expense("C", 10.0, "B,C,D"),
            expense("D", 7777.77, "A,B,C"),
            expense("A", 0.03, "A,B,C,D"),
        ];
        let balances = compute_balances(&roster, &expenses);
        assert!(balances.total().abs() < 1e-6);
        assert_eq!(balances.unsettled_count(), 4);
    }
}
