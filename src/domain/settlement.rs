use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{Amount, Balances, Participant, is_settled};

/// One payment instruction: `from` pays `to` the given amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub from: Participant,
    pub to: Participant,
    pub amount: Amount,
}

/// Plan the payments that bring every balance back to zero.
///
/// Greedy matching: the largest creditor is paid by the largest debtor until
/// one side runs out. Ties go to the name that sorts first, so the plan is
/// reproducible. Balances that [`is_settled`] accepts are ignored.
///
/// If the balances do not sum to zero the loop still ends; whoever is left on
/// the longer side keeps the residual.
pub fn plan_settlements(balances: &Balances) -> Vec<Settlement> {
    let mut creditors: Vec<(Participant, Amount)> = Vec::new();
    let mut debtors: Vec<(Participant, Amount)> = Vec::new();

    for (participant, amount) in balances.iter() {
        if is_settled(amount) {
            continue;
        }
        if amount > 0.0 {
            creditors.push((participant.clone(), amount));
        } else {
            debtors.push((participant.clone(), amount));
        }
    }

    let mut settlements = Vec::with_capacity((creditors.len() + debtors.len()).saturating_sub(1));

    while !creditors.is_empty() && !debtors.is_empty() {
        let c = pick(&creditors, |a, b| a.total_cmp(&b));
        let d = pick(&debtors, |a, b| b.total_cmp(&a));

        let amount = creditors[c].1.min(-debtors[d].1);
        settlements.push(Settlement {
            from: debtors[d].0.clone(),
            to: creditors[c].0.clone(),
            amount,
        });

        creditors[c].1 -= amount;
        debtors[d].1 += amount;

        if is_settled(creditors[c].1) {
            creditors.swap_remove(c);
        }
        if is_settled(debtors[d].1) {
            debtors.swap_remove(d);
        }
    }

    settlements
}

/// Index of the entry that ranks highest under `by`, lowest name on ties.
fn pick(side: &[(Participant, Amount)], by: impl Fn(Amount, Amount) -> Ordering) -> usize {
    let mut best = 0;
    for (i, (name, amount)) in side.iter().enumerate().skip(1) {
        let (best_name, best_amount) = &side[best];
        match by(*amount, *best_amount) {
            Ordering::Greater => best = i,
            Ordering::Equal if name < best_name => best = i,
            _ => {}
        }
    }
    best
}

/// Balances after every settlement has been paid.
pub fn apply_settlements(balances: &Balances, settlements: &[Settlement]) -> Balances {
    let mut adjusted = balances.clone();
    for settlement in settlements {
        adjusted.adjust(&settlement.from, settlement.amount);
        adjusted.adjust(&settlement.to, -settlement.amount);
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Expense, Roster, SETTLED_EPSILON, compute_balances, parse_split_list};
    use proptest::prelude::*;

    fn balances(entries: &[(&str, Amount)]) -> Balances {
        entries
            .iter()
            .map(|(name, amount)| (Participant::new(name), *amount))
            .collect()
    }

    fn transfer(from: &str, to: &str, amount: Amount) -> Settlement {
        Settlement {
            from: Participant::new(from),
            to: Participant::new(to),
            amount,
        }
    }

    #[test]
    fn test_two_party_settlement() {
        let plan = plan_settlements(&balances(&[("A", 50.0), ("B", -50.0)]));
        assert_eq!(plan, vec![transfer("B", "A", 50.0)]);
    }

    #[test]
    fn test_one_creditor_two_debtors_ties_break_by_name() {
        let plan = plan_settlements(&balances(&[("A", 200.0), ("C", -100.0), ("B", -100.0)]));
        assert_eq!(
            plan,
            vec![transfer("B", "A", 100.0), transfer("C", "A", 100.0)]
        );
    }

    #[test]
    fn test_largest_debtor_pays_largest_creditor_first() {
        let plan = plan_settlements(&balances(&[
            ("A", 70.0),
            ("B", 30.0),
            ("C", -20.0),
            ("D", -80.0),
        ]));
        assert_eq!(
            plan,
            vec![
                transfer("D", "A", 70.0),
                transfer("C", "B", 20.0),
                transfer("D", "B", 10.0),
            ]
        );
    }

    #[test]
    fn test_already_settled_is_empty() {
        let plan = plan_settlements(&balances(&[("A", 0.004), ("B", -0.009), ("C", 0.0)]));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_one_cent_balance_counts_as_settled() {
        let input = balances(&[("A", 0.01), ("B", -0.01)]);
        assert_eq!(input.unsettled_count(), 0);
        assert!(input.is_settled());
        assert!(plan_settlements(&input).is_empty());

        let mixed = balances(&[("A", 20.0), ("B", -19.99), ("C", -0.01)]);
        assert_eq!(mixed.unsettled_count(), 2);
        let plan = plan_settlements(&mixed);
        assert_eq!(plan, vec![transfer("B", "A", 19.99)]);
    }

    #[test]
    fn test_empty_balances_is_empty() {
        assert!(plan_settlements(&Balances::default()).is_empty());
    }

    #[test]
    fn test_residual_stays_with_last_party() {
        // Sums to -100: the debtors cannot all be paid off.
        let input = balances(&[("A", 50.0), ("B", -75.0), ("C", -75.0)]);
        let plan = plan_settlements(&input);
        assert_eq!(plan, vec![transfer("B", "A", 50.0)]);

        let after = apply_settlements(&input, &plan);
        assert!((after.get(&Participant::new("B")).unwrap() + 25.0).abs() < 1e-9);
        assert!((after.get(&Participant::new("C")).unwrap() + 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let input = balances(&[("A", 10.0), ("B", 10.0), ("C", -10.0), ("D", -10.0)]);
        assert_eq!(plan_settlements(&input), plan_settlements(&input));
        assert_eq!(
            plan_settlements(&input),
            vec![transfer("C", "A", 10.0), transfer("D", "B", 10.0)]
        );
    }

    #[test]
    fn test_end_to_end_from_expenses() {
        let roster = Roster::from_names(["A", "B"]);
        let expenses = vec![Expense::new(
            Participant::new("A"),
            100.0,
            parse_split_list("A,B"),
        )];
        let plan = plan_settlements(&compute_balances(&roster, &expenses));
        assert_eq!(plan, vec![transfer("B", "A", 50.0)]);
    }

    #[test]
    fn test_apply_settlements_zeroes_balances() {
        let input = balances(&[("A", 200.0), ("B", -100.0), ("C", -100.0)]);
        let after = apply_settlements(&input, &plan_settlements(&input));
        assert!(after.is_settled());
    }

    /// (payer, amount in cents, split mask) rows over `travelers` people.
    fn rows(travelers: usize) -> impl Strategy<Value = Vec<(usize, u32, Vec<bool>)>> {
        prop::collection::vec(
            (
                0..travelers,
                1u32..1_000_000u32,
                prop::collection::vec(any::<bool>(), travelers),
            ),
            0..40,
        )
    }

    /// Build a ledger. With `whole_shares` every share is a whole currency
    /// unit, so no balance can land near the edge of the settled band.
    fn ledger(
        travelers: usize,
        rows: Vec<(usize, u32, Vec<bool>)>,
        whole_shares: bool,
    ) -> (Roster, Vec<Expense>) {
        let names: Vec<Participant> = (0..travelers)
            .map(|i| Participant::new(format!("T{i}")))
            .collect();
        let roster: Roster = names.iter().cloned().collect();
        let expenses = rows
            .into_iter()
            .map(|(payer, cents, mask)| {
                let split: Vec<Participant> = names
                    .iter()
                    .zip(&mask)
                    .filter(|(_, included)| **included)
                    .map(|(p, _)| p.clone())
                    .collect();
                let cents = if whole_shares {
                    (cents / 100 + 1) as Amount * 100.0 * split.len().max(1) as Amount
                } else {
                    cents as Amount
                };
                Expense::new(names[payer].clone(), cents / 100.0, split)
            })
            .collect();
        (roster, expenses)
    }

    fn whole_share_ledger() -> impl Strategy<Value = (Roster, Vec<Expense>)> {
        (2usize..8).prop_flat_map(|n| rows(n).prop_map(move |rows| ledger(n, rows, true)))
    }

    fn any_ledger() -> impl Strategy<Value = (Roster, Vec<Expense>)> {
        (2usize..8).prop_flat_map(|n| rows(n).prop_map(move |rows| ledger(n, rows, false)))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// With every name known, balances sum to zero.
        #[test]
        fn balances_are_conserved((roster, expenses) in any_ledger()) {
            let balances = compute_balances(&roster, &expenses);
            prop_assert!(balances.total().abs() < 1e-6);
        }

        /// Paying out the plan settles everyone, with positive amounts only
        /// and at most one payment fewer than there are unsettled travelers.
        #[test]
        fn settlements_zero_every_balance((roster, expenses) in whole_share_ledger()) {
            let balances = compute_balances(&roster, &expenses);
            let plan = plan_settlements(&balances);

            prop_assert!(plan.iter().all(|s| s.amount > 0.0));
            prop_assert!(plan.iter().all(|s| s.from != s.to));
            prop_assert!(plan.len() <= balances.unsettled_count().saturating_sub(1));

            let after = apply_settlements(&balances, &plan);
            for (participant, amount) in after.iter() {
                prop_assert!(is_settled(amount), "{} left at {}", participant, amount);
            }
        }

        /// Sub-cent shares can strand a little in the settled band; whatever
        /// is left over is bounded by one epsilon per traveler.
        #[test]
        fn leftovers_stay_within_roster_tolerance((roster, expenses) in any_ledger()) {
            let balances = compute_balances(&roster, &expenses);
            let plan = plan_settlements(&balances);
            let tolerance = SETTLED_EPSILON * roster.len() as Amount;

            prop_assert!(plan.iter().all(|s| s.amount > 0.0));
            prop_assert!(plan.len() <= balances.unsettled_count().saturating_sub(1));

            let after = apply_settlements(&balances, &plan);
            for (participant, amount) in after.iter() {
                prop_assert!(amount.abs() < tolerance, "{} left at {}", participant, amount);
            }
        }

        #[test]
        fn planning_is_idempotent((roster, expenses) in any_ledger()) {
            let balances = compute_balances(&roster, &expenses);
            prop_assert_eq!(plan_settlements(&balances), plan_settlements(&balances));
        }
    }
}
