//! Property tests for the Selection Set aggregation laws.

use proptest::prelude::*;
use std::collections::BTreeMap;

use finportal::loans::selection::SelectionSet;
use finportal::loans::{Loan, LoanAnalysis};

/// Registry with one loan per distinct id.
fn registry(balances: &[(u8, f64)]) -> LoanAnalysis {
    let unique: BTreeMap<u8, f64> = balances.iter().copied().collect();
    LoanAnalysis {
        emprestimos: unique
            .into_iter()
            .map(|(id, balance)| Loan {
                id: id.to_string(),
                valor_a_vencer: balance,
                ..Loan::default()
            })
            .collect(),
        ..LoanAnalysis::default()
    }
}

proptest! {
    #[test]
    fn total_is_never_negative(
        toggles in prop::collection::vec(0u8..20, 0..40),
        balances in prop::collection::vec((0u8..20, 0.0f64..10_000.0), 0..12),
    ) {
        let reg = registry(&balances);
        let mut set = SelectionSet::new();
        for id in &toggles {
            set.toggle(&id.to_string());
        }
        prop_assert!(set.total(&reg) >= 0.0);
    }

    #[test]
    fn empty_set_always_totals_zero(
        balances in prop::collection::vec((0u8..20, 0.0f64..10_000.0), 0..12),
    ) {
        let reg = registry(&balances);
        prop_assert_eq!(SelectionSet::new().total(&reg), 0.0);
    }

    #[test]
    fn ids_absent_from_the_registry_never_change_the_total(
        toggles in prop::collection::vec(0u8..10, 0..20),
        stale in prop::collection::vec(100u8..200, 1..10),
        balances in prop::collection::vec((0u8..10, 0.0f64..10_000.0), 1..10),
    ) {
        let reg = registry(&balances);
        let mut set = SelectionSet::new();
        for id in &toggles {
            set.toggle(&id.to_string());
        }
        let before = set.total(&reg);

        // Registry ids stop at 19; everything in `stale` is absent.
        for id in &stale {
            set.toggle(&id.to_string());
        }
        prop_assert_eq!(set.total(&reg), before);
    }

    #[test]
    fn repeating_a_toggle_sequence_twice_restores_the_empty_selection(
        toggles in prop::collection::vec(0u8..10, 0..20),
        balances in prop::collection::vec((0u8..10, 0.0f64..10_000.0), 1..10),
    ) {
        let reg = registry(&balances);
        let mut set = SelectionSet::new();
        for id in toggles.iter().chain(toggles.iter()) {
            set.toggle(&id.to_string());
        }
        prop_assert_eq!(set.selected_count(), 0);
        prop_assert_eq!(set.total(&reg), 0.0);
    }

    #[test]
    fn prune_never_invents_selections(
        toggles in prop::collection::vec(0u8..30, 0..40),
        balances in prop::collection::vec((0u8..10, 0.0f64..10_000.0), 0..10),
    ) {
        let reg = registry(&balances);
        let mut set = SelectionSet::new();
        for id in &toggles {
            set.toggle(&id.to_string());
        }
        let before = set.total(&reg);

        set.prune(&reg);
        // Dropping stale keys never changes what the registry can see.
        prop_assert_eq!(set.total(&reg), before);
        for id in set.selected_ids() {
            prop_assert!(reg.loan(&id).is_some());
        }
    }
}
