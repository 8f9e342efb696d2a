//! Selection Set & Aggregator.
//!
//! Pure state: toggling never touches the network, and the aggregate total is
//! derived on every read — never cached, so it can't go stale across a
//! registry refresh.

use std::collections::HashMap;

use super::LoanAnalysis;

/// The set of loans currently chosen for renegotiation.
///
/// Keys are loan ids; a `true` flag means selected. Stale keys (loans gone
/// from the latest registry snapshot) are dropped by [`SelectionSet::prune`]
/// on every refresh.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    flags: HashMap<String, bool>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag for `loan_id`; an absent id is inserted as selected.
    pub fn toggle(&mut self, loan_id: &str) {
        let flag = self.flags.entry(loan_id.to_string()).or_insert(false);
        *flag = !*flag;
    }

    pub fn is_selected(&self, loan_id: &str) -> bool {
        self.flags.get(loan_id).copied().unwrap_or(false)
    }

    /// Ids currently flagged, sorted for a deterministic request body.
    pub fn selected_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .flags
            .iter()
            .filter(|(_, &selected)| selected)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn selected_count(&self) -> usize {
        self.flags.values().filter(|&&s| s).count()
    }

    pub fn clear(&mut self) {
        self.flags.clear();
    }

    /// Drop keys that no longer correspond to a loan in the latest snapshot.
    /// Called after every registry refresh — a toggle applied before the
    /// fetch resolved is preserved and re-validated here.
    pub fn prune(&mut self, analysis: &LoanAnalysis) {
        self.flags.retain(|id, _| analysis.loan(id).is_some());
    }

    /// Aggregate outstanding balance of the selected loans.
    ///
    /// Pure function of the set and the snapshot: zero for an empty set, and
    /// ids absent from the registry are ignored rather than failing.
    pub fn total(&self, analysis: &LoanAnalysis) -> f64 {
        analysis
            .emprestimos
            .iter()
            .filter(|loan| self.is_selected(&loan.id))
            .map(|loan| loan.valor_a_vencer)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loans::Loan;

    fn registry(loans: &[(&str, f64)]) -> LoanAnalysis {
        LoanAnalysis {
            emprestimos: loans
                .iter()
                .map(|(id, balance)| Loan {
                    id: id.to_string(),
                    valor_a_vencer: *balance,
                    ..Loan::default()
                })
                .collect(),
            ..LoanAnalysis::default()
        }
    }

    #[test]
    fn empty_set_totals_zero() {
        let set = SelectionSet::new();
        assert_eq!(set.total(&registry(&[("1", 500.0)])), 0.0);
        assert_eq!(set.selected_count(), 0);
    }

    #[test]
    fn toggle_round_trip() {
        let reg = registry(&[("1", 500.0), ("2", 300.0)]);
        let mut set = SelectionSet::new();

        set.toggle("1");
        set.toggle("2");
        assert_eq!(set.total(&reg), 800.0);

        set.toggle("1");
        assert_eq!(set.total(&reg), 300.0);
        assert_eq!(set.selected_ids(), vec!["2".to_string()]);
    }

    #[test]
    fn stale_ids_are_ignored_by_total() {
        let reg = registry(&[("1", 500.0)]);
        let mut set = SelectionSet::new();
        set.toggle("1");
        set.toggle("ghost");
        assert_eq!(set.total(&reg), 500.0);
    }

    #[test]
    fn prune_drops_exactly_the_stale_keys() {
        let mut set = SelectionSet::new();
        set.toggle("1");
        set.toggle("ghost");
        set.toggle("also-gone");
        set.toggle("also-gone"); // toggled off but key still present

        set.prune(&registry(&[("1", 500.0)]));
        assert!(set.is_selected("1"));
        assert!(!set.is_selected("ghost"));
        assert_eq!(set.selected_ids(), vec!["1".to_string()]);
    }

    #[test]
    fn double_toggle_is_identity() {
        let reg = registry(&[("1", 500.0)]);
        let mut set = SelectionSet::new();
        set.toggle("1");
        set.toggle("1");
        assert_eq!(set.total(&reg), 0.0);
        // Key stays in the map (flag false) until the next prune, matching
        // checkbox semantics.
        set.toggle("1");
        assert_eq!(set.total(&reg), 500.0);
    }

    #[test]
    fn clear_empties_the_set() {
        let mut set = SelectionSet::new();
        set.toggle("1");
        set.clear();
        assert_eq!(set.selected_count(), 0);
    }
}
