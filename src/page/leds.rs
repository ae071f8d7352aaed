//! LED state table with dirty tracking

use std::collections::{BTreeMap, BTreeSet};

use super::LedId;

/// Per-page LED states plus the set still waiting to reach the hardware
///
/// Every `set` marks the LED dirty, even when the value is unchanged. The
/// dirty set is only shrunk by [`LedTable::mark_clean`] once a write succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedTable {
    states: BTreeMap<LedId, bool>,
    dirty: BTreeSet<LedId>,
}

impl LedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, led: LedId, on: bool) {
        self.states.insert(led, on);
        self.dirty.insert(led);
    }

    pub fn get(&self, led: LedId) -> Option<bool> {
        self.states.get(&led).copied()
    }

    /// Dirty LEDs with their current value, lowest id first
    pub fn pending(&self) -> Vec<(LedId, bool)> {
        self.dirty
            .iter()
            .filter_map(|led| self.states.get(led).map(|on| (*led, *on)))
            .collect()
    }

    /// Every LED that was ever set, with its current value
    pub fn all(&self) -> Vec<(LedId, bool)> {
        self.states.iter().map(|(led, on)| (*led, *on)).collect()
    }

    pub fn mark_clean(&mut self, led: LedId) {
        self.dirty.remove(&led);
    }

    pub fn is_dirty(&self, led: LedId) -> bool {
        self.dirty.contains(&led)
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn states(&self) -> &BTreeMap<LedId, bool> {
        &self.states
    }

    pub fn dirty(&self) -> &BTreeSet<LedId> {
        &self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_marks_dirty_even_when_unchanged() {
        let mut table = LedTable::new();
        table.set(4, true);
        table.mark_clean(4);
        assert!(!table.is_dirty(4));

        table.set(4, true);
        assert!(table.is_dirty(4));
        assert_eq!(table.get(4), Some(true));
    }

    #[test]
    fn test_pending_reports_final_value_once() {
        let mut table = LedTable::new();
        table.set(2, true);
        table.set(2, false);
        table.set(1, true);
        assert_eq!(table.pending(), vec![(1, true), (2, false)]);
    }

    #[test]
    fn test_all_survives_clean() {
        let mut table = LedTable::new();
        table.set(9, true);
        table.set(10, false);
        table.mark_clean(9);
        table.mark_clean(10);
        assert!(!table.has_pending());
        assert_eq!(table.all(), vec![(9, true), (10, false)]);
    }
}
