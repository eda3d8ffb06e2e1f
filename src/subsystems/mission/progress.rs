//! Mission execution progress derivation.
//!
//! The autopilot reports progress in wire item indices through
//! `MISSION_CURRENT` and `MISSION_ITEM_REACHED`. The tracker keeps the
//! latest of both and translates them back to mission item indices.

use std::collections::BTreeMap;

/// A mission progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionProgress {
    /// Index of the current mission item, -1 if unknown. Equal to `total`
    /// once the mission is finished.
    pub current: i32,
    /// Number of mission items.
    pub total: i32,
}

#[derive(Debug)]
pub(crate) struct ProgressTracker {
    last_current_seq: i32,
    last_reached_seq: i32,
}

impl ProgressTracker {
    pub(crate) fn new() -> Self {
        Self {
            last_current_seq: -1,
            last_reached_seq: -1,
        }
    }

    /// Record a MISSION_CURRENT update. Returns true if it changed anything.
    pub(crate) fn record_current(&mut self, seq: u16) -> bool {
        if self.last_current_seq == i32::from(seq) {
            return false;
        }
        self.last_current_seq = i32::from(seq);
        true
    }

    /// Record a MISSION_ITEM_REACHED update. Returns true if it changed
    /// anything.
    pub(crate) fn record_reached(&mut self, seq: u16) -> bool {
        if self.last_reached_seq == i32::from(seq) {
            return false;
        }
        self.last_reached_seq = i32::from(seq);
        true
    }

    /// Forget everything, used when a new mission is accepted so that stale
    /// reports of the previous mission are not trusted.
    pub(crate) fn reset(&mut self) {
        self.last_current_seq = -1;
        self.last_reached_seq = -1;
    }

    /// It is not straightforward to look at "current" because it jumps back
    /// to 0 once the last item has been done, so finishing is decided on
    /// "reached".
    pub(crate) fn is_finished(&self, wire_count: usize) -> bool {
        self.last_current_seq >= 0
            && self.last_reached_seq >= 0
            && wire_count > 0
            && (self.last_reached_seq + 1) as usize == wire_count
    }

    /// Current mission item index: `total` once finished, -1 when unknown.
    pub(crate) fn current_item(
        &self,
        index_map: &BTreeMap<u16, usize>,
        total: usize,
        wire_count: usize,
    ) -> i32 {
        if self.is_finished(wire_count) {
            return total as i32;
        }

        if self.last_current_seq < 0 {
            return -1;
        }

        index_map
            .get(&(self.last_current_seq as u16))
            .map_or(-1, |item_index| *item_index as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_item_map() -> BTreeMap<u16, usize> {
        // Two mission items lowered to three wire items: the second item
        // carries one auxiliary command.
        BTreeMap::from([(0, 0), (1, 1), (2, 1)])
    }

    #[test]
    fn unknown_progress_reports_minus_one() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.current_item(&two_item_map(), 2, 3), -1);
        assert!(!tracker.is_finished(3));
    }

    #[test]
    fn duplicate_reports_are_suppressed() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.record_current(1));
        assert!(!tracker.record_current(1));
        assert!(tracker.record_reached(0));
        assert!(!tracker.record_reached(0));
    }

    #[test]
    fn wire_indices_translate_to_item_indices() {
        let mut tracker = ProgressTracker::new();
        tracker.record_current(2);
        assert_eq!(tracker.current_item(&two_item_map(), 2, 3), 1);
    }

    #[test]
    fn unmapped_wire_index_is_unknown() {
        let mut tracker = ProgressTracker::new();
        tracker.record_current(7);
        assert_eq!(tracker.current_item(&two_item_map(), 2, 3), -1);
    }

    #[test]
    fn current_equals_total_exactly_when_finished() {
        let mut tracker = ProgressTracker::new();
        let map = two_item_map();

        tracker.record_current(1);
        tracker.record_reached(1);
        assert!(!tracker.is_finished(3));
        assert_ne!(tracker.current_item(&map, 2, 3), 2);

        tracker.record_reached(2);
        assert!(tracker.is_finished(3));
        assert_eq!(tracker.current_item(&map, 2, 3), 2);
    }

    #[test]
    fn reset_forgets_previous_mission() {
        let mut tracker = ProgressTracker::new();
        tracker.record_current(1);
        tracker.record_reached(2);
        assert!(tracker.is_finished(3));

        tracker.reset();
        assert!(!tracker.is_finished(3));
        assert_eq!(tracker.current_item(&two_item_map(), 2, 3), -1);
    }
}
