// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A single priority bucket of a [`PriorityValue`](crate::PriorityValue).

use alloc::rc::Rc;

use smallvec::SmallVec;

use crate::entry::PriorityBindingEntry;
use crate::priority::BindingPriority;
use crate::value::Value;

/// The entries and direct value competing at one priority.
///
/// Entries and the direct value share one insertion counter, so whichever was
/// written most recently shadows the others.
#[derive(Debug)]
pub(crate) struct PriorityLevel {
    priority: BindingPriority,
    entries: SmallVec<[Rc<PriorityBindingEntry>; 2]>,
    direct: Option<(u64, Value)>,
    next_index: u64,
}

impl PriorityLevel {
    pub(crate) fn new(priority: BindingPriority) -> Self {
        Self {
            priority,
            entries: SmallVec::new(),
            direct: None,
            next_index: 0,
        }
    }

    pub(crate) fn priority(&self) -> BindingPriority {
        self.priority
    }

    fn take_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Creates and stores a new, not yet started entry.
    pub(crate) fn add_entry(&mut self) -> Rc<PriorityBindingEntry> {
        let index = self.take_index();
        let entry = PriorityBindingEntry::new(self.priority, index);
        self.entries.push(entry.clone());
        entry
    }

    /// Removes an entry. Returns `true` if it was present.
    pub(crate) fn remove_entry(&mut self, index: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.index() != index);
        self.entries.len() != before
    }

    pub(crate) fn entry(&self, index: u64) -> Option<&Rc<PriorityBindingEntry>> {
        self.entries.iter().find(|entry| entry.index() == index)
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn set_direct(&mut self, value: Value) {
        let index = self.take_index();
        self.direct = Some((index, value));
    }

    pub(crate) fn clear_direct(&mut self) -> bool {
        self.direct.take().is_some()
    }

    /// Returns the value of the most recently added candidate, if any.
    ///
    /// Completed entries and entries holding Unset are skipped.
    pub(crate) fn active_value(&self) -> Option<Value> {
        let entry = self
            .entries
            .iter()
            .rev()
            .find(|entry| entry.is_candidate())
            .map(|entry| (entry.index(), entry.value()));
        let direct = self
            .direct
            .as_ref()
            .filter(|(_, value)| !value.is_unset())
            .map(|(index, value)| (*index, value.clone()));

        match (entry, direct) {
            (Some(entry), Some(direct)) => Some(if entry.0 > direct.0 { entry.1 } else { direct.1 }),
            (Some((_, value)), None) | (None, Some((_, value))) => Some(value),
            (None, None) => None,
        }
    }

    /// Disposes every entry.
    pub(crate) fn dispose(&mut self) {
        for entry in self.entries.drain(..) {
            entry.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_value_participates_in_insertion_order() {
        let mut level = PriorityLevel::new(BindingPriority::LOCAL_VALUE);
        assert_eq!(level.active_value(), None);

        level.set_direct(Value::Int(1));
        assert_eq!(level.active_value(), Some(Value::Int(1)));

        // An unstarted entry holds Unset and never shadows anything.
        let entry = level.add_entry();
        assert_eq!(entry.index(), 1);
        assert_eq!(level.active_value(), Some(Value::Int(1)));

        level.set_direct(Value::Unset);
        assert_eq!(level.active_value(), None);
        assert!(level.clear_direct());
        assert!(!level.clear_direct());
    }

    #[test]
    fn remove_and_dispose() {
        let mut level = PriorityLevel::new(BindingPriority::STYLE);
        let a = level.add_entry();
        let b = level.add_entry();
        assert_eq!(level.entry_count(), 2);
        assert!(level.remove_entry(a.index()));
        assert!(!level.remove_entry(a.index()));
        assert!(level.entry(b.index()).is_some());

        level.dispose();
        assert!(b.is_disposed());
        assert_eq!(level.entry_count(), 0);
    }
}
