//! Ordered list of page selections built up before a split
//!
//! Entries are addressed by the id handed out when they were added, so two
//! identical ranges added twice stay two separately removable entries.

use serde::{Deserialize, Serialize};

use crate::error::RangeError;
use crate::page_range::{PageRange, QuickSelect, Selection};

pub type SelectionId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub id: SelectionId,
    pub selection: Selection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionList {
    next_id: SelectionId,
    entries: Vec<SelectionEntry>,
}

impl SelectionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, selection: Selection) -> SelectionId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(SelectionEntry { id, selection });
        id
    }

    /// Validate and append a custom `start..=end` range
    pub fn add_custom(
        &mut self,
        start: u32,
        end: u32,
        total: u32,
    ) -> Result<SelectionId, RangeError> {
        let selection = Selection::custom(start, end, total)?;
        Ok(self.add(selection))
    }

    pub fn add_quick(
        &mut self,
        selector: QuickSelect,
        total: u32,
    ) -> Result<SelectionId, RangeError> {
        let selection = selector.resolve(total)?;
        Ok(self.add(selection))
    }

    pub fn remove(&mut self, id: SelectionId) -> bool {
        if let Some(pos) = self.entries.iter().position(|entry| entry.id == id) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn selections(&self) -> Vec<Selection> {
        self.entries
            .iter()
            .map(|entry| entry.selection.clone())
            .collect()
    }

    /// The covering range of every entry, in entry order
    pub fn ranges(&self) -> Vec<PageRange> {
        self.entries
            .iter()
            .map(|entry| entry.selection.range())
            .collect()
    }

    /// Pages across all entries; overlapping entries count once each
    pub fn total_selected_pages(&self) -> u32 {
        self.entries
            .iter()
            .map(|entry| entry.selection.page_count())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_list_new_is_empty() {
        let list = SelectionList::new();
        assert!(list.is_empty());
        assert_eq!(list.total_selected_pages(), 0);
    }

    #[test]
    fn test_add_returns_unique_ids() {
        let mut list = SelectionList::new();
        let id1 = list.add_custom(1, 3, 10).unwrap();
        let id2 = list.add_custom(1, 3, 10).unwrap();
        assert_ne!(id1, id2);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_is_by_identity() {
        let mut list = SelectionList::new();
        let first = list.add_custom(2, 4, 10).unwrap();
        let second = list.add_custom(2, 4, 10).unwrap();

        assert!(list.remove(first));
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].id, second);

        assert!(!list.remove(first));
        assert!(list.remove(second));
        assert!(list.is_empty());
    }

    #[test]
    fn test_rejected_range_is_not_added() {
        let mut list = SelectionList::new();
        assert!(list.add_custom(5, 2, 10).is_err());
        assert!(list.add_quick(QuickSelect::Even, 1).is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn test_total_selected_pages_counts_overlaps() {
        let mut list = SelectionList::new();
        list.add_custom(1, 4, 10).unwrap();
        list.add_custom(3, 5, 10).unwrap();
        list.add_quick(QuickSelect::Odd, 10).unwrap();
        assert_eq!(list.total_selected_pages(), 4 + 3 + 5);
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut list = SelectionList::new();
        list.add_quick(QuickSelect::Last, 8).unwrap();
        list.add_custom(1, 1, 8).unwrap();
        let labels: Vec<_> = list
            .entries()
            .iter()
            .map(|e| e.selection.label().to_string())
            .collect();
        assert_eq!(labels, vec!["Last 5 Pages", "Page 1"]);
        assert_eq!(
            list.ranges(),
            vec![PageRange { start: 4, end: 8 }, PageRange { start: 1, end: 1 }]
        );
    }

    #[test]
    fn test_json_roundtrip_keeps_ids() {
        let mut list = SelectionList::new();
        list.add_quick(QuickSelect::Even, 6).unwrap();
        list.add_custom(2, 3, 6).unwrap();

        let json = list.to_json().unwrap();
        let mut restored = SelectionList::from_json(&json).unwrap();

        assert_eq!(restored.entries(), list.entries());
        let next = restored.add_custom(1, 1, 6).unwrap();
        assert_eq!(next, 2);
    }
}
