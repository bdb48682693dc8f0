//! Live scan feed
//!
//! Newest record first, bounded; the oldest entry falls off once the
//! capacity is exceeded.

use isa_common::models::ScanRecord;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize)]
pub struct ScanFeed {
    records: VecDeque<ScanRecord>,
    capacity: usize,
}

impl ScanFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Prepend a record, dropping the oldest beyond capacity
    pub fn push(&mut self, record: ScanRecord) {
        if self.capacity == 0 {
            return;
        }
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&ScanRecord> {
        self.records.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<ScanRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> ScanRecord {
        ScanRecord {
            id,
            session_id: Some(1),
            identifier: format!("{:010}", id),
            part_number: None,
            description: None,
            po_number: None,
            quantity: 1.0,
            scanned_at: None,
            manual_entry: false,
            expected_quantity: None,
            status: None,
            detected_category: None,
        }
    }

    #[test]
    fn test_newest_first() {
        let mut feed = ScanFeed::new(50);
        feed.push(record(1));
        feed.push(record(2));
        feed.push(record(3));

        let ids: Vec<i64> = feed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(feed.latest().map(|r| r.id), Some(3));
    }

    #[test]
    fn test_oldest_dropped_past_capacity() {
        let mut feed = ScanFeed::new(50);
        for id in 1..=51 {
            feed.push(record(id));
        }

        assert_eq!(feed.len(), 50);
        assert_eq!(feed.latest().map(|r| r.id), Some(51));
        assert!(feed.iter().all(|r| r.id != 1), "record 1 should be evicted");
        assert_eq!(feed.iter().last().map(|r| r.id), Some(2));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut feed = ScanFeed::new(0);
        feed.push(record(1));
        assert!(feed.is_empty());
    }
}
