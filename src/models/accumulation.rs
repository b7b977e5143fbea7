//! Bounded, insertion-ordered review set with dedup-on-insert.

use std::collections::HashSet;

use super::review::ReviewRecord;

/// Result of offering one record to an [`AccumulationSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Record was new and has been appended.
    Added,
    /// A record with the same dedup key is already present.
    Duplicate,
    /// The set is at capacity; the record was rejected.
    Full,
}

/// Counts from merging a batch of candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub duplicates: usize,
    /// True when at least one candidate was rejected because the set is full,
    /// or the set became full during the merge.
    pub full: bool,
}

/// Records accumulated by one extraction run, in discovery order.
///
/// No two records share a dedup key. Once `capacity` records are held every
/// further insert is rejected with [`InsertOutcome::Full`].
#[derive(Debug, Clone)]
pub struct AccumulationSet {
    records: Vec<ReviewRecord>,
    keys: HashSet<String>,
    capacity: usize,
}

impl AccumulationSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            keys: HashSet::new(),
            capacity,
        }
    }

    pub fn insert(&mut self, record: ReviewRecord) -> InsertOutcome {
        if self.keys.contains(record.dedup_key()) {
            return InsertOutcome::Duplicate;
        }
        if self.is_full() {
            return InsertOutcome::Full;
        }
        self.keys.insert(record.dedup_key().to_string());
        self.records.push(record);
        InsertOutcome::Added
    }

    /// Insert candidates in order, stopping at the first rejection for capacity.
    pub fn merge<I>(&mut self, candidates: I) -> MergeSummary
    where
        I: IntoIterator<Item = ReviewRecord>,
    {
        let mut summary = MergeSummary::default();
        for record in candidates {
            match self.insert(record) {
                InsertOutcome::Added => summary.added += 1,
                InsertOutcome::Duplicate => summary.duplicates += 1,
                InsertOutcome::Full => {
                    summary.full = true;
                    break;
                }
            }
        }
        summary.full |= self.is_full();
        summary
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key.trim())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ReviewRecord> {
        self.records
    }
}
