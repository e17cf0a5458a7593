//! In-memory operation history for one session.

use crate::models::operation::OperationRecord;
use crate::models::report::OperationStats;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Ordered log of executed records, oldest first.
///
/// Only the owning manager appends to it. Nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct OperationHistory {
    records: Vec<OperationRecord>,
}

impl OperationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an executed record.
    pub(crate) fn push(&mut self, record: OperationRecord) {
        debug_assert!(record.executed, "only executed records enter history");
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&OperationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// The most recent `count` records, oldest first.
    pub fn last(&self, count: usize) -> &[OperationRecord] {
        let start = self.records.len().saturating_sub(count);
        &self.records[start..]
    }

    /// Drop the records with the given IDs.
    pub(crate) fn remove(&mut self, ids: &HashSet<Uuid>) {
        self.records.retain(|r| !ids.contains(&r.id));
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Aggregate counters over the recorded operations.
    pub fn stats(&self) -> OperationStats {
        let total = self.records.len();
        if total == 0 {
            return OperationStats::default();
        }

        let mut stats = OperationStats {
            total_operations: total,
            ..OperationStats::default()
        };
        let hour_ago = Utc::now() - Duration::hours(1);

        for record in &self.records {
            *stats.operations_by_type.entry(record.kind).or_insert(0) += 1;
            if record.executed {
                stats.successful_operations += 1;
            }
            if record.timestamp >= hour_ago {
                stats.recent_operations += 1;
            }
        }
        stats.success_rate = stats.successful_operations as f64 / total as f64;
        stats
    }
}
