//! Journal data model.

use super::operation::OperationRecord;
use super::safety::SafetyLevel;
use serde::{Deserialize, Serialize};

/// Executed records of one session, saved so they can be rolled back by a
/// later process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    /// Journal version.
    pub version: String,
    /// Session that produced the records.
    pub session_id: String,
    /// Safety level the records were executed under.
    pub safety_level: SafetyLevel,
    /// Execution timestamp.
    pub executed_at: String,
    /// Records, in execution order.
    pub records: Vec<OperationRecord>,
}
