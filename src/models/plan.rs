//! Plan data model.

use super::operation::OperationIntent;
use serde::{Deserialize, Serialize};

/// Batch of intents proposed by an organizing agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPlan {
    /// Plan version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Human readable summary of what the plan does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Intents, in execution order.
    pub operations: Vec<OperationIntent>,
}

fn default_version() -> String {
    "1.0".to_string()
}
