//! Operation data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateDir,
    Move,
    Copy,
    Rename,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDir => "create_dir",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Rename => "rename",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// A caller's request to perform one filesystem mutation.
///
/// Plans produced by the organizing agent are lists of these, serialized as
/// JSON objects tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationIntent {
    CreateDir {
        path: PathBuf,
        #[serde(default = "default_true")]
        parents: bool,
        #[serde(default = "default_true")]
        exist_ok: bool,
    },
    Move {
        source: PathBuf,
        destination: PathBuf,
        #[serde(default = "default_true")]
        resolve_conflicts: bool,
    },
    Copy {
        source: PathBuf,
        destination: PathBuf,
        #[serde(default = "default_true")]
        preserve_metadata: bool,
    },
    Rename {
        path: PathBuf,
        new_name: String,
    },
    Delete {
        path: PathBuf,
        #[serde(default)]
        force: bool,
    },
}

impl OperationIntent {
    pub fn create_dir(path: impl Into<PathBuf>) -> Self {
        Self::CreateDir {
            path: path.into(),
            parents: true,
            exist_ok: true,
        }
    }

    pub fn move_to(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::Move {
            source: source.into(),
            destination: destination.into(),
            resolve_conflicts: true,
        }
    }

    pub fn copy_to(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::Copy {
            source: source.into(),
            destination: destination.into(),
            preserve_metadata: true,
        }
    }

    pub fn rename(path: impl Into<PathBuf>, new_name: impl Into<String>) -> Self {
        Self::Rename {
            path: path.into(),
            new_name: new_name.into(),
        }
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::Delete {
            path: path.into(),
            force: false,
        }
    }

    /// Operation kind of this intent.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateDir { .. } => OperationKind::CreateDir,
            Self::Move { .. } => OperationKind::Move,
            Self::Copy { .. } => OperationKind::Copy,
            Self::Rename { .. } => OperationKind::Rename,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }

    /// The path the intent reads from or acts upon.
    pub fn primary_path(&self) -> &Path {
        match self {
            Self::CreateDir { path, .. } | Self::Rename { path, .. } | Self::Delete { path, .. } => {
                path
            }
            Self::Move { source, .. } | Self::Copy { source, .. } => source,
        }
    }
}

impl fmt::Display for OperationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, .. } => write!(f, "create_dir {}", path.display()),
            Self::Move {
                source,
                destination,
                ..
            } => write!(f, "move {} -> {}", source.display(), destination.display()),
            Self::Copy {
                source,
                destination,
                ..
            } => write!(f, "copy {} -> {}", source.display(), destination.display()),
            Self::Rename { path, new_name } => {
                write!(f, "rename {} -> {}", path.display(), new_name)
            }
            Self::Delete { path, .. } => write!(f, "delete {}", path.display()),
        }
    }
}

/// Information captured at execution time that allows an operation to be
/// inverted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackInfo {
    /// Backup of the deleted or overwritten path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Whether the final destination was occupied before the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_existed: Option<bool>,
    /// Whether the deleted path was a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_directory: Option<bool>,
    /// Whether the operation created its target directory.
    #[serde(default)]
    pub created: bool,
    /// Directories the operation had to create, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_dirs: Vec<PathBuf>,
}

/// Log entry for one executed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Unique record ID.
    pub id: Uuid,
    /// Operation type that was performed.
    pub kind: OperationKind,
    /// When the mutation was attempted.
    pub timestamp: DateTime<Utc>,
    /// Source path (original location).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Destination after conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    /// Set only once the filesystem call has returned successfully.
    pub executed: bool,
    /// How to undo this operation.
    pub rollback: RollbackInfo,
    /// Request options and other context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl OperationRecord {
    /// Create an unexecuted record for an operation about to be attempted.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            source: None,
            destination: None,
            old_name: None,
            new_name: None,
            executed: false,
            rollback: RollbackInfo::default(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The path this record is best identified by in reports.
    pub fn subject(&self) -> &Path {
        self.destination
            .as_deref()
            .or(self.source.as_deref())
            .unwrap_or_else(|| Path::new(""))
    }
}

/// Outcome of a single manager call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub kind: OperationKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    /// Renames applied to avoid overwriting existing paths.
    #[serde(default)]
    pub conflicts_resolved: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// History record appended for this call, if it mutated anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
}

impl OperationResult {
    pub fn ok(kind: OperationKind, message: impl Into<String>) -> Self {
        Self {
            success: true,
            kind,
            message: message.into(),
            source: None,
            destination: None,
            old_name: None,
            new_name: None,
            conflicts_resolved: Vec::new(),
            warnings: Vec::new(),
            record_id: None,
        }
    }

    /// Build the result for a record that was just appended to history.
    pub fn from_record(record: &OperationRecord, message: impl Into<String>) -> Self {
        Self {
            source: record.source.clone(),
            destination: record.destination.clone(),
            old_name: record.old_name.clone(),
            new_name: record.new_name.clone(),
            record_id: Some(record.id),
            ..Self::ok(record.kind, message)
        }
    }

    /// Whether the call changed the filesystem.
    pub fn mutated(&self) -> bool {
        self.record_id.is_some()
    }
}
