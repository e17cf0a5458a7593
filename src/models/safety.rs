//! Safety profile model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Named bundle of validation rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Minimal,
    #[default]
    Balanced,
    Maximum,
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => write!(f, "minimal"),
            Self::Balanced => write!(f, "balanced"),
            Self::Maximum => write!(f, "maximum"),
        }
    }
}

impl std::str::FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "balanced" => Ok(Self::Balanced),
            "maximum" => Ok(Self::Maximum),
            _ => Err(format!(
                "unknown safety level: {s} (expected minimal, balanced or maximum)"
            )),
        }
    }
}

/// Validation rules applied by one manager for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyProfile {
    pub level: SafetyLevel,
    /// Back up paths before they are deleted or overwritten.
    pub require_backup: bool,
    /// Refuse to touch existing paths the process cannot write.
    pub validate_permissions: bool,
    /// Never overwrite an occupied destination.
    pub prevent_overwrite: bool,
    /// Upper bound for files whose full contents get read.
    pub max_file_size: Option<u64>,
    /// Path prefixes that may never be touched.
    pub forbidden_path_prefixes: BTreeSet<PathBuf>,
    /// Refuse every delete.
    pub block_deletes: bool,
}

impl SafetyProfile {
    /// Canonical profile for a level.
    pub fn for_level(level: SafetyLevel) -> Self {
        match level {
            SafetyLevel::Maximum => Self {
                level,
                require_backup: true,
                validate_permissions: true,
                prevent_overwrite: true,
                max_file_size: Some(100 * MIB),
                forbidden_path_prefixes: prefixes(&[
                    "/System",
                    "/usr",
                    "/bin",
                    "/sbin",
                    "/etc",
                    "C:\\Windows",
                    "C:\\Program Files",
                    "C:\\Program Files (x86)",
                ]),
                block_deletes: true,
            },
            SafetyLevel::Balanced => Self {
                level,
                require_backup: true,
                validate_permissions: true,
                prevent_overwrite: false,
                max_file_size: Some(GIB),
                forbidden_path_prefixes: prefixes(&[
                    "/System",
                    "/usr/bin",
                    "/usr/sbin",
                    "/etc",
                    "C:\\Windows\\System32",
                    "C:\\Windows\\SysWOW64",
                ]),
                block_deletes: false,
            },
            SafetyLevel::Minimal => Self {
                level,
                require_backup: false,
                validate_permissions: true,
                prevent_overwrite: false,
                max_file_size: Some(10 * GIB),
                forbidden_path_prefixes: BTreeSet::new(),
                block_deletes: false,
            },
        }
    }

    pub fn minimal() -> Self {
        Self::for_level(SafetyLevel::Minimal)
    }

    pub fn balanced() -> Self {
        Self::for_level(SafetyLevel::Balanced)
    }

    pub fn maximum() -> Self {
        Self::for_level(SafetyLevel::Maximum)
    }

    /// Add forbidden prefixes on top of the canonical ones.
    pub fn with_forbidden_prefixes<I, P>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.forbidden_path_prefixes
            .extend(extra.into_iter().map(Into::into));
        self
    }
}

impl Default for SafetyProfile {
    fn default() -> Self {
        Self::balanced()
    }
}

fn prefixes(paths: &[&str]) -> BTreeSet<PathBuf> {
    paths.iter().map(PathBuf::from).collect()
}
