//! Plan and journal files.
//!
//! Plans are read before execution; journals are written after it so a
//! later `rollback` can invert the session.

use crate::models::journal::Journal;
use crate::models::plan::OperationPlan;
use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Load a plan from a JSON file.
pub fn load_plan(path: &Path) -> Result<OperationPlan> {
    let content = fs::read_to_string(path)?;
    let plan: OperationPlan = serde_json::from_str(&content)
        .map_err(|e| Error::InvalidPlanFile(format!("{}: {}", path.display(), e)))?;
    tracing::debug!("Loaded plan with {} operations from {:?}", plan.operations.len(), path);
    Ok(plan)
}

/// Save a plan to a JSON file.
pub fn save_plan(plan: &OperationPlan, path: &Path) -> Result<()> {
    write_json(plan, path)?;
    tracing::info!("Plan saved to {:?}", path);
    Ok(())
}

/// Load a journal from a JSON file.
pub fn load_journal(path: &Path) -> Result<Journal> {
    let content = fs::read_to_string(path)?;
    let journal: Journal = serde_json::from_str(&content)
        .map_err(|e| Error::InvalidJournalFile(format!("{}: {}", path.display(), e)))?;
    Ok(journal)
}

/// Save a journal to a JSON file.
pub fn save_journal(journal: &Journal, path: &Path) -> Result<()> {
    write_json(journal, path)?;
    tracing::info!("Journal saved to {:?}", path);
    Ok(())
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::operation::OperationIntent;

    #[test]
    fn test_invalid_plan_is_reported() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("plan.json");
        fs::write(&path, r#"{"operations": [{"op": "format", "path": "/"}]}"#).unwrap();

        let err = load_plan(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidPlanFile(_)));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("plan.json");
        let plan = OperationPlan {
            operations: vec![OperationIntent::create_dir("/data/Docs")],
            ..OperationPlan::default()
        };

        save_plan(&plan, &path).unwrap();
        assert_eq!(load_plan(&path).unwrap().operations, plan.operations);
    }
}
