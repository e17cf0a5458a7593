//! Integration tests for plan and journal files.
//!
//! Tests cover:
//! - Plan save/load
//! - Journal save/load
//! - Rolling back a saved journal from a fresh manager

use ocd::core::journal::{load_journal, load_plan, save_journal, save_plan};
use ocd::core::FileOperationManager;
use ocd::models::journal::Journal;
use ocd::models::operation::{OperationIntent, OperationKind};
use ocd::models::plan::OperationPlan;
use ocd::models::safety::{SafetyLevel, SafetyProfile};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// ========== PLAN I/O TESTS ==========

#[test]
fn test_save_and_load_plan() {
    let plan = OperationPlan {
        version: "1.0".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        description: Some("Sort downloads".to_string()),
        operations: vec![
            OperationIntent::create_dir("/data/Documents"),
            OperationIntent::move_to("/data/a.pdf", "/data/Documents/a.pdf"),
            OperationIntent::rename("/data/IMG_001.jpg", "beach.jpg"),
        ],
    };

    let temp_dir = TempDir::new().unwrap();
    let plan_path = temp_dir.path().join("test_plan.json");

    // Save
    save_plan(&plan, &plan_path).unwrap();
    assert!(plan_path.exists());

    // Load
    let loaded = load_plan(&plan_path).unwrap();
    assert_eq!(loaded, plan);
}

#[test]
fn test_load_agent_written_plan() {
    let temp_dir = TempDir::new().unwrap();
    let plan_path = temp_dir.path().join("plan.json");
    fs::write(
        &plan_path,
        r#"{
            "operations": [
                {"op": "create_dir", "path": "/data/Invoices", "parents": false},
                {"op": "copy", "source": "/data/x.txt", "destination": "/data/y.txt"},
                {"op": "delete", "path": "/data/tmp.log"}
            ]
        }"#,
    )
    .unwrap();

    let plan = load_plan(&plan_path).unwrap();

    assert_eq!(plan.version, "1.0");
    assert_eq!(plan.operations.len(), 3);
    assert_eq!(
        plan.operations[0],
        OperationIntent::CreateDir {
            path: PathBuf::from("/data/Invoices"),
            parents: false,
            exist_ok: true,
        }
    );
    assert_eq!(plan.operations[1].kind(), OperationKind::Copy);
    assert_eq!(plan.operations[2], OperationIntent::delete("/data/tmp.log"));
}

#[test]
fn test_load_nonexistent_plan() {
    let result = load_plan(&PathBuf::from("/nonexistent/plan.json"));
    assert!(result.is_err());
}

// ========== JOURNAL I/O TESTS ==========

#[test]
fn test_save_and_load_empty_journal() {
    let journal = Journal {
        version: "1.0".to_string(),
        session_id: "test-session".to_string(),
        safety_level: SafetyLevel::Maximum,
        executed_at: chrono::Utc::now().to_rfc3339(),
        records: vec![],
    };

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("journal.json");

    save_journal(&journal, &path).unwrap();
    let loaded = load_journal(&path).unwrap();

    assert_eq!(loaded, journal);
}

#[test]
fn test_load_nonexistent_journal() {
    let result = load_journal(&PathBuf::from("/nonexistent/journal.json"));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_journal_keeps_records_intact() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("report.pdf");
    fs::write(&source, "pdf").unwrap();

    let mut manager = FileOperationManager::new(SafetyProfile::balanced());
    manager
        .move_file(&source, &temp_dir.path().join("Docs").join("report.pdf"), true)
        .await
        .unwrap();

    let path = temp_dir.path().join("journal.json");
    save_journal(&manager.journal(), &path).unwrap();
    let loaded = load_journal(&path).unwrap();

    assert_eq!(loaded.session_id, manager.session_id().to_string());
    assert_eq!(loaded.safety_level, SafetyLevel::Balanced);
    assert_eq!(loaded.records, manager.history().records());
}

#[tokio::test]
async fn test_rollback_saved_journal_in_new_session() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("a.txt"), "alpha").unwrap();

    let journal_path = root.join("journal.json");
    {
        let mut manager = FileOperationManager::new(SafetyProfile::balanced());
        manager
            .move_file(&root.join("a.txt"), &root.join("Sorted").join("a.txt"), true)
            .await
            .unwrap();
        save_journal(&manager.journal(), &journal_path).unwrap();
    }
    assert!(!root.join("a.txt").exists());

    let journal = load_journal(&journal_path).unwrap();
    let mut manager = FileOperationManager::new(SafetyProfile::balanced());
    let report = manager.rollback_operations(&journal.records).await;

    assert!(report.is_success());
    assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "alpha");
    assert!(!root.join("Sorted").exists());
}

// ========== DIRECTORY CREATION TESTS ==========

#[test]
fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir
        .path()
        .join("deeply")
        .join("nested")
        .join("dir")
        .join("journal.json");

    save_journal(&Journal::default(), &nested_path).unwrap();

    assert!(nested_path.exists());
}
