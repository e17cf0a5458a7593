//! Core file operation modules.

pub mod backup;
pub mod conflict;
pub mod history;
pub mod journal;
pub mod manager;
pub mod rollback;
pub mod safety;

pub use manager::{FileOperationManager, ManagerOptions};
