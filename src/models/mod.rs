//! Data models.

pub mod config;
pub mod journal;
pub mod operation;
pub mod plan;
pub mod report;
pub mod safety;
