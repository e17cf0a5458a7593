//! CLI command implementations.

pub mod apply;
pub mod ops;
pub mod rollback;
