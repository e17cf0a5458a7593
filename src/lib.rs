//! ocd
//!
//! Safe, reversible filesystem operations for automated file organizing:
//! path safety profiles, conflict-free naming, backups before destructive
//! changes, and rollback of everything a session did.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod utils;

pub use error::{Error, ErrorKind, Result};
