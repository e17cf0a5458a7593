//! Command line argument definitions.

use crate::models::safety::SafetyLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ocd - safe file operations for automated organizing
#[derive(Parser, Debug)]
#[command(name = "ocd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Safety level: minimal, balanced or maximum (overrides config)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub safety: Option<SafetyLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a directory
    Mkdir {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Do not create missing parent directories
        #[arg(long)]
        no_parents: bool,

        /// Fail if the directory already exists
        #[arg(long)]
        fail_if_exists: bool,

        /// Write a journal so the operation can be rolled back
        #[arg(short, long, value_name = "OUT")]
        journal: Option<PathBuf>,
    },

    /// Move a file or directory
    Mv {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        #[arg(value_name = "DEST")]
        destination: PathBuf,

        /// Do not rename on conflict; overwrite or fail per safety level
        #[arg(long)]
        no_resolve: bool,

        /// Write a journal so the operation can be rolled back
        #[arg(short, long, value_name = "OUT")]
        journal: Option<PathBuf>,
    },

    /// Copy a file or directory
    Cp {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        #[arg(value_name = "DEST")]
        destination: PathBuf,

        /// Do not carry over timestamps
        #[arg(long)]
        no_preserve: bool,

        /// Write a journal so the operation can be rolled back
        #[arg(short, long, value_name = "OUT")]
        journal: Option<PathBuf>,
    },

    /// Rename a file or directory in place
    Rename {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[arg(value_name = "NEW_NAME")]
        new_name: String,

        /// Write a journal so the operation can be rolled back
        #[arg(short, long, value_name = "OUT")]
        journal: Option<PathBuf>,
    },

    /// Delete a file or directory
    Rm {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Recorded with the operation; safety checks still apply
        #[arg(long)]
        force: bool,

        /// Write a journal so the operation can be rolled back
        #[arg(short, long, value_name = "OUT")]
        journal: Option<PathBuf>,
    },

    /// Execute a plan file
    Apply {
        /// Path to the plan JSON file
        #[arg(value_name = "PLAN_FILE")]
        plan_file: PathBuf,

        /// Preview only - show what would be done
        #[arg(long)]
        dry_run: bool,

        /// Output path for the journal
        #[arg(short, long, value_name = "OUT")]
        journal: Option<PathBuf>,

        /// Stop at the first failure and roll back what was executed
        #[arg(long)]
        rollback_on_error: bool,
    },

    /// Rollback a previous execution
    Rollback {
        /// Path to the journal JSON file
        #[arg(value_name = "JOURNAL")]
        journal: PathBuf,

        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,
    },
}
