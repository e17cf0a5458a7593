//! ocd CLI
//!
//! Safe file operations with backups, conflict resolution and rollback.

use clap::Parser;
use ocd::cli::{
    args::{Cli, Commands},
    commands::{apply, ops, rollback},
};
use ocd::core::{FileOperationManager, ManagerOptions};
use ocd::models::config::{self, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(level) = cli.safety {
        config.safety.level = level;
    }

    // Initialize logging
    init_logging(cli.verbose, &config);

    let mut manager = build_manager(&config);

    match cli.command {
        Commands::Mkdir {
            path,
            no_parents,
            fail_if_exists,
            journal,
        } => {
            ops::mkdir(&mut manager, &path, !no_parents, !fail_if_exists, journal.as_deref()).await?;
        }

        Commands::Mv {
            source,
            destination,
            no_resolve,
            journal,
        } => {
            ops::mv(&mut manager, &source, &destination, !no_resolve, journal.as_deref()).await?;
        }

        Commands::Cp {
            source,
            destination,
            no_preserve,
            journal,
        } => {
            ops::cp(&mut manager, &source, &destination, !no_preserve, journal.as_deref()).await?;
        }

        Commands::Rename {
            path,
            new_name,
            journal,
        } => {
            ops::rename(&mut manager, &path, &new_name, journal.as_deref()).await?;
        }

        Commands::Rm {
            path,
            force,
            journal,
        } => {
            ops::rm(&mut manager, &path, force, journal.as_deref()).await?;
        }

        Commands::Apply {
            plan_file,
            dry_run,
            journal,
            rollback_on_error,
        } => {
            apply::apply_plan(
                &mut manager,
                &plan_file,
                dry_run,
                journal.as_deref(),
                rollback_on_error,
            )
            .await?;
        }

        Commands::Rollback { journal, dry_run } => {
            rollback::rollback(&mut manager, &journal, dry_run).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool, config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("ocd=debug")
    } else {
        EnvFilter::try_from_env("OCD_LOG")
            .unwrap_or_else(|_| EnvFilter::new(format!("ocd={}", config.logging.level)))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

fn build_manager(config: &Config) -> FileOperationManager {
    let options = ManagerOptions {
        max_batch_size: config.safety.max_batch_size,
        ..ManagerOptions::default()
    };
    FileOperationManager::with_options(config.safety_profile(), options)
}
