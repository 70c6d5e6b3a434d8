mod migrations;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use haex_common::FailurePolicy;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "haex",
    version,
    about = "HaexVault extension developer tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extension project directory
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the extension manifest
    Manifest {
        #[command(subcommand)]
        action: ManifestCommands,
    },

    /// Work with the extension's migration directory
    Migrations {
        #[command(subcommand)]
        action: MigrationCommands,
    },
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Print the resolved manifest
    Show,
}

#[derive(Subcommand)]
enum MigrationCommands {
    /// List migrations in the order the host applies them
    Plan {
        /// Migration directory (defaults to the configured one)
        dir: Option<PathBuf>,
    },
    /// Register migrations against a local loopback database
    Apply {
        /// Migration directory (defaults to the configured one)
        dir: Option<PathBuf>,

        /// SQLite database to apply to
        #[arg(long)]
        db: Option<PathBuf>,

        /// What to do when a migration fails
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    AbortAll,
    SkipFailed,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::AbortAll => FailurePolicy::AbortAll,
            PolicyArg::SkipFailed => FailurePolicy::SkipFailed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = haex_config::ConfigLoader::with_dir(&cli.project);
    let config = config_loader.load();

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().and_then(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config.context("failed to load project config")?;

    match cli.command {
        Commands::Manifest { action } => match action {
            ManifestCommands::Show => match config_loader.manifest_loader(&config).load() {
                Some(manifest) => println!("{}", serde_json::to_string_pretty(&manifest)?),
                None => println!("extension metadata unavailable"),
            },
        },
        Commands::Migrations { action } => match action {
            MigrationCommands::Plan { dir } => {
                let dir = config_loader.resolve(&dir.unwrap_or(config.migrations_dir));
                let planned = migrations::plan(&dir)?;
                migrations::print_plan(&dir, &planned);
            }
            MigrationCommands::Apply { dir, db, policy } => {
                let dir = config_loader.resolve(&dir.unwrap_or_else(|| config.migrations_dir.clone()));
                let db = config_loader.resolve(&db.unwrap_or_else(|| config.database_path.clone()));
                let policy = policy.map(FailurePolicy::from).unwrap_or(config.failure_policy);

                let manifest = config_loader
                    .manifest_loader(&config)
                    .load()
                    .context("extension metadata unavailable; cannot derive the table namespace")?;
                let identity = migrations::identity_from_manifest(&manifest)?;

                let result = migrations::apply(&dir, &db, identity, policy).await?;
                migrations::print_result(&result);
                if !result.is_complete() {
                    anyhow::bail!("{} migration(s) failed", result.failed.len());
                }
            }
        },
    }

    Ok(())
}
