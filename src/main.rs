mod commands;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use opengine::config::DEFAULT_CONFIG_FILE;
use opengine::operation::RunType;

// ============================================================================
// CLI Types
// ============================================================================

/// Opengine - scheduled operation execution engine for backup and disaster recovery
#[derive(Parser, Debug)]
#[command(
    version = opengine::build_info::VERSION,
    long_version = opengine::build_info::long_version(),
    about,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one firing of a scheduled operation
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Operation definition file (YAML or JSON)
        #[arg(short, long)]
        definition: PathBuf,

        /// Id of the scheduled operation
        #[arg(long)]
        operation_id: String,

        /// Fresh firing or retry after a scheduler restart
        #[arg(long, default_value = "new", value_parser = parse_run_type)]
        run_type: RunType,

        /// When the firing was due (RFC 3339, defaults to now)
        #[arg(long)]
        expect_start_time: Option<DateTime<Utc>>,

        /// Seconds after the expected start during which the firing may run
        #[arg(long, default_value_t = 3600)]
        window: u64,

        /// User the operation acts on behalf of
        #[arg(long, env = "OPENGINE_USER_ID", default_value = "")]
        user_id: String,

        /// Project (tenant) the operation belongs to
        #[arg(long, env = "OPENGINE_PROJECT_ID", default_value = "")]
        project_id: String,

        /// Trigger that fired the operation
        #[arg(long)]
        trigger_id: Option<String>,
    },

    /// Check an operation definition without running it
    Validate {
        /// Operation definition file (YAML or JSON)
        #[arg(short, long)]
        definition: PathBuf,
    },

    /// Show the execution log of a scheduled operation
    Logs {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Id of the scheduled operation
        #[arg(long)]
        operation_id: String,

        /// Maximum number of entries (newest kept)
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_run_type(s: &str) -> Result<RunType, String> {
    s.parse()
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            definition,
            operation_id,
            run_type,
            expect_start_time,
            window,
            user_id,
            project_id,
            trigger_id,
        } => {
            let args = commands::run::RunArgs {
                operation_id,
                run_type,
                expect_start_time,
                window,
                user_id,
                project_id,
                trigger_id,
            };
            commands::run::run(&config, &definition, args).await
        }
        Commands::Validate { definition } => commands::validate::run(&definition).await,
        Commands::Logs {
            config,
            operation_id,
            limit,
            format,
        } => commands::logs::run(&config, &operation_id, limit, format).await,
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
