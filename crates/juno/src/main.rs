//! Juno: datalog rule evaluation service
//!
//! Main binary with subcommands:
//! - `serve`: HTTP service (`/eval`, `/health`, `/version`, `/info`, `/reload`)
//! - `check`: Compile a rules directory and report its hash
//! - `eval`: Run one `/eval`-shaped request from a file

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use juno_datalog::EngineLimits;
use juno_service::{ServiceConfig, config::resolve_version};

mod offline;
mod serve;

#[derive(Parser)]
#[command(name = "juno")]
#[command(about = "Datalog rule evaluation service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Bounds applied to every evaluation.
#[derive(Args, Debug, Clone)]
struct EngineArgs {
    /// Maximum fixpoint rounds per evaluation
    #[arg(long, env = "JUNO_MAX_ROUNDS", default_value = "10000")]
    max_rounds: usize,

    /// Maximum tuples (facts plus derived) per evaluation
    #[arg(long, env = "JUNO_MAX_TUPLES", default_value = "1000000")]
    max_tuples: usize,

    /// Default evaluation timeout in milliseconds
    #[arg(long, env = "JUNO_TIMEOUT_MS", default_value = "5000")]
    timeout_ms: u64,
}

impl EngineArgs {
    fn limits(&self) -> EngineLimits {
        EngineLimits {
            max_rounds: self.max_rounds,
            max_tuples: self.max_tuples,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// HTTP server port
        #[arg(long, env = "JUNO_PORT", default_value = "8088")]
        port: u16,

        /// Directory of `*.json` rule files
        #[arg(long, env = "JUNO_RULES_DIR")]
        rules_dir: Option<PathBuf>,

        /// Version reported by /health and /version (falls back to ./VERSION)
        #[arg(long, env = "JUNO_VERSION")]
        version: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Load and compile a rules directory
    Check {
        /// Directory of `*.json` rule files
        #[arg(long, env = "JUNO_RULES_DIR")]
        rules_dir: PathBuf,
    },

    /// Evaluate a single request file and print the JSON response
    Eval {
        /// Path to a JSON request (same shape as the /eval body)
        #[arg(long)]
        request: PathBuf,

        /// Directory of `*.json` rule files
        #[arg(long, env = "JUNO_RULES_DIR")]
        rules_dir: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "juno=info,juno_service=info,juno_datalog=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            rules_dir,
            version,
            engine,
        } => {
            let config = ServiceConfig {
                port,
                rules_dir,
                limits: engine.limits(),
                default_timeout: Duration::from_millis(engine.timeout_ms),
                version: resolve_version(version, Path::new("VERSION")),
            };
            serve::run(config).await
        }
        Commands::Check { rules_dir } => offline::check(&rules_dir),
        Commands::Eval {
            request,
            rules_dir,
            engine,
        } => {
            offline::eval(
                &request,
                rules_dir.as_deref(),
                engine.limits(),
                Duration::from_millis(engine.timeout_ms),
            )
            .await
        }
    }
}
