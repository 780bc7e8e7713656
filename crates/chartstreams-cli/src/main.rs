//! chartstreams CLI - a Helm chart repository backed by Git history

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;
mod server;
mod util;

use commands::RepoArgs;
use error::Result;

#[derive(Parser)]
#[command(name = "chartstreams")]
#[command(author = "chartstreams Contributors")]
#[command(version)]
#[command(about = "Serve every chart version ever committed to a Git repository", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    repo: RepoArgs,

    /// Log filter (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, env = "CHART_STREAMS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the repository and serve it over HTTP
    Serve {
        /// Address to listen on [default: 127.0.0.1:8080]
        #[arg(long, env = "CHART_STREAMS_LISTEN_ADDR")]
        listen_addr: Option<String>,

        /// Upper bound, in seconds, for packaging a single chart [default: 30]
        #[arg(long, env = "CHART_STREAMS_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
    },

    /// Build the repository index and print it
    Index {
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,

        /// Write the index to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Package one chart version from the commit that introduced it
    Fetch {
        /// Chart name
        name: String,

        /// Chart version
        #[arg(id = "chart_version", value_name = "VERSION")]
        version: String,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are not failures
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            return exit_code(code);
        }
    };

    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => exit_code(exit_codes::SUCCESS),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            exit_code(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.repo.load_config()?;

    match cli.command {
        Commands::Serve {
            listen_addr,
            timeout_secs,
        } => commands::serve::run(config, listen_addr, timeout_secs).await,

        Commands::Index { json, output } => {
            commands::index::run(config, json, output.as_deref()).await
        }

        Commands::Fetch {
            name,
            version,
            output,
        } => commands::fetch::run(config, &name, &version, output.as_deref()).await,
    }
}

/// Logs go to stderr so that command output stays clean on stdout
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
