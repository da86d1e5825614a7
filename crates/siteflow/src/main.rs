mod commands;

use clap::{Parser, Subcommand};
use siteflow_cloud::StateStore;
use siteflow_cloud::state::{DEFAULT_ENVIRONMENT, DEFAULT_STATE_DIR};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "site")]
#[command(about = "Inspect and manage static site deployment state", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory the state directory is resolved against
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// State directory, relative to the base directory or absolute
    #[arg(long, global = true, env = "SITE_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the recorded resources and files of an environment
    Status {
        /// Environment name
        #[arg(short, long, env = "SITE_ENV", default_value = DEFAULT_ENVIRONMENT)]
        env: String,
        /// Print the raw state as JSON
        #[arg(long)]
        json: bool,
    },
    /// List environments that have a state file
    List,
    /// Compare a build directory against the recorded file hashes
    Plan {
        /// Build output directory
        dir: PathBuf,
        /// Environment name
        #[arg(short, long, env = "SITE_ENV", default_value = DEFAULT_ENVIRONMENT)]
        env: String,
        /// Also list every changed path
        #[arg(long)]
        files: bool,
    },
    /// Delete the state file of an environment
    Forget {
        /// Environment name
        #[arg(short, long, env = "SITE_ENV", default_value = DEFAULT_ENVIRONMENT)]
        env: String,
        /// Delete even if resources or files are still recorded
        #[arg(short, long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = StateStore::new(&cli.base_dir).with_state_dir(&cli.state_dir);

    match cli.command {
        Commands::Status { env, json } => commands::status::handle(&store, &env, json).await,
        Commands::List => commands::list::handle(&store).await,
        Commands::Plan { dir, env, files } => {
            commands::plan::handle(&store, &dir, &env, files).await
        }
        Commands::Forget { env, force } => commands::forget::handle(&store, &env, force).await,
    }
}
