mod commands;
mod error;
pub mod ui;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

use commands::bootstrap::BootstrapCommand;
use commands::deploy::{Action, DeployCommand};
use error::CliError;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Declare, link and deploy cloud components", long_about = None)]
struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a deploy would change
    Diff(DeployCommand),
    /// Synthesize the graph and apply it
    Deploy(DeployCommand),
    /// Delete everything the stage deployed, except retained resources
    Remove(DeployCommand),
    /// Provision the shared asset bucket and repository for a region
    Bootstrap(BootstrapCommand),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Diff(cmd) => cmd.execute(Action::Diff).await,
        Commands::Deploy(cmd) => cmd.execute(Action::Deploy).await,
        Commands::Remove(cmd) => cmd.execute(Action::Remove).await,
        Commands::Bootstrap(cmd) => cmd.execute().await,
    };

    if let Err(err) = result {
        CliError::from(err).render();
        std::process::exit(1);
    }
}
