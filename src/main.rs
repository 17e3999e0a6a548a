use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ratekeeper::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for ratekeeper::AppCommand {
    fn from(cmd: Commands) -> ratekeeper::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => {
                ratekeeper::AppCommand::Convert { amount, from, to }
            }
            Commands::Rates => ratekeeper::AppCommand::Rates,
            Commands::Watch => ratekeeper::AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies
    Convert {
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// Currency code to convert from, e.g. EUR
        from: String,
        /// Currency code to convert to; defaults to the configured currency
        #[arg(short, long)]
        to: Option<String>,
    },
    /// Display current exchange rates for the configured currencies
    Rates,
    /// Convert `<AMOUNT> <FROM> [TO]` lines read from stdin until EOF or Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => ratekeeper::cli::setup::setup(),
        Some(cmd) => ratekeeper::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
