use crate::demo::{run_board, run_demo, run_lead_import, BoardArgs, DemoArgs, LeadImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use letting_crm::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Letting CRM",
    about = "Run the letting instruction service or explore the lifecycle from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one instruction from intake to an active lease
    Demo(DemoArgs),
    /// Work with portal enquiry exports
    Leads {
        #[command(subcommand)]
        command: LeadsCommand,
    },
    /// Print the instruction board and alerts for a sample portfolio
    Board(BoardArgs),
}

#[derive(Subcommand, Debug)]
enum LeadsCommand {
    /// Parse an enquiry CSV and list the leads it would create
    Import(LeadImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Load the sample portfolio before accepting requests
    #[arg(long)]
    pub(crate) seed: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Leads {
            command: LeadsCommand::Import(args),
        } => run_lead_import(args),
        Command::Board(args) => run_board(args),
    }
}
