use crate::demo::{run_demo, run_import_preview, DemoArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kindred::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kindred",
    about = "Run and demonstrate the kindred family archive from the command line",
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
    /// Seed a sample family and walk through a contribution review
    Demo(DemoArgs),
    /// Preview what a family CSV export would import, without storing anything
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Family CSV export loaded into the store before serving
    #[arg(long)]
    pub(crate) seed_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Import(args) => run_import_preview(args),
    }
}
