//! vcdossier CLI: intelligence dossiers on venture-capital firms.
//!
//! Reads SEBI registry records, researches each firm and writes a structured
//! report per firm, exportable as CSV or JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
