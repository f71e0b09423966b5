//! ServiceFunnel CLI: serve the funnel matcher over HTTP, or walk a funnel
//! from the terminal against a local dataset or a running server.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // The rephrasing key may live in a local .env file.
    dotenvy::from_filename(".env").ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
