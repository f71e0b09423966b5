//! ServiceFunnel TUI: chat through a service funnel in the terminal,
//! against a running server or a local dataset.

mod app;
mod screens;
mod widgets;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use servicefunnel_core::{Backend, FunnelService, HttpBackend};
use servicefunnel_shared::{config_dir, load_config};
use tracing::info;
use url::Url;

/// Log file written under the config directory; the terminal belongs to the UI.
const LOG_FILE_NAME: &str = "servicefunnel-tui.log";

/// Chat through a service funnel in the terminal.
#[derive(Parser)]
#[command(name = "servicefunnel-tui", version, long_about = None)]
struct Args {
    /// Funnel server to talk to. Defaults to `[client].server_url`.
    #[arg(long, conflicts_with = "dataset")]
    server: Option<String>,

    /// Run against a local dataset file instead of a server.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Show questions exactly as the dataset words them (local dataset only).
    #[arg(long)]
    no_rephrase: bool,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::from_filename(".env").ok();
    let args = Args::parse();

    match init_tracing(args.verbose) {
        Ok(path) => info!(log = %path.display(), "servicefunnel-tui starting"),
        Err(e) => eprintln!("logging disabled: {e}"),
    }

    let backend = resolve_backend(&args)?;
    info!(backend = %backend.describe(), "backend ready");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    app::run(app::App::new(runtime, backend)?)
}

/// Send logs to `~/.servicefunnel/servicefunnel-tui.log`.
fn init_tracing(verbose: u8) -> Result<PathBuf> {
    use tracing_subscriber::{EnvFilter, fmt};

    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = match verbose {
        0 => "servicefunnel=info",
        1 => "servicefunnel=debug",
        _ => "servicefunnel=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(path)
}

fn resolve_backend(args: &Args) -> Result<Backend> {
    let config = load_config()?;

    if let Some(dataset) = &args.dataset {
        let service = FunnelService::load(&config, Some(dataset.as_path()), !args.no_rephrase)?;
        return Ok(Backend::Local(service));
    }

    let http = match &args.server {
        Some(raw) => {
            let url = Url::parse(raw).map_err(|e| eyre!("invalid server URL '{raw}': {e}"))?;
            HttpBackend::new(&url, config.client.timeout_secs)?
        }
        None => HttpBackend::from_config(&config.client)?,
    };
    Ok(Backend::Remote(http))
}
