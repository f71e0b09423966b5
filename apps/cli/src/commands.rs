//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use servicefunnel_core::{Backend, Catalog, FunnelBackend, FunnelService, HttpBackend};
use servicefunnel_dataset::LoadOptions;
use servicefunnel_shared::{
    AppConfig, FunnelStep, ServiceRecord, StepReply, init_config, load_config,
};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ServiceFunnel: guide customers to the right service through a question funnel.
#[derive(Parser)]
#[command(
    name = "servicefunnel",
    version,
    about = "Serve and explore question funnels that narrow a category down to one service.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load the dataset and start the HTTP server.
    Serve {
        /// Dataset file (.xlsx or .csv). Defaults to `[dataset].path`.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Address to listen on. Defaults to `[server].bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Show questions exactly as the dataset words them.
        #[arg(long)]
        no_rephrase: bool,
    },

    /// Print the first question of a category.
    Start {
        /// Category ID.
        #[arg(short, long)]
        category: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Replay answers and print the next question or the matched service.
    Answer {
        /// Category ID.
        #[arg(short, long)]
        category: String,

        /// Answer given so far, in order (repeatable).
        #[arg(short = 'a', long = "answer")]
        answers: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Check a dataset: record counts per category and ambiguous funnels.
    Validate {
        /// Dataset file. Defaults to `[dataset].path`.
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Where `start` and `answer` look things up.
#[derive(Args)]
#[group(multiple = false)]
pub(crate) struct SourceArgs {
    /// Match against a local dataset file.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Ask a running funnel server instead.
    #[arg(long)]
    server: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "servicefunnel=info",
        1 => "servicefunnel=debug,tower_http=debug",
        _ => "servicefunnel=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve {
            dataset,
            bind,
            no_rephrase,
        } => cmd_serve(dataset.as_deref(), bind.as_deref(), !no_rephrase).await,
        Command::Start { category, source } => cmd_start(&category, &source).await,
        Command::Answer {
            category,
            answers,
            source,
        } => cmd_answer(&category, &answers, &source).await,
        Command::Validate { dataset } => cmd_validate(dataset.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(dataset: Option<&Path>, bind: Option<&str>, rephrase: bool) -> Result<()> {
    let config = load_config()?;

    let bind = bind.unwrap_or(config.server.bind.as_str());
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| eyre!("invalid bind address '{bind}': {e}"))?;

    let service = FunnelService::load(&config, dataset, rephrase)?;
    servicefunnel_server::serve(addr, Arc::new(service)).await?;
    Ok(())
}

async fn cmd_start(category: &str, source: &SourceArgs) -> Result<()> {
    let backend = resolve_backend(source)?;
    info!(category, backend = %backend.describe(), "starting funnel");

    let step = backend.start(category).await?;
    print_question(&step);
    Ok(())
}

async fn cmd_answer(category: &str, answers: &[String], source: &SourceArgs) -> Result<()> {
    let backend = resolve_backend(source)?;
    info!(
        category,
        depth = answers.len(),
        backend = %backend.describe(),
        "replaying answers"
    );

    match backend.answer(category, answers).await? {
        StepReply::Question { question, options } => {
            print_question(&FunnelStep { question, options });
        }
        StepReply::Complete {
            message,
            service_id,
        } => {
            println!();
            println!("  {message}");
            println!("  Service ID: {service_id}");
            println!();
        }
    }
    Ok(())
}

async fn cmd_validate(dataset: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let path = dataset.unwrap_or_else(|| Path::new(&config.dataset.path));
    let opts = LoadOptions {
        sheet: config.dataset.sheet.clone(),
    };

    let catalog = Catalog::load(path, &opts)?;
    let categories = catalog.categories();
    let ambiguities = catalog.ambiguities();

    println!();
    println!("  Dataset:     {}", path.display());
    println!("  Records:     {}", catalog.len());
    println!("  Categories:  {}", categories.len());
    for summary in &categories {
        println!("    {:<12} {} records", summary.category_id, summary.records);
    }
    if let Some(record) = deepest_funnel(&catalog) {
        println!(
            "  Deepest:     {} questions (service {}, category {})",
            record.funnel.len(),
            record.service_id,
            record.category_id
        );
    }

    println!("  Ambiguities: {}", ambiguities.len());
    for ambiguity in &ambiguities {
        println!(
            "    category {}: {} shadows {} after [{}]",
            ambiguity.category_id,
            ambiguity.winner,
            ambiguity.shadowed,
            ambiguity.shared_answers.join(" > ")
        );
    }
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `--server` talks HTTP; otherwise the dataset (flag or config) is loaded here.
fn resolve_backend(source: &SourceArgs) -> Result<Backend> {
    let config = load_config()?;

    match &source.server {
        Some(raw) => {
            let url = Url::parse(raw).map_err(|e| eyre!("invalid server URL '{raw}': {e}"))?;
            let http = HttpBackend::new(&url, config.client.timeout_secs)?;
            Ok(Backend::Remote(http))
        }
        None => {
            let service = FunnelService::load(&config, source.dataset.as_deref(), true)?;
            Ok(Backend::Local(service))
        }
    }
}

/// The record with the most questions; the earliest wins a tie.
fn deepest_funnel(catalog: &Catalog) -> Option<&ServiceRecord> {
    catalog
        .records()
        .iter()
        .rev()
        .max_by_key(|record| record.funnel.len())
}

fn print_question(step: &FunnelStep) {
    println!();
    println!("  {}", step.question);
    for (idx, option) in step.options.iter().enumerate() {
        println!("    {}. {option}", idx + 1);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicefunnel_shared::{Funnel, FunnelPair};

    fn record(service: &str, depth: usize) -> ServiceRecord {
        ServiceRecord {
            category_id: "1".into(),
            service_id: service.into(),
            funnel: Funnel(
                (0..depth)
                    .map(|i| FunnelPair {
                        question: format!("Q{i}"),
                        answer: format!("A{i}"),
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn deepest_funnel_prefers_earliest_record() {
        let catalog = Catalog::new(vec![
            record("S-1", 1),
            record("S-2", 3),
            record("S-3", 3),
            record("S-4", 2),
        ]);
        let deepest = deepest_funnel(&catalog).unwrap();
        assert_eq!(deepest.service_id, "S-2");
        assert_eq!(deepest.funnel.len(), 3);

        assert!(deepest_funnel(&Catalog::new(Vec::new())).is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn answer_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "servicefunnel",
            "answer",
            "--category",
            "1",
            "-a",
            "Repair",
            "--answer",
            "Wood",
        ])
        .unwrap();

        match cli.command {
            Command::Answer {
                category, answers, ..
            } => {
                assert_eq!(category, "1");
                assert_eq!(answers, ["Repair", "Wood"]);
            }
            _ => panic!("expected answer command"),
        }
    }

    #[test]
    fn dataset_and_server_are_exclusive() {
        let result = Cli::try_parse_from([
            "servicefunnel",
            "start",
            "--category",
            "1",
            "--dataset",
            "services.csv",
            "--server",
            "http://localhost:5000",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from([
            "servicefunnel",
            "-v",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--no-rephrase",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Serve {
                bind, no_rephrase, ..
            } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:8080"));
                assert!(no_rephrase);
            }
            _ => panic!("expected serve command"),
        }
    }
}
