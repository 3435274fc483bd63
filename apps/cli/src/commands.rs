//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use vcdossier_core::{
    FirmOutcome, Pipeline, PipelineConfig, ProgressReporter, find_record, load_firm_records,
    select_records,
};
use vcdossier_crawler::fetcher_from_config;
use vcdossier_export::{ExportFormat, export_reports};
use vcdossier_linkedin::provider_from_config;
use vcdossier_llm::GeminiClient;
use vcdossier_search::GoogleSearchClient;
use vcdossier_shared::{AppConfig, init_config, load_config, validate_api_key};
use vcdossier_storage::FirmStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// vcdossier: research dossiers on venture-capital firms.
#[derive(Parser)]
#[command(
    name = "vcdossier",
    version,
    about = "Build intelligence dossiers on VC firms from SEBI registry records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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

/// Export file format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research firms from the input file and write their reports.
    Run {
        /// Registry input file (JSON array). Defaults to `defaults.input_file`.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Only process these firms (repeatable).
        #[arg(short, long = "firm")]
        firms: Vec<String>,

        /// Process at most N firms.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Data directory. Defaults to `defaults.data_dir`.
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Resume a firm from its saved pages and LinkedIn links.
    Resume {
        /// Firm name as it appears in the input file.
        name: String,

        /// Registry input file (JSON array).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Data directory.
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Export every firm's final report.
    Export {
        /// Output format.
        #[arg(short, long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Output file. Defaults to `<data_dir>/vc_firms_report.<ext>`.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Data directory.
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "vcdossier=info",
        1 => "vcdossier=debug",
        _ => "vcdossier=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
        Command::Run {
            input,
            firms,
            limit,
            data_dir,
        } => cmd_run(input, &firms, limit, data_dir).await,
        Command::Resume {
            name,
            input,
            data_dir,
        } => cmd_resume(&name, input, data_dir).await,
        Command::Export {
            format,
            out,
            data_dir,
        } => cmd_export(format.into(), out, data_dir).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn data_dir_of(config: &AppConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.defaults.data_dir))
}

fn input_of(config: &AppConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.defaults.input_file))
}

/// Wire the pipeline from config: Gemini is required, search and LinkedIn
/// are optional.
fn build_pipeline(config: &AppConfig, data_dir: &Path) -> Result<Pipeline> {
    let model = GeminiClient::from_config(&config.gemini)?;
    let fetcher = fetcher_from_config(&config.scrape)?;
    let store = FirmStore::new(data_dir);

    let mut pipeline = Pipeline::new(
        Arc::new(model),
        Arc::from(fetcher),
        store,
        PipelineConfig::from(config),
    );

    match GoogleSearchClient::from_config(&config.search) {
        Ok(search) => pipeline = pipeline.with_search(Arc::new(search)),
        Err(e) => warn!(error = %e, "web search disabled; homepage lookup and GP enrichment skipped"),
    }
    if let Some(provider) = provider_from_config(&config.linkedin) {
        info!(provider = provider.name(), "LinkedIn provider enabled");
        pipeline = pipeline.with_linkedin(Arc::from(provider));
    }

    Ok(pipeline)
}

async fn cmd_run(
    input: Option<PathBuf>,
    firms: &[String],
    limit: Option<usize>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let input = input_of(&config, input);
    let data_dir = data_dir_of(&config, data_dir);
    let records = load_firm_records(&input).await?;
    let selected = select_records(&records, firms, limit)?;
    if selected.is_empty() {
        return Err(eyre!("no firms to process in {}", input.display()));
    }

    info!(
        input = %input.display(),
        data_dir = %data_dir.display(),
        firms = selected.len(),
        "starting run"
    );

    let pipeline = build_pipeline(&config, &data_dir)?;
    let reporter = CliProgress::new();
    let summary = pipeline.process_batch(&selected, &reporter).await?;
    reporter.finish();

    print_summary(&summary.outcomes);
    println!(
        "  {} succeeded, {} failed  (run {})",
        summary.succeeded, summary.failed, summary.run_id
    );
    println!();

    Ok(())
}

async fn cmd_resume(name: &str, input: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let input = input_of(&config, input);
    let data_dir = data_dir_of(&config, data_dir);
    let records = load_firm_records(&input).await?;
    let record = find_record(&records, name)
        .ok_or_else(|| eyre!("firm \"{name}\" not found in {}", input.display()))?;

    let pipeline = build_pipeline(&config, &data_dir)?;
    let reporter = CliProgress::new();
    reporter.firm_started(&record.name, 1, 1);
    let outcome = pipeline.resume_firm(record, &reporter).await?;
    reporter.finish();

    print_summary(std::slice::from_ref(&outcome));
    if !outcome.success {
        return Err(eyre!(
            "resume failed for {}: {}",
            outcome.firm_name,
            outcome.error.as_deref().unwrap_or("unknown error")
        ));
    }
    Ok(())
}

async fn cmd_export(format: ExportFormat, out: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let data_dir = data_dir_of(&config, data_dir);
    let out = out.unwrap_or_else(|| data_dir.join(format!("vc_firms_report.{}", format.extension())));

    let store = FirmStore::new(&data_dir);
    let count = export_reports(&store, format, &out).await?;
    if count == 0 {
        warn!(data_dir = %data_dir.display(), "no final reports found");
    }
    println!("Exported {count} report(s) as {format} to {}", out.display());
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
// Output
// ---------------------------------------------------------------------------

fn print_summary(outcomes: &[FirmOutcome]) {
    let width = outcomes
        .iter()
        .map(|o| o.firm_name.chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, 48);

    println!();
    println!("  {:<width$}  {:<6}  {:>5}  {:>8}  {:>6}  {:>7}", "Firm", "Status", "Pages", "LinkedIn", "GPs", "Time");
    for o in outcomes {
        let name: String = o.firm_name.chars().take(width).collect();
        let status = if o.success { "ok" } else { "FAILED" };
        println!(
            "  {:<width$}  {:<6}  {:>5}  {:>8}  {:>6}  {:>6.1}s",
            name,
            status,
            o.stats.pages_scraped,
            o.stats.profiles + o.stats.companies,
            o.stats.gp_profiles,
            o.elapsed_secs
        );
        if let Some(error) = &o.error {
            println!("      {error}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn firm_started(&self, name: &str, index: usize, total: usize) {
        self.spinner.set_prefix(format!("[{index}/{total}] {name}"));
    }

    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("Fetching [{current}/{total}] {url}"));
    }

    fn firm_done(&self, outcome: &FirmOutcome) {
        let line = if outcome.success {
            format!("✔ {} ({:.1}s)", outcome.firm_name, outcome.elapsed_secs)
        } else {
            format!(
                "✘ {}: {}",
                outcome.firm_name,
                outcome.error.as_deref().unwrap_or("failed")
            )
        };
        self.spinner.println(line);
    }
}
