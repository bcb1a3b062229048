//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use slugforge_classify::KeywordIndex;
use slugforge_core::{BatchReport, ProgressReporter, Publisher, load_documents};
use slugforge_shared::{AppConfig, expand_home, init_config, load_config, load_config_from};
use slugforge_translate::{FallbackKind, TranslationCache, TranslationService, TranslationSource};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// slugforge: categories, tags and English slugs for CJK articles.
#[derive(Parser)]
#[command(
    name = "slugforge",
    version,
    about = "Classify CJK articles, extract tags and build English URL slugs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.slugforge/slugforge.toml).
    #[arg(long, global = true, env = "SLUGFORGE_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Classify, tag and slug a JSON array of documents.
    Process {
        /// JSON file holding an array of raw documents.
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the batch report (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rebuild slugs even for documents that already have one.
        #[arg(long)]
        force: bool,

        /// Override `slug.max_len`.
        #[arg(long)]
        max_len: Option<usize>,

        /// Override `translation.batch_delay_ms`.
        #[arg(long)]
        batch_delay_ms: Option<u64>,
    },

    /// Translate terms into slug fragments through the cache and backends.
    Translate {
        /// Terms to translate.
        terms: Vec<String>,

        /// Translate the keyword index's slug vocabulary into the cache.
        #[arg(long)]
        prewarm: bool,
    },

    /// Classify a piece of text and show every subcategory score.
    Classify {
        /// Text to classify. Reads `--file` when omitted.
        text: Option<String>,

        /// Read the text from a file.
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
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
        0 => "slugforge=info",
        1 => "slugforge=debug",
        _ => "slugforge=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Process {
            input,
            output,
            force,
            max_len,
            batch_delay_ms,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(max_len) = max_len {
                config.slug.max_len = max_len;
            }
            if let Some(delay) = batch_delay_ms {
                config.translation.batch_delay_ms = delay;
            }
            config.validate()?;
            cmd_process(&config, &input, output.as_deref(), force).await
        }
        Command::Translate { terms, prewarm } => {
            cmd_translate(&resolve_config(config_path)?, &terms, prewarm).await
        }
        Command::Classify { text, file } => {
            cmd_classify(&resolve_config(config_path)?, text, file.as_deref())
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_process(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
    force: bool,
) -> Result<()> {
    let docs = load_documents(input)?;
    info!(input = %input.display(), documents = docs.len(), force, "processing documents");

    let publisher = Publisher::from_config(config)?;
    let reporter = CliProgress::new(docs.len());
    let report = publisher.process_batch(&docs, force, &reporter).await;

    match output {
        Some(path) => {
            report.write_json(path)?;
            print_summary(&report);
            println!("  Report:    {}", path.display());
            println!();
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.failed > 0 && report.succeeded == 0 {
        return Err(eyre!("all {} documents failed", report.failed));
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("  Run:       {}", report.run_id);
    println!("  Processed: {}", report.succeeded);
    println!("  Reused:    {}", report.reused());
    println!("  Failed:    {}", report.failed);
    for failure in &report.failures {
        println!("    - {}: {}", failure.id, failure.message);
    }
    println!(
        "  Translate: {} cached, {} translated, {} fallback",
        report.translation.cache_hits, report.translation.translated, report.translation.fallbacks
    );
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
}

async fn cmd_translate(config: &AppConfig, terms: &[String], prewarm: bool) -> Result<()> {
    if terms.is_empty() && !prewarm {
        return Err(eyre!("nothing to translate: pass terms or --prewarm"));
    }

    if prewarm {
        let publisher = Publisher::from_config(config)?;
        let warmed = publisher.prewarm().await;
        let stats = publisher.translator().stats();
        println!(
            "Prewarmed {warmed} terms ({} from cache, {} fallbacks)",
            stats.cache_hits, stats.fallbacks
        );
        if terms.is_empty() {
            return Ok(());
        }
    }

    let cache = Arc::new(TranslationCache::open(expand_home(
        &config.paths.translation_cache,
    )));
    let service = TranslationService::new(&config.translation, cache)?;

    for outcome in service
        .translate_batch(terms, FallbackKind::Untranslated)
        .await
    {
        let source = match &outcome.source {
            TranslationSource::Passthrough => "passthrough".to_string(),
            TranslationSource::Cached => "cache".to_string(),
            TranslationSource::Backend(name) => name.clone(),
            TranslationSource::Fallback => "fallback".to_string(),
        };
        println!("{}\t{}\t({source})", outcome.term, outcome.fragment);
    }

    if service.cache().is_degraded() {
        println!("warning: translation cache could not be written, results were not persisted");
    }
    Ok(())
}

fn cmd_classify(config: &AppConfig, text: Option<String>, file: Option<&Path>) -> Result<()> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?,
        (None, None) => return Err(eyre!("pass text to classify or --file")),
    };

    let index = Arc::new(KeywordIndex::load_or_builtin(&expand_home(
        &config.paths.keyword_index,
    )));
    let classifier = slugforge_classify::Classifier::new(index, &config.classifier);

    let result = classifier.classify(&text);
    println!(
        "{} / {} ({} / {}), confidence {}",
        result.main_category,
        result.subcategory,
        result.main_category_code,
        result.subcategory_code,
        result.confidence
    );
    for score in classifier.score_all(&text) {
        println!("  {:>4}  {}", score.score, score.subcategory);
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn document_started(&self, id: &str, _current: usize, _total: usize) {
        self.bar.set_message(id.to_string());
    }

    fn document_finished(&self, id: &str, ok: bool) {
        if !ok {
            self.bar.println(format!("  failed: {id}"));
        }
        self.bar.inc(1);
    }

    fn done(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}
