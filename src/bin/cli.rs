//! Page classification CLI
//!
//! Local execution entry point: crawl a site and emit labelled records,
//! validate the configuration, or summarize a finished run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pageclass::{
    error::Result,
    models::{Config, Ruleset, TermDictionary},
    pipeline,
    services::{HttpFetcher, LlmClassifier},
    storage::JsonlSink,
};

/// pageclass - Website Audience Classifier
#[derive(Parser, Debug)]
#[command(
    name = "pageclass",
    version,
    about = "Crawl a website and assign audience labels to its pages"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the configured site and write classification records
    Crawl {
        /// Append to an existing output file instead of starting fresh
        #[arg(long)]
        append: bool,
    },

    /// Validate configuration, ruleset, and term dictionary
    Validate,

    /// Summarize the records of a finished run
    Info {
        /// Path to a records file (default: the configured output path)
        #[arg(long)]
        records: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Crawl { append } => {
            config.validate()?;
            let config = Arc::new(config);

            let fetcher = HttpFetcher::new(&config.crawl)?;
            let classifier = LlmClassifier::new(&config.classifier)?;
            let sink =
                JsonlSink::create(&config.output.path, append || config.output.append).await?;

            let stats = pipeline::run_pipeline(
                Arc::clone(&config),
                Arc::new(fetcher),
                Arc::new(classifier),
                Arc::new(sink),
            )
            .await?;

            log::info!(
                "Crawl complete in {}s: {} stored, {} failed, {} skipped, {} rejected",
                (stats.finished_at - stats.started_at).num_seconds(),
                stats.stored,
                stats.failed,
                stats.skipped,
                stats.rejected
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let ruleset = Ruleset::load_or_default(&config.rules.ruleset_path);
            ruleset.validate()?;
            log::info!(
                "✓ Ruleset {} OK ({} rules)",
                ruleset.version,
                ruleset.rules.len()
            );

            let terms = TermDictionary::load_or_default(&config.rules.terms_path);
            terms.validate()?;
            log::info!("✓ Term dictionary OK ({} terms)", terms.term_count());

            log::info!("All validations passed!");
        }

        Command::Info { records } => {
            let path = records.unwrap_or_else(|| PathBuf::from(&config.output.path));
            if !path.exists() {
                log::info!("No records found at {}.", path.display());
                return Ok(());
            }

            let records = JsonlSink::read_all(&path).await?;
            log::info!("Records file: {}", path.display());
            log::info!("Total records: {}", records.len());

            let mut by_label: BTreeMap<&str, usize> = BTreeMap::new();
            let mut review = 0;
            for record in &records {
                *by_label.entry(record.label().as_str()).or_insert(0) += 1;
                if record.needs_review {
                    review += 1;
                }
            }
            for (label, count) in by_label {
                log::info!("  {}: {}", label, count);
            }
            log::info!("Needs review: {}", review);
        }
    }

    Ok(())
}
