//! Extension Archiver main entry point
//!
//! This is the command-line interface for one archiver batch.

use anyhow::Context;
use clap::Parser;
use extension_archiver::config::{load_config_with_hash, Config};
use extension_archiver::crawler::{build_http_client, update_batch, BatchPlan};
use extension_archiver::discover::{discover_ids, existing_ids, load_forum_roster};
use extension_archiver::output::{print_summary, BatchSummary};
use extension_archiver::state::ExtensionId;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Extension Archiver: a longitudinal archive of extension store listings
///
/// Every run appends a timestamped snapshot of each extension's store
/// listing, package and (for selected extensions) forum pages to a
/// per-extension tar archive.
#[derive(Parser, Debug)]
#[command(name = "extension-archiver")]
#[command(version = "1.0.0")]
#[command(about = "Archives browser-extension store listings over time", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also enumerate every extension listed in the store sitemap
    #[arg(long)]
    discover: bool,

    /// Validate config and show the batch partition without fetching anything
    #[arg(long, conflicts_with = "discover")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("cannot load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let forum_ids = load_roster(&config)?;
    let mut full_ids = existing_ids(&config.archive.root);
    tracing::info!("Found {} existing archives", full_ids.len());
    full_ids.extend(forum_ids.iter().cloned());

    if cli.dry_run {
        handle_dry_run(&config, &full_ids, &forum_ids);
        return Ok(());
    }

    if cli.discover {
        full_ids.extend(handle_discover(&config).await?);
    }

    let results = update_batch(&config, &full_ids, &forum_ids)
        .await
        .context("cannot start batch")?;

    let summary = BatchSummary::from_results(&results);
    tracing::info!(
        "Batch finished: {} processed, {} ok, {} need a rerun",
        summary.processed,
        summary.ok,
        summary.rerun.len()
    );
    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("extension_archiver=info,warn"),
            1 => EnvFilter::new("extension_archiver=debug,info"),
            2 => EnvFilter::new("extension_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load_roster(config: &Config) -> anyhow::Result<Vec<ExtensionId>> {
    let Some(path) = &config.archive.forum_roster else {
        return Ok(Vec::new());
    };

    let ids = load_forum_roster(path)
        .with_context(|| format!("cannot read forum roster {}", path.display()))?;
    tracing::info!("Forum roster lists {} extensions", ids.len());
    Ok(ids)
}

/// Enumerates the store sitemap; a failed enumeration is logged and the
/// batch continues with the ids already known
async fn handle_discover(config: &Config) -> anyhow::Result<Vec<ExtensionId>> {
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout())
        .context("cannot build HTTP client")?;

    match discover_ids(&client, &config.endpoints).await {
        Ok(ids) => Ok(ids.into_iter().collect()),
        Err(e) => {
            tracing::error!("Discovery failed, continuing with known ids: {}", e);
            Ok(Vec::new())
        }
    }
}

/// Handles the --dry-run mode: validates config and shows what would be updated
fn handle_dry_run(config: &Config, full_ids: &[ExtensionId], forum_ids: &[ExtensionId]) {
    println!("=== Extension Archiver Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Parallel workers: {}", config.crawler.parallel_workers);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!(
        "  Forum pacing: {}-{}ms",
        config.crawler.pacing_min_delay, config.crawler.pacing_max_delay
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nArchive:");
    println!("  Root: {}", config.archive.root.display());
    match &config.archive.forum_roster {
        Some(path) => println!("  Forum roster: {}", path.display()),
        None => println!("  Forum roster: none"),
    }

    println!("\nEndpoints:");
    println!("  Sitemap: {}", config.endpoints.sitemap);
    println!("  Overview: {}", config.endpoints.overview);
    println!("  Package: {}", config.endpoints.package);
    println!("  Reviews: {}", config.endpoints.reviews);
    println!("  Support: {}", config.endpoints.support);

    let plan = BatchPlan::partition(full_ids, forum_ids);
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would update {} extensions ({} sequentially with forums, {} in parallel)",
        plan.len(),
        plan.forum.len(),
        plan.parallel.len()
    );
}
