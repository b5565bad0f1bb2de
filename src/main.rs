//! Sumi-Frontier main entry point
//!
//! This is the operator command-line interface for the Sumi-Frontier
//! scheduler: it validates a configuration, opens a frontier, optionally
//! replays a recovery log, and inspects or edits the queued URIs.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use sumi_frontier::config::{load_config_with_hash, Config};
use sumi_frontier::frontier::MarkerQueue;
use sumi_frontier::Frontier;
use tracing_subscriber::EnvFilter;

/// Sumi-Frontier: the scheduling core of a polite web crawler
///
/// Sumi-Frontier decides which discovered URI may be fetched next while
/// keeping per-host politeness, suppressing duplicates and recording a
/// replayable recovery log.
#[derive(Parser, Debug)]
#[command(name = "sumi-frontier")]
#[command(version = "1.0.0")]
#[command(about = "Polite crawl frontier", long_about = None)]
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

    /// Validate config and show what would be scheduled without opening a frontier
    #[arg(long)]
    dry_run: bool,

    /// Replay a recovery log from an earlier run before loading seeds
    #[arg(long, value_name = "LOG")]
    recover: Option<PathBuf>,

    /// List queued URIs matching a regular expression
    #[arg(long, value_name = "REGEX")]
    list: Option<String>,

    /// Maximum number of URIs to list
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Delete queued URIs matching a regular expression
    #[arg(long, value_name = "REGEX")]
    delete: Option<String>,

    /// Restrict --delete to one queue (pending-high, pending, or a host key)
    #[arg(long, value_name = "QUEUE", requires = "delete")]
    queue: Option<String>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if let Some(log) = &cli.recover {
        if same_path(log, &config.recovery_log_path()) {
            bail!(
                "{} is the recovery log this run would write; copy it elsewhere first",
                log.display()
            );
        }
    }

    let frontier = Frontier::new(&config).context("failed to open frontier")?;

    if let Some(log) = &cli.recover {
        let summary = frontier
            .import_recover_log(log)
            .with_context(|| format!("failed to replay {}", log.display()))?;
        println!(
            "Replayed {}: {} completed, {} rescheduled, {} already included, {} skipped lines",
            log.display(),
            summary.completed,
            summary.rescheduled,
            summary.already_included,
            summary.skipped_lines
        );
    }

    frontier.load_seeds(&config)?;

    if let Some(pattern) = &cli.delete {
        match cli.queue.as_deref().map(MarkerQueue::named) {
            Some(queue) => {
                let deleted = frontier.delete_uris_in_queue(&queue, pattern)?;
                println!("Deleted {} URIs matching {} from {}", deleted, pattern, queue);
            }
            None => {
                let deleted = frontier.delete_uris(pattern)?;
                println!("Deleted {} URIs matching {}", deleted, pattern);
            }
        }
    }

    if let Some(pattern) = &cli.list {
        handle_list(&frontier, pattern, cli.limit, cli.verbose > 0)?;
    }

    let stats = frontier.stats()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", stats);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_frontier=info,warn"),
            1 => EnvFilter::new("sumi_frontier=debug,info"),
            2 => EnvFilter::new("sumi_frontier=trace,debug"),
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

fn same_path(a: &std::path::Path, b: &std::path::Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Handles the --dry-run mode: validates config and shows what would be scheduled
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Frontier Dry Run ===\n");

    println!("Politeness:");
    println!("  Delay factor: {}", config.politeness.delay_factor);
    println!(
        "  Delay bounds: {}ms - {}ms",
        config.politeness.min_delay_ms, config.politeness.max_delay_ms
    );
    println!("  Minimum interval: {}ms", config.politeness.min_interval_ms);
    println!(
        "  Respect Crawl-delay: {}",
        config.politeness.respect_crawl_delay
    );

    println!("\nRetries:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  Retry delay: {}s", config.retry.retry_delay_seconds);

    println!("\nStorage:");
    println!("  State directory: {}", config.storage.state_dir);
    println!("  Recovery log: {}", config.recovery_log_path().display());

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);

    println!("\nSeed Domains ({}):", config.seed.len());
    for entry in &config.seed {
        println!("  - {} ({} seeds)", entry.domain, entry.urls.len());
        for url in &entry.urls {
            println!("    * {}", url);
        }
    }

    println!("\nBlacklisted Domains ({}):", config.blacklist.len());
    for entry in &config.blacklist {
        println!("  - {}", entry.domain);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would schedule {} seed URLs", config.seed_count());
}

/// Handles --list: pages through queued URIs matching `pattern`
fn handle_list(
    frontier: &Frontier,
    pattern: &str,
    limit: usize,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut marker = frontier.get_initial_marker(pattern, false)?;
    let mut listed = 0;
    while listed < limit && marker.has_next() {
        let first = marker.next_item_number();
        let page = frontier.get_uris_list(&mut marker, (limit - listed).min(100), verbose)?;
        for (offset, line) in page.iter().enumerate() {
            println!("{:>6}. {}", first + offset as u64, line);
        }
        listed += page.len();
        if page.is_empty() {
            break;
        }
    }
    println!("Listed {} URIs matching {}\n", listed, pattern);
    Ok(())
}
