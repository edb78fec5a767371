//! publiccode-crawler main entry point
//!
//! This is the command-line interface for the publiccode.yml crawler.

use clap::Parser;
use publiccode_crawler::config::{load_config_with_hash, load_whitelists, Config, Publisher};
use publiccode_crawler::crawler::Crawler;
use publiccode_crawler::index::{SearchIndex, SqliteIndex};
use publiccode_crawler::storage::{RunLog, SqliteStorage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// publiccode-crawler: finds and indexes publiccode.yml files
///
/// Lists every repository of the whitelisted organizations on GitHub,
/// GitLab and Bitbucket, keeps the ones publishing a valid publiccode.yml
/// that belongs to their publisher, and publishes them as a new index
/// generation.
#[derive(Parser, Debug)]
#[command(name = "publiccode-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Crawls publiccode.yml files of public administrations", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Publisher whitelists (YAML), crawled in order
    #[arg(value_name = "WHITELIST", required_unless_present = "stats")]
    whitelists: Vec<PathBuf>,

    /// Only crawl the publisher with this code
    #[arg(long, value_name = "CODE")]
    publisher: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget pagination checkpoints and start every organization from its first page
    #[arg(long)]
    fresh: bool,

    /// Validate config and whitelists and show what would be crawled
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show the live index and the latest runs, then exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.stats {
        return handle_stats(&config);
    }

    let publishers = select_publishers(load_whitelists(&cli.whitelists)?, cli.publisher.as_deref())?;
    let crawler = Crawler::from_config(config, config_hash)?;

    if cli.dry_run {
        handle_dry_run(&crawler, &publishers);
        return Ok(());
    }

    if cli.fresh {
        crawler.clear_checkpoints()?;
    }

    handle_crawl(&crawler, &publishers).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("publiccode_crawler=info,warn"),
            1 => EnvFilter::new("publiccode_crawler=debug,info"),
            2 => EnvFilter::new("publiccode_crawler=trace,debug"),
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

fn select_publishers(
    publishers: Vec<Publisher>,
    code: Option<&str>,
) -> Result<Vec<Publisher>, Box<dyn std::error::Error>> {
    let Some(code) = code else {
        return Ok(publishers);
    };

    let selected: Vec<Publisher> = publishers
        .into_iter()
        .filter(|p| p.code.eq_ignore_ascii_case(code))
        .collect();

    if selected.is_empty() {
        return Err(format!("No publisher with code '{}' in the whitelists", code).into());
    }
    Ok(selected)
}

/// Handles the --dry-run mode: shows every organization and its first URL
fn handle_dry_run(crawler: &Crawler, publishers: &[Publisher]) {
    println!("=== publiccode-crawler Dry Run ===\n");

    let jobs = crawler.plan(publishers);

    println!("Publishers: {}", publishers.len());
    println!("Organizations and repositories: {}\n", jobs.len());
    for job in &jobs {
        println!(
            "  - [{}] {} ({})",
            job.host.id, job.organization, job.publisher.name
        );
        println!("    * {}", job.start_url);
    }

    let listed: usize = publishers
        .iter()
        .map(|p| p.organizations.len() + p.repositories.len())
        .sum();
    if listed > jobs.len() {
        println!("\n! {} URLs were skipped (see warnings)", listed - jobs.len());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows the live generation and recent runs
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}", config.output.database_path);
    println!("Index: {}\n", config.output.index_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let index = SqliteIndex::new(Path::new(&config.output.index_path))?;

    let live = index.indices_for_alias(&config.index.alias)?;
    if live.is_empty() {
        println!("Alias '{}' points at no generation", config.index.alias);
    } else {
        println!(
            "Alias '{}' -> {} ({} documents)",
            config.index.alias,
            live.join(", "),
            index.count(&config.index.alias)?
        );
    }

    println!("\nRecent runs:");
    for run in storage.recent_runs(10)? {
        println!(
            "  #{} {} {:?} documents={} failed-orgs={} started={} finished={}",
            run.id,
            run.generation,
            run.status,
            run.documents_indexed,
            run.organizations_failed,
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    crawler: &Crawler,
    publishers: &[Publisher],
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Crawling {} publishers", publishers.len());

    match crawler.run(publishers).await {
        Ok(report) => {
            if report.published() {
                tracing::info!(
                    "Crawl completed: generation {} is live ({} documents)",
                    report.generation,
                    report.metrics.repository_file_indexed
                );
            } else {
                tracing::warn!(
                    "Crawl completed but generation {} was not published",
                    report.generation
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
