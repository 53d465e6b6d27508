//! Course-Scout main entry point
//!
//! This is the command-line interface for the Course-Scout course crawler.

use anyhow::{bail, Context};
use clap::Parser;
use course_scout::config::{load_config_with_hash, Config, InstitutionEntry};
use course_scout::output::{export_records, format_job_status, load_statistics, print_statistics};
use course_scout::schema::{compile, JsonSchemaSource};
use course_scout::storage::open_storage;
use course_scout::{CompiledSchema, Coordinator};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Course-Scout: schema-driven course discovery
///
/// Course-Scout crawls an institution's website, recognises course pages
/// by CSS selectors and stores one structured record per course page.
#[derive(Parser, Debug)]
#[command(name = "course-scout")]
#[command(version = "1.0.0")]
#[command(about = "Schema-driven course discovery crawler", long_about = None)]
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

    /// Crawl a configured institution
    #[arg(long, value_name = "ID", group = "mode")]
    crawl: Option<String>,

    /// Extract a single page and print its record
    #[arg(long, value_name = "URL", group = "mode")]
    url: Option<String>,

    /// Process the pages listed in a file, one URL per line
    #[arg(long, value_name = "FILE", group = "mode", requires = "institution")]
    url_list: Option<PathBuf>,

    /// Institution whose schema and selectors are used with --url or --url-list
    #[arg(long, value_name = "ID")]
    institution: Option<String>,

    /// Show job status for one institution, or all of them
    #[arg(long, value_name = "ID", num_args = 0..=1, group = "mode")]
    status: Option<Option<String>>,

    /// Cancel a queued or in-progress crawl
    #[arg(long, value_name = "ID", group = "mode")]
    cancel: Option<String>,

    /// Export an institution's stored records as JSON
    #[arg(long, value_name = "ID", group = "mode", requires = "out")]
    export: Option<String>,

    /// Output file for --export
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Validate config and schemas and show what would be crawled
    #[arg(long, group = "mode")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let config_dir = cli
        .config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if cli.dry_run {
        handle_dry_run(&config, &config_dir)
    } else if let Some(status) = &cli.status {
        handle_status(&config, status.as_deref())
    } else if let Some(id) = &cli.cancel {
        handle_cancel(config, id)
    } else if let (Some(id), Some(out)) = (&cli.export, &cli.out) {
        handle_export(&config, id, out)
    } else if let Some(id) = &cli.crawl {
        handle_crawl(config, &config_dir, id).await
    } else if let Some(url) = &cli.url {
        handle_url(config, &config_dir, url, cli.institution.as_deref()).await
    } else if let (Some(list), Some(id)) = (&cli.url_list, &cli.institution) {
        handle_url_list(config, &config_dir, list, id).await
    } else {
        bail!("Nothing to do: pass one of --crawl, --url, --url-list, --status, --cancel, --export or --dry-run")
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("course_scout=info,warn"),
            1 => EnvFilter::new("course_scout=debug,info"),
            2 => EnvFilter::new("course_scout=trace,debug"),
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

fn institution<'a>(config: &'a Config, id: &str) -> anyhow::Result<&'a InstitutionEntry> {
    config
        .institution(id)
        .ok_or_else(|| course_scout::ScoutError::UnknownInstitution(id.to_string()).into())
}

/// Loads and compiles an institution's schema document
fn load_schema(entry: &InstitutionEntry, config_dir: &Path) -> anyhow::Result<CompiledSchema> {
    let source = JsonSchemaSource::new(entry.resolve_schema_path(config_dir));
    let descriptors = source
        .load(&entry.target_fields)
        .with_context(|| format!("Failed to load schema for {}", entry.id))?;
    Ok(compile(&descriptors))
}

/// Handles the --dry-run mode: validates config and schemas
fn handle_dry_run(config: &Config, config_dir: &Path) -> anyhow::Result<()> {
    println!("=== Course-Scout Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Idle backoff: {}ms", config.crawler.idle_backoff_ms);
    println!("  Match threshold: {:.2}", config.crawler.match_threshold);
    match config.crawler.job_timeout_secs {
        Some(secs) => println!("  Job time budget: {}s", secs),
        None => println!("  Job time budget: unlimited"),
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nInstitutions ({}):", config.institutions.len());
    let mut unusable = 0;
    for entry in &config.institutions {
        println!("  - {} ({}, up to {} records)", entry.id, entry.start_url, entry.max_records);
        println!("    Course selectors: {}", entry.course_selectors.join(", "));
        match load_schema(entry, config_dir) {
            Ok(schema) if !schema.is_empty() => {
                println!("    Schema fields: {}", schema.total_leaf_count());
            }
            Ok(_) => {
                unusable += 1;
                println!("    Schema: no usable fields");
            }
            Err(e) => {
                unusable += 1;
                println!("    Schema: {:#}", e);
            }
        }
    }

    println!("\n✓ Configuration is valid");
    if unusable > 0 {
        println!("✗ {} institution(s) have no usable schema", unusable);
    }

    Ok(())
}

/// Handles the --status mode
fn handle_status(config: &Config, institution_id: Option<&str>) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, institution_id)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --cancel mode
fn handle_cancel(config: Config, institution_id: &str) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;
    let job = coordinator.cancel(institution_id)?;
    println!("{}", format_job_status(&job));
    Ok(())
}

/// Handles the --export mode
fn handle_export(config: &Config, institution_id: &str, out: &Path) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let count = export_records(&storage, institution_id, out)
        .with_context(|| format!("Failed to export records to {}", out.display()))?;
    println!("✓ Exported {} records to: {}", count, out.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_dir: &Path, institution_id: &str) -> anyhow::Result<()> {
    let entry = institution(&config, institution_id)?.clone();
    let source = JsonSchemaSource::new(entry.resolve_schema_path(config_dir));
    let coordinator = Coordinator::new(config)?;

    coordinator.start_crawl(entry.crawl_request())?;
    let job = coordinator
        .run_with_source(&entry.id, &source, &entry.target_fields)
        .await?;

    println!("{}", format_job_status(&job));
    Ok(())
}

/// Handles the --url mode: prints the page's record as JSON
async fn handle_url(
    config: Config,
    config_dir: &Path,
    url: &str,
    institution_id: Option<&str>,
) -> anyhow::Result<()> {
    let entry = match institution_id {
        Some(id) => institution(&config, id)?,
        None => config
            .institutions
            .first()
            .context("No institution configured to take a schema from")?,
    }
    .clone();

    let schema = load_schema(&entry, config_dir)?;
    let coordinator = Coordinator::new(config)?;
    let record = coordinator
        .scrape_url(
            url,
            &entry.course_selectors,
            entry.hero_image_selector.as_deref(),
            schema,
        )
        .await?;

    match record {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No course record found at {}", url),
    }
    Ok(())
}

/// Handles the --url-list mode
async fn handle_url_list(
    config: Config,
    config_dir: &Path,
    list: &Path,
    institution_id: &str,
) -> anyhow::Result<()> {
    let entry = institution(&config, institution_id)?.clone();
    let urls = read_url_list(list)?;
    tracing::info!("Read {} URLs from {}", urls.len(), list.display());

    let schema = load_schema(&entry, config_dir)?;
    let coordinator = Coordinator::new(config)?;
    let job = coordinator
        .scrape_urls(&entry.id, &urls, entry.hero_image_selector.clone(), schema)
        .await?;

    println!("{}", format_job_status(&job));
    Ok(())
}

/// Reads one URL per line, skipping blank lines and `#` comments
fn read_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
