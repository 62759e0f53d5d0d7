//! depcrawl CLI - crawl npm dependency graphs into a knowledge graph

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use depcrawl_core::config::{Config, GraphTarget, Traversal};
use depcrawl_core::crawl::{CrawlOptions, CrawlReport, CrawlScheduler};
use depcrawl_core::graph::{
    Claim, EntityId, MemoryGraphStore, Rank, SparqlClient, StoredEntity, Value,
};
use depcrawl_core::identity::IdentityMap;
use depcrawl_core::registry::RegistryClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Snapshot used when `--snapshot` is not given
const DEFAULT_SNAPSHOT: &str = "depcrawl-graph.json";

#[derive(Parser)]
#[command(name = "depcrawl")]
#[command(author, version, about = "Crawl npm dependency graphs into a knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the dependency graph and reconcile versions
    Crawl {
        /// Graph snapshot to read and update
        #[arg(short, long, default_value = DEFAULT_SNAPSHOT)]
        snapshot: PathBuf,
        /// Start from these packages instead of every known entity
        #[arg(long = "start", value_name = "PACKAGE")]
        start: Vec<String>,
        /// Pop from the back of the queue (depth-first)
        #[arg(long)]
        depth_first: bool,
        /// Weekly downloads a new dependency needs to get an entity
        #[arg(long)]
        threshold: Option<u64>,
        /// Maximum version claims kept per entity
        #[arg(long)]
        retention_cap: Option<usize>,
        /// Also record source repository URLs
        #[arg(long)]
        extract_repository_url: bool,
        /// Stop after this many items
        #[arg(long)]
        max_items: Option<usize>,
        /// Compute everything but do not write
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show a package's entity from a snapshot
    Inspect {
        /// Package name or entity id
        target: String,
        /// Graph snapshot to read
        #[arg(short, long, default_value = DEFAULT_SNAPSHOT)]
        snapshot: PathBuf,
    },

    /// Import package identities from a SPARQL endpoint into a snapshot
    Import {
        /// Snapshot to create or extend
        #[arg(short, long, default_value = DEFAULT_SNAPSHOT)]
        output: PathBuf,
        /// Query endpoint (defaults to graph.sparql_endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("depcrawl=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:?}");
        if let Some(hint) = hint_for(&err) {
            eprintln!("Hint: {hint}");
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Suggestion from the first depcrawl error in the cause chain
fn hint_for(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<depcrawl_core::Error>())
        .and_then(|e| e.suggestion())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Crawl {
            snapshot,
            start,
            depth_first,
            threshold,
            retention_cap,
            extract_repository_url,
            max_items,
            dry_run,
        } => {
            let config = Config::load()?;
            let mut options = CrawlOptions::from_config(&config);
            if depth_first {
                options.traversal = Traversal::DepthFirst;
            }
            if let Some(threshold) = threshold {
                options.popularity_threshold = threshold;
            }
            if let Some(cap) = retention_cap {
                anyhow::ensure!(cap > 0, "--retention-cap must be greater than zero");
                options.retention_cap = cap;
            }
            options.extract_repository_url |= extract_repository_url;
            options.max_items = max_items;
            options.dry_run = dry_run;

            cmd_crawl(&config, &snapshot, &start, options, cli.format, cli.quiet).await
        }

        Commands::Inspect { target, snapshot } => {
            cmd_inspect(&target, &snapshot, cli.format).await
        }

        Commands::Import { output, endpoint } => {
            cmd_import(&output, endpoint, cli.quiet).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

async fn cmd_crawl(
    config: &Config,
    snapshot: &Path,
    start: &[String],
    options: CrawlOptions,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let store = Arc::new(
        MemoryGraphStore::open(snapshot)
            .with_context(|| format!("Failed to open snapshot: {}", snapshot.display()))?,
    );
    let registry = Arc::new(RegistryClient::new(config.registry.clone())?);
    let schema = config.graph.schema();
    let dry_run = options.dry_run;

    let mut scheduler = CrawlScheduler::init(registry, store.clone(), schema, options)
        .await
        .context("Failed to load package identities")?;
    if !start.is_empty() {
        scheduler.seed(start).await?;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current package");
            on_signal.cancel();
        }
    });

    let report = scheduler.run(&cancel).await;

    if !dry_run {
        store
            .save(snapshot)
            .with_context(|| format!("Failed to write snapshot: {}", snapshot.display()))?;
        info!(path = %snapshot.display(), "Saved snapshot");
    }

    print_report(&report, format, quiet)
}

fn print_report(report: &CrawlReport, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!("Processed:  {}", report.processed);
    println!("Created:    {}", report.created);
    println!("Rejected:   {}", report.rejected);
    if report.skipped_dependencies > 0 {
        println!("Skipped:    {}", report.skipped_dependencies);
    }
    println!("Failed:     {}", report.failed.len());
    for failure in &report.failed {
        println!(
            "  [{}] {} ({}): {}",
            failure.code,
            failure.package.as_deref().unwrap_or("?"),
            failure.entity,
            failure.message
        );
    }
    if report.cancelled {
        println!("Crawl was interrupted before the queue drained.");
    }
    if report.truncated {
        println!("Stopped at the item limit with work still queued.");
    }
    Ok(())
}

async fn cmd_inspect(target: &str, snapshot: &Path, format: OutputFormat) -> anyhow::Result<()> {
    anyhow::ensure!(
        snapshot.exists(),
        "Snapshot not found: {}. Run `depcrawl import` or `depcrawl crawl` first.",
        snapshot.display()
    );
    let config = Config::load()?;
    let schema = config.graph.schema();
    let store = MemoryGraphStore::open(snapshot)
        .with_context(|| format!("Failed to open snapshot: {}", snapshot.display()))?;
    let identity = IdentityMap::load(&store, &schema.registry_name).await?;

    let id = match identity.get_id(target) {
        Some(id) => id.clone(),
        None => EntityId::new(target),
    };
    let entity = store
        .entity(&id)?
        .ok_or_else(|| anyhow::anyhow!("No entity for '{}' in {}", target, snapshot.display()))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entity)?);
        return Ok(());
    }

    println!("{} ({})", entity.label, id);
    println!("Revision: {}", entity.revision);
    if let Some(summary) = &entity.last_summary {
        println!("Last edit: {}", summary);
    }
    println!();
    for claim in &entity.claims {
        println!("{}", describe_claim(claim, &identity));
    }
    Ok(())
}

/// One line per claim, resolving dependency targets back to package names
fn describe_claim(claim: &Claim, identity: &IdentityMap) -> String {
    let value = match &claim.value {
        Value::Item(id) => match identity.get_ref(id) {
            Some(package) => format!("{} ({})", id, package),
            None => id.to_string(),
        },
        Value::String(s) | Value::Url(s) => s.clone(),
        Value::Time(t) => t.to_rfc3339(),
        Value::Quantity { amount, .. } => amount.to_string(),
    };
    let rank = match claim.rank {
        Rank::Preferred => " [preferred]",
        Rank::Deprecated => " [deprecated]",
        Rank::Normal => "",
    };
    format!("{}: {}{}", claim.property, value, rank)
}

async fn cmd_import(output: &Path, endpoint: Option<String>, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let schema = config.graph.schema();
    let endpoint = endpoint.unwrap_or_else(|| config.graph.sparql_endpoint.clone());

    let client = SparqlClient::new(
        endpoint.as_str(),
        &config.registry.user_agent,
        config.registry.timeout_secs,
    )?;
    let pairs = client
        .registry_names(&schema.registry_name)
        .await
        .with_context(|| format!("Identity query against {} failed", endpoint))?;

    let store = MemoryGraphStore::open(output)
        .with_context(|| format!("Failed to open snapshot: {}", output.display()))?;

    let mut added = 0;
    for (id, package) in pairs {
        if store.entity(&id)?.is_some() {
            continue;
        }
        store.insert(
            id,
            StoredEntity {
                label: package.clone(),
                claims: vec![Claim::new(
                    schema.registry_name.as_str(),
                    Value::String(package),
                )],
                revision: 1,
                last_summary: None,
            },
        )?;
        added += 1;
    }

    store
        .save(output)
        .with_context(|| format!("Failed to write snapshot: {}", output.display()))?;
    info!(added, total = store.len()?, "Imported package identities");

    if !quiet {
        println!("Imported {} packages into {}", added, output.display());
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
            if config.graph.schema.is_some() && !quiet {
                println!("(custom graph schema overrides the {} preset)", config.graph.target);
            } else if config.graph.target == GraphTarget::Sandbox && !quiet {
                println!("(writing to the sandbox graph)");
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
