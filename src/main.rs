//! archsync - Issue synchronization and aggregation engine
//!
//! Main entry point for the archsync CLI. The sync engine itself runs inside a host
//! process that provides tracker adapters; this binary inspects its configuration and
//! stored state.

use archsync::config::{validate_config, SyncConfig};
use archsync::graph::{IssueGraph, RelationPartnerRef};
use archsync::storage::{ConversionStore, GraphRepository, SqliteStore, WalkerPriorityStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

/// archsync - sync external issue trackers into an architecture graph
#[derive(Parser, Debug)]
#[command(name = "archsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/archsync/config.yaml)
    #[arg(short, long, env = "ARCHSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database path from the config file
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the configuration file and report every problem
    ValidateConfig,

    /// Show persisted walker priorities of a sync source
    Walkers {
        /// Source ID (the ImsProject ID)
        source: String,
    },

    /// Show issue conversion records of a sync source
    Conversions {
        /// Source ID (the ImsProject ID)
        source: String,
    },

    /// Show aggregated issue counts per component version and interface
    Aggregates {
        /// Include closed aggregated issues
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = archsync::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> archsync::Result<SyncConfig> {
    let path = cli.config.clone().unwrap_or_else(SyncConfig::default_path);
    let mut config = if path.exists() {
        SyncConfig::load(&path)?
    } else if cli.config.is_some() {
        return Err(archsync::ArchSyncError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        SyncConfig::default()
    };
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }
    Ok(config)
}

fn open_store(config: &SyncConfig) -> archsync::Result<SqliteStore> {
    SqliteStore::open(&config.database.store_config())
}

async fn run(cli: Cli) -> archsync::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::ValidateConfig => {
            let errors = validate_config(&config);
            if errors.is_empty() {
                println!("Configuration is valid");
                return Ok(());
            }
            for error in &errors {
                println!("  - {}", error);
            }
            Err(archsync::ArchSyncError::Config(format!(
                "{} validation error(s)",
                errors.len()
            )))
        }

        Commands::Walkers { source } => {
            let store = open_store(&config)?;
            let mut walkers = store.list_walker_priorities(&source).await?;
            walkers.sort_by(|a, b| a.current_priority.total_cmp(&b.current_priority));
            if walkers.is_empty() {
                println!("No walkers recorded for {}", source);
            }
            for walker in walkers {
                println!("{:>10.1}  {}", walker.current_priority, walker.resource_name);
            }
            Ok(())
        }

        Commands::Conversions { source } => {
            let store = open_store(&config)?;
            let conversions = store.list_issue_conversions(&source).await?;
            if conversions.is_empty() {
                println!("No conversions recorded for {}", source);
            }
            for conversion in conversions {
                let issue = conversion
                    .issue_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  ->  {}", conversion.external_id, issue);
            }
            Ok(())
        }

        Commands::Aggregates { all } => {
            let store = open_store(&config)?;
            let graph = store.load_graph().await?;
            print_aggregates(&graph, all)
        }
    }
}

fn partner_label(graph: &IssueGraph, partner: &RelationPartnerRef) -> archsync::Result<String> {
    Ok(match partner {
        RelationPartnerRef::ComponentVersion(id) => {
            let version = graph.component_version(id)?;
            let component = graph.component(&version.component)?;
            format!("{} {}", component.name, version.version)
        }
        RelationPartnerRef::Interface(id) => {
            let interface = graph.interface(id)?;
            format!("interface {}", interface.name)
        }
    })
}

fn print_aggregates(graph: &IssueGraph, all: bool) -> archsync::Result<()> {
    let mut rows = Vec::new();
    for aggregated in graph.aggregated_issues() {
        if !all && !aggregated.is_open {
            continue;
        }
        let issue_type = graph.issue_type(&aggregated.issue_type)?;
        rows.push((
            partner_label(graph, &aggregated.relation_partner)?,
            issue_type.name.clone(),
            aggregated.is_open,
            aggregated.count,
        ));
    }
    rows.sort();

    if rows.is_empty() {
        println!("No aggregated issues");
    }
    for (partner, issue_type, is_open, count) in rows {
        let state = if is_open { "open" } else { "closed" };
        println!("{:<32} {:<16} {:<7} {:>5}", partner, issue_type, state, count);
    }
    Ok(())
}
