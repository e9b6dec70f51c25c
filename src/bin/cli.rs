//! Floodlight CLI
//!
//! Runs find and fetch against the metric store directly, without the API
//! server:
//! - Resolve a glob into branches and leaves
//! - Fetch aligned series for a glob
//! - Print a default config file

use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use floodlight::backend::HttpMetricStore;
use floodlight::config::{generate_default_config, Config};
use floodlight::query::{FetchResult, Node, QueryEngine};

#[derive(Parser)]
#[command(name = "floodlight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Glob queries and aligned series over a rollup metrics store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: FLOODLIGHT_CONFIG or the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a glob into branches and leaves
    Find {
        /// Dotted glob, e.g. "servers.*.cpu"
        pattern: String,
    },

    /// Fetch aligned series for every leaf a glob matches
    Fetch {
        /// Dotted glob
        pattern: String,
        /// Start, epoch seconds (default: 24 hours before until)
        #[arg(long)]
        from: Option<i64>,
        /// End, epoch seconds (default: now)
        #[arg(long)]
        until: Option<i64>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("failed to write {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    let engine = build_engine(&config)?;

    match cli.command {
        Commands::Find { pattern } => {
            let nodes = engine.find(&pattern).await?;
            match cli.format.as_str() {
                "json" => {
                    let paths: Vec<_> = nodes
                        .iter()
                        .map(|n| serde_json::json!({"path": n.path().to_string(), "leaf": n.is_leaf()}))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&paths)?);
                }
                _ => print_nodes(&nodes),
            }
        }
        Commands::Fetch {
            pattern,
            from,
            until,
        } => {
            let until = until.unwrap_or_else(|| Utc::now().timestamp());
            let from = from.unwrap_or(until.saturating_sub(86_400));
            if from >= until {
                anyhow::bail!("--from ({}) must be before --until ({})", from, until);
            }

            let nodes = engine.find(&pattern).await?;
            let result = engine.fetch(&nodes, from, until).await?;
            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&result)?),
                _ => print_series(&result),
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn build_engine(config: &Config) -> anyhow::Result<QueryEngine> {
    let store = HttpMetricStore::new(config.backend.store_config()?, config.backend.token_provider())?;
    let settings = config.engine_settings()?;
    Ok(QueryEngine::new(Arc::new(store), settings))
}

fn print_nodes(nodes: &[Node]) {
    if nodes.is_empty() {
        println!("No matches.");
        return;
    }
    println!("{:<8} {}", "Kind", "Path");
    println!("{}", "-".repeat(60));
    for node in nodes {
        let kind = if node.is_leaf() { "leaf" } else { "branch" };
        println!("{:<8} {}", kind, node.path());
    }
}

fn print_series(result: &FetchResult) {
    let info = result.time_info;
    println!(
        "Window: {} .. {} step {}s",
        format_timestamp(info.start),
        format_timestamp(info.end),
        info.step
    );
    if result.series.is_empty() {
        println!("No series.");
        return;
    }

    for (target, values) in &result.series {
        let present = values.iter().filter(|v| v.is_some()).count();
        println!();
        println!("{} ({}/{} points)", target, present, values.len());
        for (i, value) in values.iter().enumerate() {
            let ts = info.start + i as i64 * info.step;
            match value {
                Some(v) => println!("  {}  {}", format_timestamp(ts), v.as_f64()),
                None => println!("  {}  -", format_timestamp(ts)),
            }
        }
    }
}

fn format_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| secs.to_string())
}
