//! Reltags CLI - Command line interface for the relational tag graph

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reltags_core::{LoadOptions, RegistryConfig, TagRegistry};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod named;
mod output;

use commands::{completions, connect, entity, io, path, search, tag};
use config::Config;
use named::NamedEntity;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "reltags")]
#[command(author, version, about = "Relational tagging graph")]
pub struct Cli {
    /// Graph file (JSON save format)
    #[arg(long, global = true, env = "RELTAGS_FILE")]
    pub file: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true, env = "RELTAGS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keep tag name case instead of lowercasing
    #[arg(long, global = true)]
    pub case_sensitive: bool,

    /// Output format: text, json
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tags
    Tag(tag::TagArgs),
    /// Connect a tag to another tag or an entity
    Connect(connect::ConnectArgs),
    /// Remove the connection between a tag and a target
    Disconnect(connect::DisconnectArgs),
    /// Tag and untag entities
    Entity(entity::EntityArgs),
    /// Search below a tag or above an entity
    Search(search::SearchArgs),
    /// Shortest path between two nodes
    Path(path::PathArgs),
    /// Number of connections between two nodes
    Distance(path::PathArgs),
    /// Import a tag list or hierarchy (JSON or TOML)
    Import(io::ImportArgs),
    /// Load a saved graph into the current one
    Load(io::LoadArgs),
    /// Write the graph in save format
    Export(io::ExportArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the loaded graph
pub struct AppContext {
    pub registry: TagRegistry,
    pub graph_file: PathBuf,
}

impl AppContext {
    pub fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(config::config_file_path);
        let config = Config::load(&config_path)?;

        let graph_file = cli
            .file
            .clone()
            .or(config.graph_file)
            .unwrap_or_else(config::default_graph_file);
        tracing::debug!("Using graph file at: {:?}", graph_file);

        let mut registry = TagRegistry::with_config(RegistryConfig {
            case_sensitive: cli.case_sensitive || config.case_sensitive,
        });
        registry.register_entity_class::<NamedEntity>(NamedEntity::CLASS);

        if graph_file.exists() {
            let content = std::fs::read_to_string(&graph_file)
                .with_context(|| format!("reading {}", graph_file.display()))?;
            if !content.trim().is_empty() {
                registry
                    .load_json(&content, LoadOptions::default())
                    .with_context(|| format!("loading {}", graph_file.display()))?;
            }
        }

        Ok(Self {
            registry,
            graph_file,
        })
    }

    /// Write the graph back to its file
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.graph_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = self.registry.save()?;
        std::fs::write(&self.graph_file, json)
            .with_context(|| format!("writing {}", self.graph_file.display()))?;
        tracing::debug!(
            "Saved {} tags to {:?}",
            self.registry.len(),
            self.graph_file
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting reltags CLI");

    if let Commands::Completions(args) = &cli.command {
        return completions::run(args);
    }

    let mut ctx = AppContext::open(&cli)?;

    match &cli.command {
        Commands::Tag(args) => tag::run(args, &cli, &mut ctx)?,
        Commands::Connect(args) => connect::run_connect(args, &cli, &mut ctx)?,
        Commands::Disconnect(args) => connect::run_disconnect(args, &cli, &mut ctx)?,
        Commands::Entity(args) => entity::run(args, &cli, &mut ctx)?,
        Commands::Search(args) => search::run(args, &cli, &ctx)?,
        Commands::Path(args) => path::run_path(args, &cli, &ctx)?,
        Commands::Distance(args) => path::run_distance(args, &cli, &ctx)?,
        Commands::Import(args) => io::run_import(args, &cli, &mut ctx)?,
        Commands::Load(args) => io::run_load(args, &cli, &mut ctx)?,
        Commands::Export(args) => io::run_export(args, &cli, &ctx)?,
        Commands::Completions(_) => {}
    }

    Ok(())
}
