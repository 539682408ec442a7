//! Tag commands

use clap::{Args, Subcommand};
use reltags_core::{ConnectionType, Tag};
use serde::Serialize;

use crate::output::{format_json, node_label, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommands,
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// Create tags
    New {
        /// Tag names
        #[arg(required = true)]
        names: Vec<String>,
        /// Fail if a tag already exists
        #[arg(long)]
        strict: bool,
    },
    /// Delete tags and every connection to them
    Delete {
        /// Tag names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show a tag's neighbors
    Get {
        /// Tag name
        name: String,
    },
    /// List all tags
    List,
    /// Print a tag in save format
    Show {
        /// Tag name
        name: String,
    },
}

/// Neighbors of a tag grouped by connection type
#[derive(Debug, Serialize)]
struct TagSummary<'a> {
    name: &'a str,
    parents: Vec<&'a str>,
    children: Vec<&'a str>,
    related: Vec<&'a str>,
    entities: Vec<String>,
}

impl<'a> TagSummary<'a> {
    fn new(tag: &'a Tag) -> Self {
        let mut entities: Vec<String> = tag
            .connections()
            .keys()
            .filter(|node| !node.is_tag())
            .map(node_label)
            .collect();
        entities.sort();

        Self {
            name: tag.name(),
            parents: tag.related_tags(ConnectionType::ToTagParent),
            children: tag.related_tags(ConnectionType::ToTagChild),
            related: tag.related_tags(ConnectionType::ToTagUndirected),
            entities,
        }
    }
}

pub fn run(args: &TagArgs, cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    match &args.command {
        TagCommands::New { names, strict } => {
            for name in names {
                let tag = ctx.registry.create(name, !strict)?;
                println!("Tag: {}", tag.name());
            }
            ctx.save()?;
        }
        TagCommands::Delete { names } => {
            let mut deleted = 0;
            for name in names {
                if ctx.registry.delete(name) {
                    deleted += 1;
                    println!("Deleted tag: {}", name);
                } else {
                    println!("Tag '{}' not found", name);
                }
            }
            if deleted > 0 {
                ctx.save()?;
            }
        }
        TagCommands::Get { name } => {
            let Some(tag) = ctx.registry.tag(name) else {
                anyhow::bail!("Tag '{}' not found", name);
            };
            let summary = TagSummary::new(tag);

            match cli.output_format() {
                OutputFormat::Json => println!("{}", format_json(&summary)?),
                OutputFormat::Text => {
                    println!("Tag: {}", summary.name);
                    for (label, names) in [
                        ("Parents", &summary.parents),
                        ("Children", &summary.children),
                        ("Related", &summary.related),
                    ] {
                        if !names.is_empty() {
                            println!("  {}: {}", label, names.join(", "));
                        }
                    }
                    if !summary.entities.is_empty() {
                        println!("  Entities: {}", summary.entities.join(", "));
                    }
                }
            }
        }
        TagCommands::List => {
            let names = ctx.registry.tag_names();
            tracing::info!("Found {} tags", names.len());

            match cli.output_format() {
                OutputFormat::Json => println!("{}", format_json(&names)?),
                OutputFormat::Text if names.is_empty() => println!("No tags found"),
                OutputFormat::Text => {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
        }
        TagCommands::Show { name } => {
            println!("{}", ctx.registry.save_tag(name)?);
        }
    }

    Ok(())
}
