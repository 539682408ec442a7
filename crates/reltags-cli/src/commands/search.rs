//! Search commands

use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use reltags_core::{Node, TagQuery};

use super::LinkType;
use crate::named::NamedEntity;
use crate::output::{format_json, node_label, path_label, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct SearchArgs {
    #[command(subcommand)]
    pub command: SearchCommands,
}

#[derive(Subcommand)]
pub enum SearchCommands {
    /// Entities tagged with a tag or any of its descendants
    Entities {
        /// Tag to start from
        tag: String,
        /// Connection type to follow between tags
        #[arg(short, long, value_enum, default_value = "child")]
        direction: LinkType,
        /// Show the path to each entity
        #[arg(long)]
        paths: bool,
    },
    /// Tags of an entity and their ancestors
    Tags {
        /// Entity name
        entity: String,
        /// Only tags whose whole name matches this regex
        #[arg(long)]
        query: Option<String>,
        /// Connection type to follow between tags
        #[arg(short, long, value_enum, default_value = "parent")]
        direction: LinkType,
        /// Show the path to each tag
        #[arg(long)]
        paths: bool,
    },
}

pub fn run(args: &SearchArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let results: BTreeMap<String, Vec<Node>> = match &args.command {
        SearchCommands::Entities { tag, direction, .. } => ctx
            .registry
            .search_entity_paths_by_tag(tag, Some((*direction).into()))?
            .into_iter()
            .map(|(entity, path)| (node_label(&Node::from(entity)), path))
            .collect(),
        SearchCommands::Tags {
            entity,
            query,
            direction,
            ..
        } => {
            let query = query.as_deref().map(TagQuery::pattern).transpose()?;
            ctx.registry
                .search_tag_paths_of_entity(
                    &NamedEntity::entity(entity)?,
                    query,
                    Some((*direction).into()),
                )?
                .into_iter()
                .collect()
        }
    };
    tracing::info!("Found {} results", results.len());

    let show_paths = match &args.command {
        SearchCommands::Entities { paths, .. } | SearchCommands::Tags { paths, .. } => *paths,
    };

    match cli.output_format() {
        OutputFormat::Json if show_paths => {
            let labelled: BTreeMap<&String, Vec<String>> = results
                .iter()
                .map(|(key, path)| (key, path.iter().map(node_label).collect()))
                .collect();
            println!("{}", format_json(&labelled)?);
        }
        OutputFormat::Json => {
            let keys: Vec<&String> = results.keys().collect();
            println!("{}", format_json(&keys)?);
        }
        OutputFormat::Text if results.is_empty() => println!("No results found"),
        OutputFormat::Text => {
            for (key, path) in &results {
                if show_paths {
                    println!("{}: {}", key, path_label(path));
                } else {
                    println!("{}", key);
                }
            }
        }
    }

    Ok(())
}
