//! Entity commands

use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use reltags_core::Node;

use crate::named::NamedEntity;
use crate::output::{format_json, node_label, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct EntityArgs {
    #[command(subcommand)]
    pub command: EntityCommands,
}

#[derive(Subcommand)]
pub enum EntityCommands {
    /// Tag an entity
    Tag {
        /// Tag name
        tag: String,
        /// Entity name
        name: String,
        /// Create the tag if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Remove tags from an entity
    Untag {
        /// Entity name
        name: String,
        /// Only remove this tag (default: all)
        #[arg(long)]
        tag: Option<String>,
    },
    /// List tagged entities with their tags
    List,
}

pub fn run(args: &EntityArgs, cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    match &args.command {
        EntityCommands::Tag { tag, name, create } => {
            let tag = ctx.registry.get(tag, *create)?.name().to_string();
            ctx.registry.connect(&tag, NamedEntity::entity(name)?, None)?;
            ctx.save()?;
            println!("Tagged entity: {} [{}]", name, tag);
        }
        EntityCommands::Untag { name, tag } => {
            let entity = NamedEntity::entity(name)?;
            let node = Node::from(entity.clone());
            if !ctx.registry.known(&node) {
                println!("Entity '{}' is not tagged", name);
                return Ok(());
            }

            match tag {
                Some(tag) if !ctx.registry.is_connected(tag, &node) => {
                    println!("Entity '{}' is not tagged with '{}'", name, tag);
                    return Ok(());
                }
                Some(tag) => {
                    ctx.registry.disconnect(tag, &node);
                    println!("Untagged entity: {} [{}]", name, tag);
                }
                None => {
                    ctx.registry.disconnect_entity(&entity);
                    println!("Untagged entity: {}", name);
                }
            }
            ctx.save()?;
        }
        EntityCommands::List => {
            let entities: BTreeMap<String, Vec<&str>> = ctx
                .registry
                .tagged_entities()
                .map(|(entity, _)| {
                    (
                        node_label(&Node::from(entity.clone())),
                        ctx.registry.tags_of(entity),
                    )
                })
                .collect();
            tracing::info!("Found {} tagged entities", entities.len());

            match cli.output_format() {
                OutputFormat::Json => println!("{}", format_json(&entities)?),
                OutputFormat::Text if entities.is_empty() => println!("No tagged entities"),
                OutputFormat::Text => {
                    for (label, tags) in &entities {
                        println!("{} [{}]", label, tags.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}
