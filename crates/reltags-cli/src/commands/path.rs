//! Path and distance commands

use clap::Args;
use serde_json::json;

use crate::named::parse_node;
use crate::output::{format_json, node_label, path_label, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct PathArgs {
    /// Start tag, or `entity:<name>`
    pub from: String,

    /// End tag, or `entity:<name>`
    pub to: String,
}

pub fn run_path(args: &PathArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let from = parse_node(&args.from)?;
    let to = parse_node(&args.to)?;
    let path = ctx.registry.graph_path(&from, Some(&to));

    match cli.output_format() {
        OutputFormat::Json => {
            let labels: Vec<String> = path.iter().map(node_label).collect();
            println!("{}", format_json(&labels)?);
        }
        OutputFormat::Text if path.is_empty() => {
            println!("No path between '{}' and '{}'", args.from, args.to)
        }
        OutputFormat::Text => println!("{}", path_label(&path)),
    }
    Ok(())
}

pub fn run_distance(args: &PathArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let from = parse_node(&args.from)?;
    let to = parse_node(&args.to)?;
    let distance = ctx.registry.graph_distance(&from, Some(&to));

    match cli.output_format() {
        OutputFormat::Json => println!(
            "{}",
            format_json(&json!({ "from": args.from, "to": args.to, "distance": distance }))?
        ),
        OutputFormat::Text => println!("{}", distance),
    }
    Ok(())
}
