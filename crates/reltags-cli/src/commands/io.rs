//! Import/Export commands

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use reltags_core::LoadOptions;
use serde_json::Value;

use super::LinkType;
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct ImportArgs {
    /// Input file: a list of names or a map of tag to related tags (JSON or TOML)
    #[arg(id = "input_file", value_name = "FILE")]
    pub file: PathBuf,

    /// Role of each listed tag relative to its key
    #[arg(short = 't', long = "type", value_enum, default_value = "child")]
    pub link_type: LinkType,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Input file in save format
    #[arg(id = "input_file", value_name = "FILE")]
    pub file: PathBuf,

    /// Skip connections that cannot be loaded instead of failing
    #[arg(long)]
    pub skip_bad_conns: bool,

    /// Fail if a tag in the file already exists
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Read a tag source file; `.toml` files are converted to the JSON shape.
fn read_tag_source(path: &Path) -> anyhow::Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let is_toml = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        let table: toml::Table = toml::from_str(&content)
            .with_context(|| format!("parsing TOML {}", path.display()))?;
        Ok(serde_json::to_value(table)?)
    } else {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON {}", path.display()))
    }
}

pub fn run_import(args: &ImportArgs, _cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    tracing::info!("Importing from {:?}", args.file);

    let before = ctx.registry.len();
    let source = read_tag_source(&args.file)?;
    let total = ctx
        .registry
        .load_value(&source, Some(args.link_type.into()))?
        .len();
    ctx.save()?;

    println!(
        "Imported {} new tags from {:?} ({} total)",
        total - before,
        args.file,
        total
    );
    Ok(())
}

pub fn run_load(args: &LoadArgs, _cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    tracing::info!("Loading saved graph from {:?}", args.file);

    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let options = LoadOptions::new()
        .get_if_exists(!args.strict)
        .skip_bad_conns(args.skip_bad_conns);

    let total = ctx.registry.load_json(&content, options)?.len();
    ctx.save()?;

    println!("Loaded {:?} ({} tags total)", args.file, total);
    Ok(())
}

pub fn run_export(args: &ExportArgs, _cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Exporting {} tags", ctx.registry.len());
    let json = ctx.registry.save()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            println!("Exported {} tags to {:?}", ctx.registry.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
