//! Connect and disconnect commands

use clap::Args;

use super::LinkType;
use crate::named::parse_node;
use crate::output::node_label;
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct ConnectArgs {
    /// Source tag
    pub tag: String,

    /// Target tag, or `entity:<name>`
    pub target: String,

    /// Role of the target relative to the source (tags only)
    #[arg(short = 't', long = "type", value_enum)]
    pub link_type: Option<LinkType>,

    /// Create missing tags
    #[arg(long)]
    pub create: bool,
}

#[derive(Args)]
pub struct DisconnectArgs {
    /// Source tag
    pub tag: String,

    /// Target tag, or `entity:<name>`
    pub target: String,
}

pub fn run_connect(args: &ConnectArgs, _cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    let target = parse_node(&args.target)?;

    if args.create {
        ctx.registry.get(&args.tag, true)?;
        if let Some(name) = target.as_tag() {
            ctx.registry.get(name, true)?;
        }
    }

    let conn = ctx
        .registry
        .connect(&args.tag, target, args.link_type.map(Into::into))?;
    ctx.save()?;

    println!(
        "Connected: {} -[{}]-> {}",
        node_label(conn.source()),
        conn.connection_type(),
        node_label(conn.target())
    );
    Ok(())
}

pub fn run_disconnect(args: &DisconnectArgs, _cli: &Cli, ctx: &mut AppContext) -> anyhow::Result<()> {
    let target = parse_node(&args.target)?;

    if !ctx.registry.is_connected(&args.tag, &target) {
        println!("'{}' is not connected to '{}'", args.tag, args.target);
        return Ok(());
    }

    ctx.registry.disconnect(&args.tag, &target);
    ctx.save()?;
    println!("Disconnected: {} -- {}", args.tag, args.target);
    Ok(())
}
