//! CLI command implementations

use clap::ValueEnum;
use reltags_core::ConnectionType;

pub mod completions;
pub mod connect;
pub mod entity;
pub mod io;
pub mod path;
pub mod search;
pub mod tag;

/// Tag-tag connection type as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkType {
    Undirected,
    Parent,
    Child,
}

impl From<LinkType> for ConnectionType {
    fn from(t: LinkType) -> Self {
        match t {
            LinkType::Undirected => ConnectionType::ToTagUndirected,
            LinkType::Parent => ConnectionType::ToTagParent,
            LinkType::Child => ConnectionType::ToTagChild,
        }
    }
}
