//! Output formatting utilities

use reltags_core::Node;
use serde::Serialize;

use crate::named::NamedEntity;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Pretty JSON for `--format json`
pub fn format_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Command line spelling of a node: the tag name, or `entity:<name>`
pub fn node_label(node: &Node) -> String {
    match node {
        Node::Tag(name) => name.clone(),
        Node::Entity(entity) => match entity.downcast_ref::<NamedEntity>() {
            Some(named) => format!("{}{}", NamedEntity::PREFIX, named.name),
            None => entity.to_string(),
        },
    }
}

/// `a -> b -> c`
pub fn path_label(path: &[Node]) -> String {
    path.iter().map(node_label).collect::<Vec<_>>().join(" -> ")
}
