//! Entities addressed by name on the command line

use reltags_core::{Entity, Node, RelationalEntity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A tagged thing identified only by its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub name: String,
}

impl NamedEntity {
    pub const CLASS: &'static str = "NamedEntity";

    /// Marks an entity in node arguments (`entity:<name>`)
    pub const PREFIX: &'static str = "entity:";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn entity(name: &str) -> anyhow::Result<Entity> {
        Ok(Entity::relational(Self::new(name))?)
    }
}

impl RelationalEntity for NamedEntity {
    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn serialize(&self) -> Value {
        json!({ "name": self.name })
    }
}

/// Parse a node argument: `entity:<name>` or a tag name
pub fn parse_node(arg: &str) -> anyhow::Result<Node> {
    match arg.strip_prefix(NamedEntity::PREFIX) {
        Some(name) if name.is_empty() => anyhow::bail!("Missing entity name in '{}'", arg),
        Some(name) => Ok(Node::from(NamedEntity::entity(name)?)),
        None => Ok(Node::tag(arg)),
    }
}
