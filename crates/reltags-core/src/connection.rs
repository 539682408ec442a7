//! Connection (edge) types and operations

use crate::entity::Entity;
use crate::error::{Error, Result};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of edge between a tag and its neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    /// Undirected tag-tag connection
    #[serde(alias = "to-tag-undirected")]
    ToTagUndirected,
    /// From a child tag to its parent
    #[serde(alias = "to-tag-parent")]
    ToTagParent,
    /// From a parent tag to its child
    #[serde(alias = "to-tag-child")]
    ToTagChild,
    /// From a tag to an entity
    #[serde(alias = "to-entity")]
    ToEnt,
    /// From an entity to a tag
    #[serde(alias = "entity-to-tag")]
    EntToTag,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 5] = [
        Self::ToTagUndirected,
        Self::ToTagParent,
        Self::ToTagChild,
        Self::ToEnt,
        Self::EntToTag,
    ];

    /// Type of the same edge seen from the other endpoint
    pub fn inverse(self) -> Self {
        match self {
            Self::ToTagParent => Self::ToTagChild,
            Self::ToTagChild => Self::ToTagParent,
            Self::ToEnt => Self::EntToTag,
            Self::EntToTag => Self::ToEnt,
            Self::ToTagUndirected => Self::ToTagUndirected,
        }
    }

    pub fn is_tag_tag(self) -> bool {
        matches!(
            self,
            Self::ToTagUndirected | Self::ToTagParent | Self::ToTagChild
        )
    }

    pub fn is_tag_entity(self) -> bool {
        !self.is_tag_tag()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToTagUndirected => "TO_TAG_UNDIRECTED",
            Self::ToTagParent => "TO_TAG_PARENT",
            Self::ToTagChild => "TO_TAG_CHILD",
            Self::ToEnt => "TO_ENT",
            Self::EntToTag => "ENT_TO_TAG",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TO_TAG_UNDIRECTED" | "to-tag-undirected" => Ok(Self::ToTagUndirected),
            "TO_TAG_PARENT" | "to-tag-parent" => Ok(Self::ToTagParent),
            "TO_TAG_CHILD" | "to-tag-child" => Ok(Self::ToTagChild),
            "TO_ENT" | "to-entity" => Ok(Self::ToEnt),
            "ENT_TO_TAG" | "entity-to-tag" => Ok(Self::EntToTag),
            other => Err(Error::Format(format!("unknown connection type {}", other))),
        }
    }
}

/// A node in the tag graph: a tag (by name) or a tagged entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Tag(String),
    Entity(Entity),
}

impl Node {
    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag(_))
    }

    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Self::Tag(name) => Some(name),
            Self::Entity(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Tag(_) => None,
            Self::Entity(entity) => Some(entity),
        }
    }

    /// Saved form: a tag is its name, never its connection list.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Tag(name) => Value::String(name.clone()),
            Self::Entity(entity) => entity.to_json(),
        }
    }
}

impl From<Entity> for Node {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(name) => f.write_str(name),
            Self::Entity(entity) => write!(f, "{}", entity),
        }
    }
}

/// A typed, directed edge. Always stored in pairs with its inverse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    source: Node,
    target: Node,
    connection_type: ConnectionType,
}

impl Connection {
    /// Create a connection, rejecting endpoint/type combinations that make no sense.
    pub fn new(source: Node, target: Node, connection_type: ConnectionType) -> Result<Self> {
        match (source.is_tag(), target.is_tag()) {
            (true, true) if !connection_type.is_tag_tag() => {
                return Err(Error::WrongType(format!(
                    "cannot create {} connection between tags {} and {}",
                    connection_type, source, target
                )));
            }
            (false, false) => {
                return Err(Error::WrongType(format!(
                    "cannot create {} connection between entities {} and {}",
                    connection_type, source, target
                )));
            }
            (true, false) if connection_type != ConnectionType::ToEnt => {
                return Err(Error::WrongType(format!(
                    "cannot create {} connection from tag {} to entity {}",
                    connection_type, source, target
                )));
            }
            (false, true) if connection_type != ConnectionType::EntToTag => {
                return Err(Error::WrongType(format!(
                    "cannot create {} connection from entity {} to tag {}",
                    connection_type, source, target
                )));
            }
            _ => {}
        }

        Ok(Self {
            source,
            target,
            connection_type,
        })
    }

    pub fn source(&self) -> &Node {
        &self.source
    }

    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// The same edge as seen from the target
    pub fn inverse(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
            connection_type: self.connection_type.inverse(),
        }
    }

    /// `[source, type, target]` as a JSON value
    pub fn to_json(&self) -> Value {
        Value::Array(vec![
            self.source.to_json(),
            Value::String(self.connection_type.as_str().to_string()),
            self.target.to_json(),
        ])
    }
}

impl Serialize for Connection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.source.to_json())?;
        seq.serialize_element(&self.connection_type)?;
        seq.serialize_element(&self.target.to_json())?;
        seq.end()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A saved connection before its endpoints are resolved
#[derive(Debug, Deserialize)]
pub(crate) struct RawConnection(pub Value, pub ConnectionType, pub Value);
