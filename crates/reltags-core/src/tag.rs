//! Tag (node) type

use crate::connection::{Connection, ConnectionType, Node};
use crate::entity::Entity;
use crate::query::TagQuery;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A named tag and its adjacency
///
/// Each neighbor (tag or entity) appears exactly once in `connections`, and
/// every stored connection has `source == Node::Tag(name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    connections: HashMap<Node, Connection>,
}

impl Tag {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            connections: HashMap::new(),
        }
    }

    /// Normalized tag name (unique within its registry)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> Node {
        Node::Tag(self.name.clone())
    }

    pub fn connections(&self) -> &HashMap<Node, Connection> {
        &self.connections
    }

    pub(crate) fn connections_mut(&mut self) -> &mut HashMap<Node, Connection> {
        &mut self.connections
    }

    pub fn connection_to(&self, node: &Node) -> Option<&Connection> {
        self.connections.get(node)
    }

    pub fn is_connected_to(&self, node: &Node) -> bool {
        self.connections.contains_key(node)
    }

    /// Names of connected tags with the given connection type
    pub fn related_tags(&self, connection_type: ConnectionType) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .connections
            .values()
            .filter(|conn| conn.connection_type() == connection_type)
            .filter_map(|conn| conn.target().as_tag())
            .collect();
        names.sort_unstable();
        names
    }

    /// Entities tagged directly with this tag
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.connections.keys().filter_map(Node::as_entity)
    }

    pub fn matches(&self, query: &TagQuery, case_sensitive: bool) -> bool {
        query.matches(&self.name, case_sensitive)
    }

    /// Connections in a stable order, for saving
    fn sorted_connections(&self) -> Vec<&Connection> {
        let mut conns: Vec<(String, &Connection)> = self
            .connections
            .values()
            .map(|conn| (conn.to_string(), conn))
            .collect();
        conns.sort_by(|a, b| a.0.cmp(&b.0));
        conns.into_iter().map(|(_, conn)| conn).collect()
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.sorted_connections())?;
        map.end()
    }
}

/// `{"<name>": [[source, type, target], ...]}`
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
