//! Reltags Core - Relational tagging graph
//!
//! Named tags connected to each other (parent, child or undirected) and to
//! arbitrary tagged entities, with JSON save/load and graph searches.
//!
//! ```
//! use reltags_core::{Entity, Node, TagRegistry, TagSource};
//!
//! let mut registry = TagRegistry::new();
//! registry
//!     .load(
//!         TagSource::Hierarchy(vec![("fruit".into(), vec!["apple".into()])]),
//!         None,
//!     )
//!     .unwrap();
//! registry.connect("apple", Entity::value("gala"), None).unwrap();
//!
//! let found = registry.search_entities_by_tag("fruit", None).unwrap();
//! assert_eq!(found, vec![Entity::value("gala")]);
//! assert_eq!(
//!     registry.graph_distance(&Node::tag("fruit"), Some(&Node::from(Entity::value("gala")))),
//!     2
//! );
//! ```

pub mod connection;
pub mod entity;
pub mod error;
pub mod limits;
pub mod query;
pub mod registry;
pub mod tag;
pub mod traversal;

pub use connection::{Connection, ConnectionType, Node};
pub use entity::{Entity, EntityKind, EntityTypeRegistry, RelationalEntity, CLASS_FIELD};
pub use error::{Error, ErrorKind, Result};
pub use query::{SearchOptions, TagQuery};
pub use registry::{LoadOptions, RegistryConfig, TagRegistry, TagSource};
pub use tag::Tag;
pub use traversal::{Adjacency, TraversalEngine, TraversalStats};
