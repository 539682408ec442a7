//! Tag registry: owns every tag and the reverse index of tagged entities

use crate::connection::{Connection, ConnectionType, Node, RawConnection};
use crate::entity::{Entity, EntityTypeRegistry, RelationalEntity};
use crate::error::{Error, ErrorKind, Result};
use crate::limits::validate_tag_name;
use crate::query::{SearchOptions, TagQuery};
use crate::tag::Tag;
use crate::traversal::{Adjacency, TraversalEngine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Registry configuration, fixed once tags exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Whether tag names keep their case (default: names are lowercased)
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Options for loading tags from their JSON form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Reuse a tag that already exists instead of failing with `Collision`
    pub get_if_exists: bool,

    /// Log and skip connections that cannot be resolved instead of failing
    pub skip_bad_conns: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            get_if_exists: true,
            skip_bad_conns: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_if_exists(mut self, get_if_exists: bool) -> Self {
        self.get_if_exists = get_if_exists;
        self
    }

    pub fn skip_bad_conns(mut self, skip: bool) -> Self {
        self.skip_bad_conns = skip;
        self
    }
}

/// Input shapes accepted by [`TagRegistry::load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSource {
    /// Unconnected tags; repeats are allowed
    Names(Vec<String>),
    /// Each key connected to each of its values
    Hierarchy(Vec<(String, Vec<String>)>),
}

impl TagSource {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    /// Read a JSON array of names, or an object mapping a name to one name
    /// or an array of names.
    pub fn from_value(value: &Value) -> Result<Self> {
        let as_name = |item: &Value| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::WrongType(format!("unsupported tag value {}", item)))
        };

        match value {
            Value::Array(items) => Ok(Self::Names(
                items.iter().map(as_name).collect::<Result<_>>()?,
            )),
            Value::Object(map) => {
                let mut hierarchy = Vec::with_capacity(map.len());
                for (key, targets) in map {
                    let targets = match targets {
                        Value::String(name) => vec![name.clone()],
                        Value::Array(items) => items.iter().map(as_name).collect::<Result<_>>()?,
                        other => {
                            return Err(Error::WrongType(format!(
                                "unsupported target type for {}: {}",
                                key, other
                            )))
                        }
                    };
                    hierarchy.push((key.clone(), targets));
                }
                Ok(Self::Hierarchy(hierarchy))
            }
            other => Err(Error::WrongType(format!("unsupported tags type {}", other))),
        }
    }
}

impl TryFrom<Value> for TagSource {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

impl From<BTreeMap<String, Vec<String>>> for TagSource {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self::Hierarchy(map.into_iter().collect())
    }
}

/// The tag graph
///
/// Owns all tags (by normalized name) and the reverse index from each tagged
/// entity to the tags connected to it. Every connection is stored twice: at
/// its source, and as its inverse at the target.
///
/// There is no internal locking; callers sharing a registry across threads
/// must guard the whole registry (e.g. with a `Mutex`).
#[derive(Debug, Default)]
pub struct TagRegistry {
    config: RegistryConfig,
    all_tags: BTreeMap<String, Tag>,
    tagged_entities: HashMap<Entity, HashMap<String, Connection>>,
    entity_types: EntityTypeRegistry,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.config.case_sensitive
    }

    /// Change name normalization. Only allowed while the registry has no tags.
    pub fn configure(&mut self, case_sensitive: bool) -> Result<()> {
        if case_sensitive != self.config.case_sensitive && !self.all_tags.is_empty() {
            return Err(Error::Config(format!(
                "cannot change case sensitivity with {} existing tags",
                self.all_tags.len()
            )));
        }
        self.config.case_sensitive = case_sensitive;
        Ok(())
    }

    pub fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.config.case_sensitive {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(name.to_lowercase())
        }
    }

    fn normalize_node(&self, node: &Node) -> Node {
        match node {
            Node::Tag(name) => Node::Tag(self.normalize(name).into_owned()),
            Node::Entity(_) => node.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Types
    // ─────────────────────────────────────────────────────────────────────────

    pub fn entity_types(&self) -> &EntityTypeRegistry {
        &self.entity_types
    }

    pub fn entity_types_mut(&mut self) -> &mut EntityTypeRegistry {
        &mut self.entity_types
    }

    /// Register a reconstructor used when loading entities of class `name`.
    pub fn register_entity_type<F, T>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<T> + Send + Sync + 'static,
        T: RelationalEntity,
    {
        self.entity_types.register(name, factory);
    }

    /// Register an entity type that deserializes directly from its saved JSON.
    pub fn register_entity_class<T>(&mut self, name: impl Into<String>)
    where
        T: RelationalEntity + DeserializeOwned,
    {
        self.entity_types.register_type::<T>(name);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tag Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a tag. An existing tag of the same normalized name is returned
    /// when `get_if_exists`, otherwise this fails with `Collision`.
    pub fn create(&mut self, name: &str, get_if_exists: bool) -> Result<&Tag> {
        let key = self.normalize(name).into_owned();
        validate_tag_name(&key)?;

        match self.all_tags.entry(key) {
            Entry::Occupied(entry) => {
                if get_if_exists {
                    tracing::debug!("Tag {} already exists", entry.key());
                    Ok(&*entry.into_mut())
                } else {
                    Err(Error::Collision(entry.key().clone()))
                }
            }
            Entry::Vacant(entry) => {
                tracing::info!("Created tag {}", entry.key());
                let tag = Tag::new(entry.key().clone());
                Ok(&*entry.insert(tag))
            }
        }
    }

    /// Look up a tag, creating it when missing and `create_if_missing`.
    pub fn get(&mut self, name: &str, create_if_missing: bool) -> Result<&Tag> {
        let key = self.normalize(name).into_owned();

        if !self.all_tags.contains_key(&key) {
            if !create_if_missing {
                return Err(Error::Missing(key));
            }
            tracing::debug!("Tag {} not found, creating", key);
            return self.create(&key, true);
        }

        self.all_tags.get(&key).ok_or(Error::Missing(key))
    }

    /// Look up a tag without creating it
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.all_tags.get(&*self.normalize(name))
    }

    pub fn contains_tag(&self, name: &str) -> bool {
        self.all_tags.contains_key(&*self.normalize(name))
    }

    /// All tags in name order
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.all_tags.values()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.all_tags.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.all_tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_tags.is_empty()
    }

    /// Delete a tag and every connection that points at it.
    ///
    /// Deleting an unknown tag is a logged no-op; returns whether a tag was removed.
    pub fn delete(&mut self, name: &str) -> bool {
        let key = self.normalize(name).into_owned();
        let Some(tag) = self.all_tags.remove(&key) else {
            tracing::warn!("Skipping delete of nonexistent tag {}", key);
            return false;
        };

        tracing::debug!(
            "Deleting tag {} with {} connections",
            key,
            tag.connections().len()
        );

        let this = Node::Tag(key.clone());
        for neighbor in tag.connections().keys() {
            match neighbor {
                Node::Tag(other) => {
                    if let Some(other) = self.all_tags.get_mut(other) {
                        other.connections_mut().remove(&this);
                    }
                }
                Node::Entity(entity) => self.remove_reverse_entry(entity, &key),
            }
        }

        true
    }

    /// Drop every tag and tagged entity; returns the number of tags removed.
    pub fn clear(&mut self) -> usize {
        let count = self.all_tags.len();
        self.all_tags.clear();
        self.tagged_entities.clear();
        tracing::debug!("Cleared {} tags", count);
        count
    }

    /// Whether `node` is a live tag or an entity with at least one tag
    pub fn known(&self, node: &Node) -> bool {
        match node {
            Node::Tag(name) => self.contains_tag(name),
            Node::Entity(entity) => self.tagged_entities.contains_key(entity),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connections
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect a tag to another tag or to an entity.
    ///
    /// `connection_type` defaults to `ToTagUndirected` for tag targets and
    /// `ToEnt` for entities. Both tag endpoints must already exist. An existing
    /// connection between the same pair is replaced on both sides.
    pub fn connect(
        &mut self,
        tag: &str,
        target: impl Into<Node>,
        connection_type: Option<ConnectionType>,
    ) -> Result<Connection> {
        let source = self.normalize(tag).into_owned();
        let target = self.normalize_node(&target.into());

        if !self.all_tags.contains_key(&source) {
            return Err(Error::Missing(source));
        }
        if let Node::Tag(name) = &target {
            if !self.all_tags.contains_key(name) {
                return Err(Error::Missing(name.clone()));
            }
            if *name == source {
                return Err(Error::WrongType(format!(
                    "cannot connect tag {} to itself",
                    source
                )));
            }
        }

        let connection_type = connection_type.unwrap_or(if target.is_tag() {
            ConnectionType::ToTagUndirected
        } else {
            ConnectionType::ToEnt
        });

        let connection = Connection::new(Node::Tag(source.clone()), target.clone(), connection_type)?;
        let inverse = connection.inverse();

        if let Some(tag) = self.all_tags.get_mut(&source) {
            tag.connections_mut().insert(target.clone(), connection.clone());
        }

        match &target {
            Node::Tag(name) => {
                if let Some(other) = self.all_tags.get_mut(name) {
                    other
                        .connections_mut()
                        .insert(Node::Tag(source.clone()), inverse);
                }
            }
            Node::Entity(entity) => {
                self.tagged_entities
                    .entry(entity.clone())
                    .or_insert_with(|| {
                        tracing::info!("New tagged entity {}", entity);
                        HashMap::new()
                    })
                    .insert(source.clone(), inverse);
            }
        }

        tracing::debug!("Connected {} -[{}]-> {}", source, connection_type, target);
        Ok(connection)
    }

    /// Register an already built connection. A connection from an entity is
    /// registered through its inverse.
    pub fn connect_with(&mut self, connection: &Connection) -> Result<Connection> {
        match (connection.source(), connection.target()) {
            (Node::Tag(tag), target) => {
                self.connect(tag, target.clone(), Some(connection.connection_type()))
            }
            (entity, Node::Tag(tag)) => self.connect(
                tag,
                entity.clone(),
                Some(connection.connection_type().inverse()),
            ),
            (source, target) => Err(Error::WrongType(format!(
                "cannot register connection between entities {} and {}",
                source, target
            ))),
        }
    }

    /// Remove the connection between a tag and a target, on both sides.
    ///
    /// Disconnecting a pair that is not connected is a logged no-op.
    pub fn disconnect(&mut self, tag: &str, target: &Node) {
        let source = self.normalize(tag).into_owned();
        let target = self.normalize_node(target);

        let removed = self
            .all_tags
            .get_mut(&source)
            .and_then(|tag| tag.connections_mut().remove(&target));
        if removed.is_none() {
            tracing::warn!("Tag {} is not connected to {}", source, target);
        }

        match &target {
            Node::Tag(name) => {
                let inverse_removed = self
                    .all_tags
                    .get_mut(name)
                    .and_then(|other| other.connections_mut().remove(&Node::Tag(source.clone())));
                if inverse_removed.is_none() {
                    tracing::warn!("Tag {} already disconnected from {}", name, source);
                }
            }
            Node::Entity(entity) => {
                if self.tagged_entities.contains_key(entity) {
                    self.remove_reverse_entry(entity, &source);
                } else {
                    tracing::warn!("Entity {} already untagged", entity);
                }
            }
        }
    }

    /// Remove a connection given as a value, from whichever side is the tag.
    pub fn disconnect_connection(&mut self, connection: &Connection) {
        match (connection.source(), connection.target()) {
            (Node::Tag(tag), target) => self.disconnect(tag, target),
            (entity, Node::Tag(tag)) => self.disconnect(tag, entity),
            (source, target) => {
                tracing::warn!("No tag in connection between {} and {}", source, target)
            }
        }
    }

    /// Disconnect an entity from every tag and forget it.
    pub fn disconnect_entity(&mut self, entity: &Entity) {
        let Some(bucket) = self.tagged_entities.remove(entity) else {
            tracing::info!("Entity {} already not tagged", entity);
            return;
        };

        let node = Node::Entity(entity.clone());
        for tag_name in bucket.keys() {
            if let Some(tag) = self.all_tags.get_mut(tag_name) {
                tag.connections_mut().remove(&node);
            }
        }
        tracing::debug!("Disconnected entity {} from {} tags", entity, bucket.len());
    }

    fn remove_reverse_entry(&mut self, entity: &Entity, tag: &str) {
        if let Some(bucket) = self.tagged_entities.get_mut(entity) {
            bucket.remove(tag);
            if bucket.is_empty() {
                self.tagged_entities.remove(entity);
            }
        }
    }

    /// Every tagged entity with its tag-keyed connections (entity → tag)
    pub fn tagged_entities(&self) -> impl Iterator<Item = (&Entity, &HashMap<String, Connection>)> {
        self.tagged_entities.iter()
    }

    /// Whether `tag` has a connection to `target`
    pub fn is_connected(&self, tag: &str, target: &Node) -> bool {
        let target = self.normalize_node(target);
        self.tag(tag)
            .map_or(false, |tag| tag.is_connected_to(&target))
    }

    /// Names of the tags directly connected to an entity, sorted
    pub fn tags_of(&self, entity: &Entity) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tagged_entities
            .get(entity)
            .map(|bucket| bucket.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Load
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a flat list or a hierarchy of tags.
    ///
    /// In a hierarchy each key is connected to each value with
    /// `tag_tag_type` (default `ToTagChild`: the key is the parent). Returns
    /// every tag in the registry, not only the ones just loaded.
    pub fn load(
        &mut self,
        tags: TagSource,
        tag_tag_type: Option<ConnectionType>,
    ) -> Result<Vec<&Tag>> {
        let tag_tag_type = tag_tag_type.unwrap_or(ConnectionType::ToTagChild);
        if !tag_tag_type.is_tag_tag() {
            return Err(Error::WrongType(format!(
                "{} is not a tag-tag connection type",
                tag_tag_type
            )));
        }

        match tags {
            TagSource::Names(names) => {
                tracing::info!("Loading {} tags from flat list", names.len());
                for name in &names {
                    self.create(name, true)?;
                }
            }
            TagSource::Hierarchy(hierarchy) => {
                tracing::info!("Loading {} tags from hierarchy", hierarchy.len());
                for (key, targets) in &hierarchy {
                    let key = self.create(key, true)?.name().to_string();
                    for target in targets {
                        let target = self.get(target, true)?.name().to_string();
                        self.connect(&key, Node::Tag(target), Some(tag_tag_type))?;
                    }
                }
            }
        }

        Ok(self.tags().collect())
    }

    /// [`load`](Self::load) from a JSON array or object
    pub fn load_value(
        &mut self,
        tags: &Value,
        tag_tag_type: Option<ConnectionType>,
    ) -> Result<Vec<&Tag>> {
        let source = TagSource::from_value(tags)?;
        self.load(source, tag_tag_type)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    /// `{"<name>": [[source, type, target], ...]}` for one tag
    pub fn save_tag(&self, name: &str) -> Result<String> {
        let tag = self
            .tag(name)
            .ok_or_else(|| Error::Missing(self.normalize(name).into_owned()))?;
        Ok(serde_json::to_string(tag)?)
    }

    /// JSON array of every tag's saved form, in name order
    pub fn save(&self) -> Result<String> {
        let tags: Vec<&Tag> = self.tags().collect();
        Ok(serde_json::to_string(&tags)?)
    }

    /// Load one tag and its connections from its saved form.
    pub fn load_tag(&mut self, tag_json: &str, options: LoadOptions) -> Result<&Tag> {
        let value: Value = serde_json::from_str(tag_json)?;
        self.load_tag_value(&value, options)
    }

    pub fn load_tag_value(&mut self, tag_json: &Value, options: LoadOptions) -> Result<&Tag> {
        let name = self.load_tag_inner(tag_json, options)?;
        self.all_tags.get(&name).ok_or(Error::Missing(name))
    }

    /// Load a whole graph written by [`save`](Self::save). Returns every tag
    /// in the registry.
    ///
    /// Without `get_if_exists`, fails with `Collision` when any tag in the
    /// input already existed before the load.
    pub fn load_json(&mut self, json_in: &str, options: LoadOptions) -> Result<Vec<&Tag>> {
        let value: Value = serde_json::from_str(json_in)?;
        let items = value
            .as_array()
            .ok_or_else(|| Error::Format("tags json must be an array".to_string()))?;

        // Tags created as connection targets during this load are not collisions.
        if !options.get_if_exists {
            for name in items
                .iter()
                .filter_map(|item| item.as_object()?.keys().next())
            {
                let key = self.normalize(name);
                if self.all_tags.contains_key(&*key) {
                    return Err(Error::Collision(key.into_owned()));
                }
            }
        }
        let options = options.get_if_exists(true);

        let mut loaded = Vec::with_capacity(items.len());
        for item in items {
            loaded.push(self.load_tag_inner(item, options)?);
        }
        tracing::info!("Loaded {} tags from json", loaded.len());

        self.load(TagSource::Names(loaded), None)
    }

    fn load_tag_inner(&mut self, tag_json: &Value, options: LoadOptions) -> Result<String> {
        let object = tag_json
            .as_object()
            .ok_or_else(|| Error::Format(format!("tag json must be an object: {}", tag_json)))?;

        let mut entries = object.iter();
        let (name, connections) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(Error::Format(format!(
                    "tag json must have exactly one key: {}",
                    tag_json
                )))
            }
        };

        let name = self.create(name, options.get_if_exists)?.name().to_string();
        let connections = connections.as_array().ok_or_else(|| {
            Error::Format(format!("connections of tag {} must be an array", name))
        })?;

        for connection in connections {
            match self.load_connection(&name, connection) {
                Ok(()) => {}
                Err(e) if options.skip_bad_conns && e.kind() == ErrorKind::Format => {
                    tracing::warn!("Skipping connection {} of tag {}: {}", connection, name, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(name)
    }

    fn load_connection(&mut self, tag: &str, connection: &Value) -> Result<()> {
        let RawConnection(source, connection_type, target) =
            serde_json::from_value(connection.clone()).map_err(|e| {
                Error::Format(format!("invalid connection {}: {}", connection, e))
            })?;

        match connection_type {
            ConnectionType::ToTagUndirected
            | ConnectionType::ToTagParent
            | ConnectionType::ToTagChild => {
                let target = target.as_str().ok_or_else(|| {
                    Error::Format(format!("tag connection target must be a name: {}", connection))
                })?;
                let target = self.get(target, true)?.name().to_string();
                self.connect(tag, Node::Tag(target), Some(connection_type))?;
            }
            ConnectionType::ToEnt => {
                let entity = self.entity_types.deserialize(&target)?;
                self.connect(tag, entity, Some(ConnectionType::ToEnt))?;
            }
            ConnectionType::EntToTag => {
                let entity = self.entity_types.deserialize(&source)?;
                self.connect(tag, entity, Some(ConnectionType::ToEnt))?;
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Traversal
    // ─────────────────────────────────────────────────────────────────────────

    /// Shortest path from `a` to `b`, ignoring connection direction.
    ///
    /// With no `b` (or `b == a`) the path is `[a]` when `a` is known. Empty
    /// when either node is unknown or they are disconnected.
    pub fn graph_path(&self, a: &Node, b: Option<&Node>) -> Vec<Node> {
        let a = self.normalize_node(a);
        let b = b.map(|b| self.normalize_node(b)).unwrap_or_else(|| a.clone());

        TraversalEngine::shortest_path(self, &a, &b).unwrap_or_default()
    }

    /// Number of connections on the shortest path: `0` for the same node, `-1`
    /// when disconnected or unknown.
    pub fn graph_distance(&self, a: &Node, b: Option<&Node>) -> i64 {
        self.graph_path(a, b).len() as i64 - 1
    }

    /// Entities connected to `tag` or to its descendants along `direction`
    /// (default `ToTagChild`), sorted by their text form.
    pub fn search_entities_by_tag(
        &self,
        tag: &str,
        direction: Option<ConnectionType>,
    ) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .search_entity_paths_by_tag(tag, direction)?
            .into_keys()
            .collect();
        entities.sort_by_cached_key(Entity::to_string);
        Ok(entities)
    }

    /// Like [`search_entities_by_tag`](Self::search_entities_by_tag), with the
    /// path from `tag` to each entity.
    pub fn search_entity_paths_by_tag(
        &self,
        tag: &str,
        direction: Option<ConnectionType>,
    ) -> Result<HashMap<Entity, Vec<Node>>> {
        let name = self.normalize(tag).into_owned();
        if !self.all_tags.contains_key(&name) {
            return Err(Error::Missing(name));
        }

        let options = SearchOptions::entities()
            .with_direction(Self::search_direction(direction, ConnectionType::ToTagChild)?);

        Ok(self
            .search_descendants(&Node::Tag(name), &options)
            .into_iter()
            .filter_map(|(node, path)| match node {
                Node::Entity(entity) => Some((entity, path)),
                Node::Tag(_) => None,
            })
            .collect())
    }

    /// Tags connected to `entity` and their relatives along `direction`
    /// (default `ToTagParent`), optionally filtered by name. Sorted by name.
    pub fn search_tags_of_entity(
        &self,
        entity: &Entity,
        query: Option<TagQuery>,
        direction: Option<ConnectionType>,
    ) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .search_tag_paths_of_entity(entity, query, direction)?
            .into_keys()
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    /// Like [`search_tags_of_entity`](Self::search_tags_of_entity), with the
    /// path from `entity` to each tag.
    pub fn search_tag_paths_of_entity(
        &self,
        entity: &Entity,
        query: Option<TagQuery>,
        direction: Option<ConnectionType>,
    ) -> Result<HashMap<String, Vec<Node>>> {
        let mut options = SearchOptions::tags()
            .with_direction(Self::search_direction(direction, ConnectionType::ToTagParent)?);
        options.tag_query = query;

        Ok(self
            .search_descendants(&Node::Entity(entity.clone()), &options)
            .into_iter()
            .filter_map(|(node, path)| match node {
                Node::Tag(name) => Some((name, path)),
                Node::Entity(_) => None,
            })
            .collect())
    }

    /// General descendant search; see [`TraversalEngine::descendants`].
    pub fn search_descendants(
        &self,
        start: &Node,
        options: &SearchOptions,
    ) -> HashMap<Node, Vec<Node>> {
        TraversalEngine::descendants(self, &self.normalize_node(start), options)
    }

    fn search_direction(
        direction: Option<ConnectionType>,
        default: ConnectionType,
    ) -> Result<ConnectionType> {
        let direction = direction.unwrap_or(default);
        if direction.is_tag_tag() {
            Ok(direction)
        } else {
            Err(Error::WrongType(format!(
                "search direction must be a tag-tag connection type, got {}",
                direction
            )))
        }
    }
}

impl Adjacency for TagRegistry {
    fn connections_of<'a>(&'a self, node: &Node) -> Vec<&'a Connection> {
        match node {
            Node::Tag(name) => self
                .all_tags
                .get(name)
                .map(|tag| tag.connections().values().collect())
                .unwrap_or_default(),
            Node::Entity(entity) => self
                .tagged_entities
                .get(entity)
                .map(|bucket| bucket.values().collect())
                .unwrap_or_default(),
        }
    }

    fn contains(&self, node: &Node) -> bool {
        self.known(node)
    }

    fn case_sensitive(&self) -> bool {
        self.config.case_sensitive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Leaf {
        name: String,
    }

    impl RelationalEntity for Leaf {
        fn class_name(&self) -> &str {
            "Leaf"
        }

        fn serialize(&self) -> Value {
            json!({ "name": self.name })
        }
    }

    fn leaf(name: &str) -> Entity {
        Entity::relational(Leaf {
            name: name.to_string(),
        })
        .unwrap()
    }

    fn registry_with(names: &[&str]) -> TagRegistry {
        let mut registry = TagRegistry::new();
        registry.load(TagSource::names(names.iter().copied()), None).unwrap();
        registry
    }

    #[test]
    fn test_create_and_collide() {
        let mut registry = TagRegistry::new();
        registry.create("Fruit", true).unwrap();

        assert_eq!(registry.create("FRUIT", true).unwrap().name(), "fruit");
        assert_eq!(registry.len(), 1);

        let err = registry.create("fruit", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collision);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut registry = TagRegistry::new();
        assert_eq!(registry.create("", true).unwrap_err().kind(), ErrorKind::WrongType);
    }

    #[test]
    fn test_name_limit_applies_after_lowercasing() {
        let mut registry = TagRegistry::new();
        // 'İ' is 2 bytes but lowercases to 3
        let name = "İ".repeat(crate::limits::MAX_TAG_NAME_LEN / 2);
        assert_eq!(name.len(), crate::limits::MAX_TAG_NAME_LEN);

        let err = registry.create(&name, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);
        assert!(registry.is_empty());

        let mut sensitive = TagRegistry::with_config(RegistryConfig {
            case_sensitive: true,
        });
        assert!(sensitive.create(&name, true).is_ok());
    }

    #[test]
    fn test_case_sensitive_registry() {
        let mut registry = TagRegistry::with_config(RegistryConfig {
            case_sensitive: true,
        });
        registry.create("Fruit", false).unwrap();
        registry.create("fruit", false).unwrap();
        assert_eq!(registry.tag_names(), vec!["Fruit", "fruit"]);
    }

    #[test]
    fn test_configure_is_frozen_once_tags_exist() {
        let mut registry = TagRegistry::new();
        registry.configure(true).unwrap();
        registry.create("A", true).unwrap();

        assert_eq!(registry.configure(false).unwrap_err().kind(), ErrorKind::Config);
        assert!(registry.configure(true).is_ok());
    }

    #[test]
    fn test_get() {
        let mut registry = registry_with(&["apple"]);

        assert_eq!(registry.get("APPLE", false).unwrap().name(), "apple");
        assert_eq!(registry.get("zamboni", false).unwrap_err().kind(), ErrorKind::Missing);
        assert_eq!(registry.get("zamboni", true).unwrap().name(), "zamboni");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_connect_is_symmetric() {
        let mut registry = registry_with(&["fruit", "apple"]);
        let conn = registry
            .connect("fruit", Node::tag("apple"), Some(ConnectionType::ToTagChild))
            .unwrap();

        assert_eq!(conn.connection_type(), ConnectionType::ToTagChild);
        let back = registry
            .tag("apple")
            .and_then(|tag| tag.connection_to(&Node::tag("fruit")))
            .unwrap();
        assert_eq!(back.connection_type(), ConnectionType::ToTagParent);
        assert_eq!(back, &conn.inverse());
    }

    #[test]
    fn test_connect_defaults() {
        let mut registry = registry_with(&["a", "b"]);
        let entity = Entity::value("thing");

        let tag_conn = registry.connect("a", Node::tag("b"), None).unwrap();
        assert_eq!(tag_conn.connection_type(), ConnectionType::ToTagUndirected);

        let ent_conn = registry.connect("a", entity.clone(), None).unwrap();
        assert_eq!(ent_conn.connection_type(), ConnectionType::ToEnt);
        assert!(registry.known(&Node::Entity(entity.clone())));
        assert_eq!(registry.tags_of(&entity), vec!["a"]);
    }

    #[test]
    fn test_connect_rejects_bad_combinations() {
        let mut registry = registry_with(&["t1", "t2"]);

        let err = registry
            .connect("t1", Node::tag("t2"), Some(ConnectionType::EntToTag))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);

        let err = registry
            .connect("t1", Entity::value(1u8), Some(ConnectionType::ToTagChild))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);

        let err = registry.connect("t1", Node::tag("t1"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);

        let err = registry.connect("t1", Node::tag("ghost"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Missing);

        // nothing half-written
        assert!(registry.tag("t1").unwrap().connections().is_empty());
    }

    #[test]
    fn test_connect_with_entity_source() {
        let mut registry = registry_with(&["a"]);
        let entity = Entity::value("thing");
        let conn = Connection::new(
            Node::Entity(entity.clone()),
            Node::tag("a"),
            ConnectionType::EntToTag,
        )
        .unwrap();

        let stored = registry.connect_with(&conn).unwrap();
        assert_eq!(stored, conn.inverse());
        assert!(registry.tag("a").unwrap().is_connected_to(&Node::Entity(entity)));
    }

    #[test]
    fn test_disconnect() {
        let mut registry = registry_with(&["a", "b"]);
        let entity = Entity::value("thing");
        registry.connect("a", Node::tag("b"), None).unwrap();
        registry.connect("a", entity.clone(), None).unwrap();

        assert!(registry.is_connected("A", &Node::tag("B")));
        registry.disconnect("a", &Node::tag("b"));
        registry.disconnect("a", &Node::Entity(entity.clone()));

        assert!(!registry.is_connected("a", &Node::tag("b")));
        assert!(registry.tag("a").unwrap().connections().is_empty());
        assert!(registry.tag("b").unwrap().connections().is_empty());
        assert!(!registry.known(&Node::Entity(entity.clone())));

        // repeated cleanup is tolerated
        registry.disconnect("a", &Node::tag("b"));
        registry.disconnect("a", &Node::Entity(entity));
    }

    #[test]
    fn test_disconnect_entity() {
        let mut registry = registry_with(&["a", "b", "c"]);
        let entity = Entity::value("thing");
        for tag in ["a", "b", "c"] {
            registry.connect(tag, entity.clone(), None).unwrap();
        }

        registry.disconnect_entity(&entity);

        assert!(!registry.known(&Node::Entity(entity.clone())));
        assert!(registry.tags().all(|tag| tag.connections().is_empty()));
        registry.disconnect_entity(&entity);
    }

    #[test]
    fn test_delete_removes_inverse_references() {
        let mut registry = registry_with(&["a", "b"]);
        let entity = Entity::value("thing");
        registry.connect("a", Node::tag("b"), None).unwrap();
        registry.connect("a", entity.clone(), None).unwrap();

        assert!(registry.delete("A"));
        assert!(!registry.contains_tag("a"));
        assert!(registry.tag("b").unwrap().connections().is_empty());
        assert!(!registry.known(&Node::Entity(entity)));

        assert!(!registry.delete("a"));
    }

    #[test]
    fn test_clear() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.connect("a", Entity::value(3u8), None).unwrap();

        assert_eq!(registry.clear(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.tagged_entities().count(), 0);
    }

    #[test]
    fn test_load_hierarchy() {
        let mut registry = TagRegistry::new();
        let tags = registry
            .load_value(
                &json!({
                    "fruit": ["apple", "banana", "orange"],
                    "food": ["fruit", "vegetable"],
                    "color": ["red", "orange"],
                    "sport": "football",
                }),
                None,
            )
            .unwrap();
        assert_eq!(tags.len(), 10);

        let fruit = registry.tag("fruit").unwrap();
        assert_eq!(
            fruit.related_tags(ConnectionType::ToTagChild),
            vec!["apple", "banana", "orange"]
        );
        assert_eq!(fruit.related_tags(ConnectionType::ToTagParent), vec!["food"]);
        assert_eq!(
            registry.tag("orange").unwrap().related_tags(ConnectionType::ToTagParent),
            vec!["color", "fruit"]
        );
    }

    #[test]
    fn test_load_returns_all_tags() {
        let mut registry = registry_with(&["existing"]);
        let tags = registry.load(TagSource::names(["new"]), None).unwrap();
        let names: Vec<&str> = tags.iter().map(|tag| tag.name()).collect();
        assert_eq!(names, vec!["existing", "new"]);
    }

    #[test]
    fn test_load_rejects_bad_shapes() {
        let mut registry = TagRegistry::new();
        for bad in [json!(5), json!([1, 2]), json!({ "a": 3 }), json!({ "a": [null] })] {
            let err = registry.load_value(&bad, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::WrongType, "{}", bad);
        }

        let err = registry
            .load(TagSource::names(["a"]), Some(ConnectionType::ToEnt))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);
    }

    #[test]
    fn test_save_tag_format() {
        let mut registry = registry_with(&["t1", "x"]);
        registry
            .connect("t1", Node::tag("x"), Some(ConnectionType::ToTagChild))
            .unwrap();

        assert_eq!(
            registry.save_tag("t1").unwrap(),
            r#"{"t1":[["t1","TO_TAG_CHILD","x"]]}"#
        );
        assert_eq!(registry.save_tag("nope").unwrap_err().kind(), ErrorKind::Missing);
    }

    #[test]
    fn test_load_tag_reproduces_inverse() {
        let mut registry = TagRegistry::new();
        let tag = registry
            .load_tag(r#"{"t1":[["t1","TO_TAG_CHILD","x"]]}"#, LoadOptions::default())
            .unwrap();
        assert_eq!(tag.connections().len(), 1);

        let x = registry.tag("x").unwrap();
        assert_eq!(
            x.connection_to(&Node::tag("t1")).map(Connection::connection_type),
            Some(ConnectionType::ToTagParent)
        );
    }

    #[test]
    fn test_load_tag_collision() {
        let mut registry = registry_with(&["t1"]);
        let err = registry
            .load_tag(r#"{"t1":[]}"#, LoadOptions::new().get_if_exists(false))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collision);
    }

    #[test]
    fn test_strict_load_json_into_fresh_registry() {
        let mut registry = registry_with(&["t1", "x"]);
        registry
            .connect("t1", Node::tag("x"), Some(ConnectionType::ToTagChild))
            .unwrap();
        let saved = registry.save().unwrap();

        let mut fresh = TagRegistry::new();
        let tags = fresh
            .load_json(&saved, LoadOptions::new().get_if_exists(false))
            .unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(fresh.save().unwrap(), saved);
    }

    #[test]
    fn test_strict_load_json_rejects_existing_tag() {
        let mut registry = registry_with(&["t1", "x"]);
        registry.connect("t1", Node::tag("x"), None).unwrap();
        let saved = registry.save().unwrap();

        let mut target = registry_with(&["X"]);
        let err = target
            .load_json(&saved, LoadOptions::new().get_if_exists(false))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collision);
        // nothing loaded before the collision was found
        assert_eq!(target.tag_names(), vec!["x"]);

        assert!(target.load_json(&saved, LoadOptions::default()).is_ok());
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_save_load_entities() {
        let mut registry = registry_with(&["fruit", "apple"]);
        registry.register_entity_class::<Leaf>("Leaf");
        registry
            .connect("fruit", Node::tag("apple"), Some(ConnectionType::ToTagChild))
            .unwrap();
        registry.connect("apple", leaf("green"), None).unwrap();

        let saved = registry.save().unwrap();

        let mut restored = TagRegistry::new();
        restored.register_entity_class::<Leaf>("Leaf");
        restored.load_json(&saved, LoadOptions::default()).unwrap();

        assert_eq!(restored.save().unwrap(), saved);
        assert_eq!(restored.tags_of(&leaf("green")), vec!["apple"]);
    }

    #[test]
    fn test_unregistered_entities_fail_or_skip() {
        let mut registry = registry_with(&["apple"]);
        registry.connect("apple", leaf("green"), None).unwrap();
        registry.connect("apple", Entity::value(9u32), None).unwrap();
        let saved = registry.save().unwrap();

        let mut strict = TagRegistry::new();
        let err = strict.load_json(&saved, LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let mut lenient = TagRegistry::new();
        lenient
            .load_json(&saved, LoadOptions::new().skip_bad_conns(true))
            .unwrap();
        assert!(lenient.tag("apple").unwrap().connections().is_empty());
    }

    #[test]
    fn test_load_json_rejects_malformed_text() {
        let mut registry = TagRegistry::new();
        for bad in ["not json", r#"{"a":[]}"#, r#"[{"a":[], "b":[]}]"#, r#"[{"a":5}]"#] {
            let err = registry.load_json(bad, LoadOptions::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{}", bad);
        }
    }

    #[test]
    fn test_graph_path_and_distance() {
        let mut registry = TagRegistry::new();
        registry
            .load_value(&json!({ "fruit": ["apple", "banana"], "lonely": [] }), None)
            .unwrap();
        let seed = Entity::value("seed");
        registry.connect("apple", seed.clone(), None).unwrap();

        let seed = Node::Entity(seed);
        assert_eq!(
            registry.graph_path(&seed, Some(&Node::tag("Banana"))),
            vec![seed.clone(), Node::tag("apple"), Node::tag("fruit"), Node::tag("banana")]
        );
        assert_eq!(registry.graph_distance(&Node::tag("banana"), Some(&seed)), 3);
        assert_eq!(registry.graph_distance(&Node::tag("fruit"), None), 0);
        assert_eq!(registry.graph_distance(&Node::tag("fruit"), Some(&Node::tag("lonely"))), -1);
        assert!(registry.graph_path(&Node::tag("ghost"), None).is_empty());
    }

    #[test]
    fn test_search_entities_by_tag() {
        let mut registry = TagRegistry::new();
        registry
            .load_value(&json!({ "fruit": ["apple", "banana"] }), None)
            .unwrap();
        registry.connect("apple", leaf("leaf"), None).unwrap();

        let paths = registry.search_entity_paths_by_tag("fruit", None).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[&leaf("leaf")],
            vec![Node::tag("fruit"), Node::tag("apple"), Node::Entity(leaf("leaf"))]
        );

        assert_eq!(registry.search_entities_by_tag("fruit", None).unwrap(), vec![leaf("leaf")]);
        assert!(registry
            .search_entities_by_tag("apple", Some(ConnectionType::ToTagParent))
            .unwrap()
            .contains(&leaf("leaf")));
        assert!(registry
            .search_entities_by_tag("banana", None)
            .unwrap()
            .is_empty());

        let err = registry.search_entities_by_tag("ghost", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Missing);
        let err = registry
            .search_entities_by_tag("fruit", Some(ConnectionType::ToEnt))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongType);
    }

    #[test]
    fn test_search_entities_are_sorted() {
        let mut registry = TagRegistry::new();
        registry
            .load_value(&json!({ "fruit": ["apple", "banana", "cherry"] }), None)
            .unwrap();
        for (tag, name) in [("cherry", "c"), ("apple", "a"), ("banana", "d"), ("apple", "b")] {
            registry.connect(tag, leaf(name), None).unwrap();
        }

        let found = registry.search_entities_by_tag("fruit", None).unwrap();
        assert_eq!(found, vec![leaf("a"), leaf("b"), leaf("c"), leaf("d")]);
    }

    #[test]
    fn test_search_tags_of_entity() {
        let mut registry = TagRegistry::new();
        registry
            .load_value(
                &json!({ "food": "fruit", "fruit": "apple", "color": "red" }),
                None,
            )
            .unwrap();
        let entity = leaf("gala");
        registry.connect("apple", entity.clone(), None).unwrap();
        registry.connect("red", entity.clone(), None).unwrap();

        assert_eq!(
            registry.search_tags_of_entity(&entity, None, None).unwrap(),
            vec!["apple", "color", "food", "fruit", "red"]
        );
        assert_eq!(
            registry
                .search_tags_of_entity(&entity, Some(TagQuery::pattern("f.*").unwrap()), None)
                .unwrap(),
            vec!["food", "fruit"]
        );
        assert_eq!(
            registry
                .search_tags_of_entity(&entity, Some(TagQuery::exact("RED")), None)
                .unwrap(),
            vec!["red"]
        );

        let paths = registry.search_tag_paths_of_entity(&entity, None, None).unwrap();
        assert_eq!(
            paths["food"],
            vec![
                Node::Entity(entity.clone()),
                Node::tag("apple"),
                Node::tag("fruit"),
                Node::tag("food")
            ]
        );

        assert!(registry
            .search_tags_of_entity(&leaf("unknown"), None, None)
            .unwrap()
            .is_empty());
    }
}
