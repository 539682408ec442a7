//! Entity identity and the relational entity protocol
//!
//! Anything can be tagged. An [`Entity`] is the map-key identity the registry
//! uses for a tagged value; it is built in one of three ways:
//!
//! - [`Entity::value`] for values with their own `Hash + Eq`
//! - [`Entity::opaque`] for values without one, keyed by type and reference
//! - [`Entity::relational`] for [`RelationalEntity`] implementors, which can
//!   also round-trip through the JSON save format

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Reserved field naming an entity's class in its serialized form
pub const CLASS_FIELD: &str = "class";

/// Capability for entity types that can be saved and loaded with the graph
///
/// `stable_hash` and `equals` must agree: equal entities hash the same.
pub trait RelationalEntity: fmt::Debug + Send + Sync + 'static {
    /// Name the type is registered under in an [`EntityTypeRegistry`]
    fn class_name(&self) -> &str;

    /// JSON form of the entity. Objects get the `class` field added on save.
    fn serialize(&self) -> Value;

    fn stable_hash(&self) -> Result<u64> {
        let text = serde_json::to_string(&self.serialize())?;
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Ok(hasher.finish())
    }

    fn equals(&self, other: &dyn RelationalEntity) -> bool {
        self.class_name() == other.class_name() && self.serialize() == other.serialize()
    }
}

/// How an entity's identity was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// The value's own `Hash + Eq`
    Value,
    /// Runtime type plus reference address
    Opaque,
    /// The [`RelationalEntity`] protocol
    Relational,
}

trait EntityRepr: fmt::Debug + Send + Sync {
    fn kind(&self) -> EntityKind;
    fn value_any(&self) -> &dyn Any;
    fn same_as(&self, other: &dyn EntityRepr) -> bool;

    fn as_relational(&self) -> Option<&dyn RelationalEntity> {
        None
    }
}

struct Plain<T>(T);

impl<T: fmt::Debug> fmt::Debug for Plain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<T> EntityRepr for Plain<T>
where
    T: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn kind(&self) -> EntityKind {
        EntityKind::Value
    }

    fn value_any(&self) -> &dyn Any {
        &self.0
    }

    fn same_as(&self, other: &dyn EntityRepr) -> bool {
        other.kind() == EntityKind::Value
            && other
                .value_any()
                .downcast_ref::<T>()
                .is_some_and(|value| value == &self.0)
    }
}

struct Opaque<T>(Arc<T>);

impl<T: fmt::Debug> fmt::Debug for Opaque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<T> EntityRepr for Opaque<T>
where
    T: fmt::Debug + Send + Sync + 'static,
{
    fn kind(&self) -> EntityKind {
        EntityKind::Opaque
    }

    fn value_any(&self) -> &dyn Any {
        &*self.0
    }

    fn same_as(&self, other: &dyn EntityRepr) -> bool {
        other.kind() == EntityKind::Opaque
            && other
                .value_any()
                .downcast_ref::<T>()
                .is_some_and(|value| std::ptr::eq(value, Arc::as_ptr(&self.0)))
    }
}

struct Relational<T>(T);

impl<T: fmt::Debug> fmt::Debug for Relational<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<T: RelationalEntity> EntityRepr for Relational<T> {
    fn kind(&self) -> EntityKind {
        EntityKind::Relational
    }

    fn value_any(&self) -> &dyn Any {
        &self.0
    }

    fn same_as(&self, other: &dyn EntityRepr) -> bool {
        other
            .as_relational()
            .is_some_and(|entity| self.0.equals(entity))
    }

    fn as_relational(&self) -> Option<&dyn RelationalEntity> {
        Some(&self.0)
    }
}

/// Identity key of a tagged value
///
/// Cheap to clone; the hash is computed once at construction.
#[derive(Clone)]
pub struct Entity {
    repr: Arc<dyn EntityRepr>,
    hash: u64,
}

impl Entity {
    /// Wrap a value that already has a stable `Hash + Eq` contract.
    pub fn value<T>(value: T) -> Self
    where
        T: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        let mut hasher = DefaultHasher::new();
        EntityKind::Value.hash(&mut hasher);
        TypeId::of::<T>().hash(&mut hasher);
        value.hash(&mut hasher);

        Self {
            hash: hasher.finish(),
            repr: Arc::new(Plain(value)),
        }
    }

    /// Wrap a value that has no identity of its own.
    ///
    /// Two structurally equal values in different allocations are different
    /// entities; clones of the same `Arc` are the same entity.
    pub fn opaque<T>(value: Arc<T>) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        let mut hasher = DefaultHasher::new();
        EntityKind::Opaque.hash(&mut hasher);
        std::any::type_name::<T>().hash(&mut hasher);
        (Arc::as_ptr(&value) as usize).hash(&mut hasher);

        Self {
            hash: hasher.finish(),
            repr: Arc::new(Opaque(value)),
        }
    }

    /// Wrap a [`RelationalEntity`], using its own hash and equality.
    pub fn relational<T: RelationalEntity>(value: T) -> Result<Self> {
        let stable = value.stable_hash().map_err(|e| {
            Error::HashFail(format!("{} ({:?}): {}", value.class_name(), value, e))
        })?;

        let mut hasher = DefaultHasher::new();
        EntityKind::Relational.hash(&mut hasher);
        value.class_name().hash(&mut hasher);
        stable.hash(&mut hasher);

        Ok(Self {
            hash: hasher.finish(),
            repr: Arc::new(Relational(value)),
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.repr.kind()
    }

    /// Borrow the wrapped value, whichever way the identity was built.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.repr.value_any().downcast_ref::<T>()
    }

    pub fn as_relational(&self) -> Option<&dyn RelationalEntity> {
        self.repr.as_relational()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.as_relational().map(|entity| entity.class_name())
    }

    /// Whether this entity can be written to and read back from the save format
    pub fn is_serializable(&self) -> bool {
        self.as_relational().is_some()
    }

    /// JSON form used inside saved connections.
    ///
    /// Entities outside the relational protocol are written as their debug
    /// text and cannot be loaded back.
    pub fn to_json(&self) -> Value {
        match self.as_relational() {
            Some(entity) => {
                let mut value = entity.serialize();
                if let Value::Object(map) = &mut value {
                    map.entry(CLASS_FIELD)
                        .or_insert_with(|| Value::String(entity.class_name().to_string()));
                }
                value
            }
            None => Value::String(format!("{:?}", self.repr)),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.repr.same_as(&*other.repr)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.repr, f)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_relational() {
            Some(_) => write!(f, "{}", self.to_json()),
            None => write!(f, "{:?}", self.repr),
        }
    }
}

type Factory = Box<dyn Fn(&Value) -> Result<Entity> + Send + Sync>;

/// Class-name keyed reconstructors for relational entities
#[derive(Default)]
pub struct EntityTypeRegistry {
    factories: HashMap<String, Factory>,
}

impl EntityTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reconstructor for entities saved with `class == name`.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register<F, T>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<T> + Send + Sync + 'static,
        T: RelationalEntity,
    {
        let name = name.into();
        tracing::debug!("Registered entity type {}", name);
        self.factories.insert(
            name,
            Box::new(move |value| Entity::relational(factory(value)?)),
        );
    }

    /// Register a type that deserializes straight from its saved JSON.
    pub fn register_type<T>(&mut self, name: impl Into<String>)
    where
        T: RelationalEntity + DeserializeOwned,
    {
        let name = name.into();
        let class = name.clone();
        self.register(name, move |value: &Value| {
            serde_json::from_value::<T>(value.clone())
                .map_err(|e| Error::Format(format!("invalid {} entity {}: {}", class, value, e)))
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered class names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Rebuild an entity from its saved JSON, dispatching on the `class` field.
    pub fn deserialize(&self, value: &Value) -> Result<Entity> {
        let class = value
            .get(CLASS_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Format(format!("entity {} has no {} field", value, CLASS_FIELD)))?;

        let factory = self
            .factories
            .get(class)
            .ok_or_else(|| Error::Format(format!("unknown entity class {}", class)))?;

        factory(value)
    }
}

impl fmt::Debug for EntityTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTypeRegistry")
            .field("classes", &self.names())
            .finish()
    }
}
