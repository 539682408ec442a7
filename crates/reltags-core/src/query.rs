//! Query types for searching the tag graph

use crate::connection::ConnectionType;
use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Filter on tag names
#[derive(Debug, Clone)]
pub enum TagQuery {
    /// Whole-name match
    Exact(String),
    /// Regular expression that must match the whole name
    Pattern {
        source: String,
        case_sensitive: Regex,
        case_insensitive: Regex,
    },
}

impl TagQuery {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    /// Compile a name pattern. The pattern is anchored at both ends.
    pub fn pattern(pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        let compile = |insensitive: bool| {
            RegexBuilder::new(&anchored)
                .case_insensitive(insensitive)
                .build()
                .map_err(|e| Error::Format(format!("invalid tag pattern {}: {}", pattern, e)))
        };

        Ok(Self::Pattern {
            source: pattern.to_string(),
            case_sensitive: compile(false)?,
            case_insensitive: compile(true)?,
        })
    }

    pub fn matches(&self, name: &str, case_sensitive: bool) -> bool {
        match self {
            Self::Exact(query) if case_sensitive => name == query,
            Self::Exact(query) => name.to_lowercase() == query.to_lowercase(),
            Self::Pattern {
                case_sensitive: regex,
                ..
            } if case_sensitive => regex.is_match(name),
            Self::Pattern {
                case_insensitive, ..
            } => case_insensitive.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(query) => query,
            Self::Pattern { source, .. } => source,
        }
    }
}

/// Descendant search options (builder)
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Tag-tag connection type to follow
    pub direction: ConnectionType,

    /// Record entities found along the way
    pub include_entities: bool,

    /// Record tags found along the way
    pub include_tags: bool,

    /// Only record tags whose name matches
    pub tag_query: Option<TagQuery>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::entities()
    }
}

impl SearchOptions {
    /// Collect entities under a tag, following child connections
    pub fn entities() -> Self {
        Self {
            direction: ConnectionType::ToTagChild,
            include_entities: true,
            include_tags: false,
            tag_query: None,
        }
    }

    /// Collect tags above an entity, following parent connections
    pub fn tags() -> Self {
        Self {
            direction: ConnectionType::ToTagParent,
            include_entities: false,
            include_tags: true,
            tag_query: None,
        }
    }

    pub fn with_direction(mut self, direction: ConnectionType) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_query(mut self, query: TagQuery) -> Self {
        self.tag_query = Some(query);
        self
    }

    pub fn include_entities(mut self, include: bool) -> Self {
        self.include_entities = include;
        self
    }

    pub fn include_tags(mut self, include: bool) -> Self {
        self.include_tags = include;
        self
    }

    pub(crate) fn tag_matches(&self, name: &str, case_sensitive: bool) -> bool {
        self.tag_query
            .as_ref()
            .map_or(true, |query| query.matches(name, case_sensitive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_query() {
        let query = TagQuery::exact("Fruit");
        assert!(query.matches("fruit", false));
        assert!(!query.matches("fruit", true));
        assert!(query.matches("Fruit", true));
        assert!(!query.matches("fruits", false));
    }

    #[test]
    fn test_pattern_query_is_anchored() {
        let query = TagQuery::pattern("app.*").unwrap();
        assert!(query.matches("apple", true));
        assert!(!query.matches("pineapple", true));
        assert!(query.matches("APPLE", false));
        assert!(!query.matches("APPLE", true));
        assert_eq!(query.as_str(), "app.*");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = TagQuery::pattern("(unclosed").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn test_search_options_builder() {
        let options = SearchOptions::tags()
            .with_direction(ConnectionType::ToTagUndirected)
            .with_query(TagQuery::exact("red"))
            .include_entities(true);

        assert_eq!(options.direction, ConnectionType::ToTagUndirected);
        assert!(options.include_entities);
        assert!(options.include_tags);
        assert!(options.tag_matches("RED", false));
        assert!(!options.tag_matches("blue", false));
        assert!(SearchOptions::entities().tag_matches("anything", true));
    }
}
