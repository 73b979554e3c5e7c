//! Parsing of raw source content into node trees.
//!
//! A [`Parser`] turns the byte content of a parsable source into an object
//! node tree, selected by media type. Parsers are registered explicitly on
//! the [`ParserRegistry`] assembled by the aggregate builder; there is no
//! ambient discovery.

pub mod json;
pub mod properties;
pub mod yaml;

use std::path::Path;

use crate::error::{Error, Result};
use crate::node::Node;

pub use json::JsonParser;
pub use properties::PropertiesParser;
pub use yaml::YamlParser;

/// Media type of Java-style properties content.
pub const MEDIA_TYPE_PROPERTIES: &str = "text/x-java-properties";
/// Media type of YAML content.
pub const MEDIA_TYPE_YAML: &str = "application/x-yaml";
/// Media type of JSON content.
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// A format parser turning raw bytes into an object node tree.
pub trait Parser: Send + Sync {
    /// Parses `data` into an object-rooted node tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the content is not valid for the format.
    fn parse(&self, data: &[u8]) -> Result<Node>;

    /// The media types this parser supports.
    fn supported_media_types(&self) -> &[&str];
}

/// An explicit, ordered collection of parsers.
///
/// The first registered parser supporting a media type wins, so embedders
/// can override the defaults by registering their own parser first.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in properties, YAML, and JSON
    /// parsers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PropertiesParser);
        registry.register(YamlParser);
        registry.register(JsonParser);
        registry
    }

    /// Registers a parser.
    pub fn register(&mut self, parser: impl Parser + 'static) {
        self.parsers.push(Box::new(parser));
    }

    /// Finds a parser for the given media type.
    #[must_use]
    pub fn find(&self, media_type: &str) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.supported_media_types().contains(&media_type))
            .map(Box::as_ref)
    }

    /// All media types supported by the registered parsers.
    #[must_use]
    pub fn supported_media_types(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.supported_media_types().iter().copied())
            .collect()
    }

    /// Parses `data` as `media_type` on behalf of the named source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParserNotFound`] for an unsupported media type and
    /// [`Error::Parse`] when the content is invalid.
    pub fn parse(&self, source: &str, data: &[u8], media_type: &str) -> Result<Node> {
        let parser = self.find(media_type).ok_or_else(|| Error::ParserNotFound {
            media_type: media_type.to_string(),
        })?;
        parser.parse(data).map_err(|e| match e {
            // Parsers fill media type and reason; the registry knows which
            // source the content came from.
            Error::Parse {
                media_type: mt,
                reason,
                ..
            } => Error::Parse {
                source_name: source.to_string(),
                media_type: mt,
                reason,
            },
            other => Error::Parse {
                source_name: source.to_string(),
                media_type: media_type.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

/// Detects a media type from a file extension.
#[must_use]
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "properties" => Some(MEDIA_TYPE_PROPERTIES),
        "yaml" | "yml" => Some(MEDIA_TYPE_YAML),
        "json" => Some(MEDIA_TYPE_JSON),
        _ => None,
    }
}
