//! Error types for the strata library.
//!
//! This module provides the error hierarchy for source loading, tree
//! merging, and change propagation, using `thiserror` for ergonomic error
//! handling.

use thiserror::Error;

/// Result type alias for operations that may fail with a strata error.
///
/// # Examples
///
/// ```
/// use strata::{Error, Result};
///
/// fn example_operation() -> Result<u16> {
///     Ok(8080)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the strata library.
///
/// This enum encompasses all error conditions that can occur while loading
/// sources, merging node trees, and resolving key tokens.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration key could not be parsed.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey {
        /// The offending key text.
        key: String,
        /// The reason the key is invalid.
        reason: String,
    },

    /// Two node trees could not be reconciled during a merge.
    #[error("merge conflict at '{key}': {detail}")]
    MergeConflict {
        /// The full key where the conflict occurred.
        key: String,
        /// Details about the conflicting shapes and their sources.
        detail: String,
    },

    /// A `${token}` reference in an object member name could not be
    /// resolved against the merged tree.
    #[error("unresolved key token '{token}': {reason}")]
    UnresolvedToken {
        /// The referenced token name.
        token: String,
        /// The reason the token could not be resolved.
        reason: String,
    },

    /// No registered parser supports the requested media type.
    #[error("no parser registered for media type '{media_type}'")]
    ParserNotFound {
        /// The unsupported media type.
        media_type: String,
    },

    /// A parsable source did not report a media type and none could be
    /// probed.
    #[error("cannot determine media type for source '{source_name}'")]
    UnknownMediaType {
        /// The name of the source.
        source_name: String,
    },

    /// A source's content could not be parsed into a node tree.
    #[error("failed to parse source '{source_name}' as '{media_type}': {reason}")]
    Parse {
        /// The name of the source.
        source_name: String,
        /// The media type the content was parsed as.
        media_type: String,
        /// The underlying parse failure.
        reason: String,
    },

    /// A mandatory source produced no data at initial load.
    #[error("mandatory source '{source_name}' has no data")]
    SourceUnavailable {
        /// The name of the source.
        source_name: String,
    },

    /// A source advertises none of the supported loading capabilities.
    #[error(
        "source '{source_name}' advertises no loading capability; a source must \
         be parsable, tree-producing, or support point lookup"
    )]
    SourceCapability {
        /// The name of the source.
        source_name: String,
    },

    /// A source runtime was loaded more than once. This signals a
    /// lifecycle bug in the caller.
    #[error("source '{source_name}' was already loaded; load must be called exactly once")]
    AlreadyLoaded {
        /// The name of the source.
        source_name: String,
    },

    /// A source runtime was used before its one-time load.
    #[error("source '{source_name}' was used before it was loaded")]
    NotLoaded {
        /// The name of the source.
        source_name: String,
    },

    /// A reserved configuration key inside a source's own data holds a
    /// value that cannot be interpreted.
    #[error("invalid reserved key '{key}' in source '{source_name}': {reason}")]
    ReservedKey {
        /// The name of the source.
        source_name: String,
        /// The reserved key.
        key: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A filesystem watch could not be established.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    /// Check if the error is a merge conflict.
    #[must_use]
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, Self::MergeConflict { .. })
    }

    /// Check if the error is an unresolved key token.
    #[must_use]
    pub fn is_unresolved_token(&self) -> bool {
        matches!(self, Self::UnresolvedToken { .. })
    }
}
