//! Configuration source contracts.
//!
//! A [`Source`] names one external provider of configuration data and
//! advertises its capabilities through accessor methods, one trait per
//! capability. Exactly one loading capability decides how the runtime
//! loads the source: byte content handed to a parser
//! ([`ParsableSource`]), a ready-made node tree ([`NodeSource`]), or
//! per-key point lookup ([`LazySource`]). Change detection capabilities
//! ([`PollableSource`], [`WatchableSource`], [`EventSource`]) are
//! optional.

pub mod env;
pub mod file;
pub mod map;

use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::key::Key;
use crate::node::Node;

pub use env::EnvSource;
pub use file::FileSource;
pub use map::MapSource;

/// An opaque change-comparison token.
///
/// A stamp is produced at load time and handed back to the source's
/// [`PollableSource::is_modified`] on the next poll; only the source
/// interprets it (typically a content digest or an encoded modification
/// time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp(Vec<u8>);

impl Stamp {
    /// Wraps raw token bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Digests content bytes into a stamp.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).to_vec())
    }

    /// The raw token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The kind of change a source reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEventKind {
    /// The target came into existence.
    Created,
    /// The target's content changed.
    Modified,
    /// The target disappeared.
    Deleted,
}

impl fmt::Display for ChangeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Byte content loaded from a parsable source.
#[derive(Debug)]
pub struct ParsableContent {
    /// The raw content bytes.
    pub data: Vec<u8>,
    /// Self-reported media type, when the source knows it.
    pub media_type: Option<String>,
    /// Change stamp for this content, when the source supports polling.
    pub stamp: Option<Stamp>,
}

/// A node tree loaded from a tree-producing source.
#[derive(Debug)]
pub struct NodeContent {
    /// The loaded tree.
    pub node: Node,
    /// Change stamp for this tree, when the source supports polling.
    pub stamp: Option<Stamp>,
}

/// Callback handed to a self-reporting source: the changed key and the new
/// node under it (`None` when the data at the key is gone).
pub type EventListener = Box<dyn Fn(&Key, Option<Node>) + Send>;

/// A source that yields raw bytes plus a media type, parsed externally.
pub trait ParsableSource {
    /// Loads the current content, or `None` when the source has no data.
    ///
    /// # Errors
    ///
    /// Returns an error when the content exists but cannot be read.
    fn content(&self) -> Result<Option<ParsableContent>>;
}

/// A source that directly yields a node tree.
pub trait NodeSource {
    /// Loads the current tree, or `None` when the source has no data.
    ///
    /// # Errors
    ///
    /// Returns an error when the tree exists but cannot be produced.
    fn load_node(&self) -> Result<Option<NodeContent>>;
}

/// A source that answers individual key lookups instead of enumerating its
/// key space.
pub trait LazySource {
    /// Looks up the node for one fully qualified key.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup itself fails (not when the key is
    /// simply absent).
    fn node(&self, key: &Key) -> Result<Option<Node>>;
}

/// A source whose change stamp can be compared by polling.
pub trait PollableSource {
    /// Whether the source's data differs from the given stamp.
    fn is_modified(&self, stamp: &Stamp) -> bool;
}

/// A source backed by a filesystem target that can be watched for pushes.
pub trait WatchableSource {
    /// The filesystem path to watch.
    fn watch_target(&self) -> PathBuf;
}

/// A source that reports its own changes through a callback.
pub trait EventSource {
    /// Registers the change callback. The source invokes it with the
    /// changed key and the new node under that key.
    fn subscribe(&self, listener: EventListener);
}

/// A named provider of configuration data.
///
/// The default capability accessors all return `None`; implementations
/// override the ones they support. A source advertising none of the three
/// loading capabilities is rejected at aggregation setup.
pub trait Source: Send + Sync {
    /// Stable name of this source, used in diagnostics and for the
    /// deterministic ordering of equal-priority sources.
    fn name(&self) -> &str;

    /// Whether the aggregate tolerates this source having no data. A
    /// mandatory source without data is a fatal error at initial load.
    fn optional(&self) -> bool {
        false
    }

    /// The priority this source declares for itself, when it has an
    /// opinion. Explicit overrides and the reserved priority key in the
    /// source's own data both take precedence.
    fn default_priority(&self) -> Option<i32> {
        None
    }

    /// This source's parsable capability, if supported.
    fn as_parsable(&self) -> Option<&dyn ParsableSource> {
        None
    }

    /// This source's tree-producing capability, if supported.
    fn as_node_source(&self) -> Option<&dyn NodeSource> {
        None
    }

    /// This source's point-lookup capability, if supported.
    fn as_lazy(&self) -> Option<&dyn LazySource> {
        None
    }

    /// This source's polling capability, if supported.
    fn as_pollable(&self) -> Option<&dyn PollableSource> {
        None
    }

    /// This source's watchable capability, if supported.
    fn as_watchable(&self) -> Option<&dyn WatchableSource> {
        None
    }

    /// This source's self-reporting capability, if supported.
    fn as_event(&self) -> Option<&dyn EventSource> {
        None
    }
}
