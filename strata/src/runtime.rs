//! Per-source runtime.
//!
//! A [`SourceRuntime`] wraps one registered [`Source`] and gives the
//! aggregation engine a uniform surface over the three loading contracts:
//! parsable byte content, ready-made node trees, and lazy point lookup.
//! The runtime owns the source's last-loaded tree and change stamp,
//! resolves its effective priority, and serializes its load/reload path so
//! the source is never queried concurrently with itself.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::key::Key;
use crate::node::{Node, Origin};
use crate::parser::ParserRegistry;
use crate::reserved;
use crate::source::{ChangeEventKind, Source, Stamp};
use crate::sync;

/// Priority used when neither an override, nor the source's own data, nor
/// the source itself declares one. Higher numeric values win merges.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Polling interval used when a source's data does not configure one.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(10);

/// Which loading contract a source satisfies, decided once at
/// construction from the capability set the source advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    Parsable,
    Tree,
    Lazy,
}

struct RuntimeState {
    loaded: bool,
    tree: Option<Node>,
    stamp: Option<Stamp>,
    loaded_priority: Option<i32>,
    polling_enabled: bool,
    polling_interval: Duration,
    changes_enabled: bool,
    watch_enabled: bool,
}

impl Default for RuntimeState {
    fn default() -> Self {
        // The polling configuration for the first load cannot depend on
        // values that load supplies, so these defaults stand alone.
        Self {
            loaded: false,
            tree: None,
            stamp: None,
            loaded_priority: None,
            polling_enabled: true,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            changes_enabled: true,
            watch_enabled: true,
        }
    }
}

/// Runtime wrapper around one configuration source.
pub struct SourceRuntime {
    source: Arc<dyn Source>,
    parsers: Arc<ParserRegistry>,
    kind: LoadKind,
    priority_override: Option<i32>,
    state: Mutex<RuntimeState>,
}

impl SourceRuntime {
    /// Classifies the source and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceCapability`] when the source advertises none
    /// of the three loading capabilities.
    pub fn new(
        source: Arc<dyn Source>,
        parsers: Arc<ParserRegistry>,
        priority_override: Option<i32>,
    ) -> Result<Self> {
        let kind = if source.as_parsable().is_some() {
            LoadKind::Parsable
        } else if source.as_node_source().is_some() {
            LoadKind::Tree
        } else if source.as_lazy().is_some() {
            LoadKind::Lazy
        } else {
            return Err(Error::SourceCapability {
                source_name: source.name().to_string(),
            });
        };

        Ok(Self {
            source,
            parsers,
            kind,
            priority_override,
            state: Mutex::new(RuntimeState::default()),
        })
    }

    /// Name of the wrapped source.
    #[must_use]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Whether the wrapped source is tolerated to have no data.
    #[must_use]
    pub fn optional(&self) -> bool {
        self.source.optional()
    }

    /// Whether the source only answers point lookups.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.kind == LoadKind::Lazy
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &dyn Source {
        &*self.source
    }

    /// The effective priority: explicit override, else the reserved
    /// priority key from the source's own data, else the source's declared
    /// default, else [`DEFAULT_PRIORITY`].
    #[must_use]
    pub fn priority(&self) -> i32 {
        let loaded = sync::lock(&self.state).loaded_priority;
        self.effective_priority(loaded)
    }

    fn effective_priority(&self, loaded_priority: Option<i32>) -> i32 {
        self.priority_override
            .or(loaded_priority)
            .or_else(|| self.source.default_priority())
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// First, one-time load of the source.
    ///
    /// Reads the reserved keys out of the loaded data (priority, polling
    /// and change-support settings) and stamps provenance on the tree.
    /// Lazy sources load no tree here; their reserved keys are read
    /// through point lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyLoaded`] on a second call,
    /// [`Error::SourceUnavailable`] for a mandatory eager source without
    /// data, and propagates read, parse, and reserved-key failures.
    pub fn load(&self) -> Result<Option<Node>> {
        let mut state = sync::lock(&self.state);
        if state.loaded {
            return Err(Error::AlreadyLoaded {
                source_name: self.name().to_string(),
            });
        }

        let (tree, stamp) = self.fetch()?;
        if tree.is_none() && !self.optional() && !self.is_lazy() {
            return Err(Error::SourceUnavailable {
                source_name: self.name().to_string(),
            });
        }

        state.loaded_priority = self.reserved_i32(tree.as_ref(), reserved::SOURCE_PRIORITY)?;
        state.polling_enabled = self
            .reserved_bool(tree.as_ref(), reserved::POLLING_ENABLED)?
            .unwrap_or(true);
        if let Some(seconds) = self.reserved_u64(tree.as_ref(), reserved::POLLING_INTERVAL)? {
            state.polling_interval = Duration::from_secs(seconds);
        }
        state.changes_enabled = self
            .reserved_bool(tree.as_ref(), reserved::CHANGES_ENABLED)?
            .unwrap_or(true);
        state.watch_enabled = self
            .reserved_bool(tree.as_ref(), reserved::WATCH_ENABLED)?
            .unwrap_or(true);

        let priority = self.effective_priority(state.loaded_priority);
        let tagged = tree.map(|t| t.with_origin(&Origin::new(self.name(), priority)));
        state.tree = tagged.clone();
        state.stamp = stamp;
        state.loaded = true;
        Ok(tagged)
    }

    /// Re-executes the load logic, replacing the cached tree and stamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the one-time load and
    /// propagates read and parse failures.
    pub fn reload(&self) -> Result<Option<Node>> {
        let mut state = sync::lock(&self.state);
        if !state.loaded {
            return Err(Error::NotLoaded {
                source_name: self.name().to_string(),
            });
        }

        let (tree, stamp) = self.fetch()?;
        let priority = self.effective_priority(state.loaded_priority);
        let tagged = tree.map(|t| t.with_origin(&Origin::new(self.name(), priority)));
        state.tree = tagged.clone();
        state.stamp = stamp;
        Ok(tagged)
    }

    /// Point lookup for one key.
    ///
    /// Lazy sources delegate to the source itself; eager sources answer
    /// from their cached tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] for an eager source queried before its
    /// load, and propagates lookup failures of lazy sources.
    pub fn node(&self, key: &Key) -> Result<Option<Node>> {
        if self.is_lazy() {
            if let Some(lazy) = self.source.as_lazy() {
                let priority = self.priority();
                return Ok(lazy
                    .node(key)?
                    .map(|n| n.with_origin(&Origin::new(self.name(), priority))));
            }
        }

        let state = sync::lock(&self.state);
        if !state.loaded {
            return Err(Error::NotLoaded {
                source_name: self.name().to_string(),
            });
        }
        Ok(state.tree.as_ref().and_then(|t| t.lookup(key)).cloned())
    }

    /// The last-loaded tree, if any.
    #[must_use]
    pub fn cached_tree(&self) -> Option<Node> {
        sync::lock(&self.state).tree.clone()
    }

    /// Whether polling is enabled for this source (reserved key, default
    /// `true`).
    #[must_use]
    pub fn polling_enabled(&self) -> bool {
        sync::lock(&self.state).polling_enabled
    }

    /// The polling interval for this source (reserved key, default 10s).
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        sync::lock(&self.state).polling_interval
    }

    /// Whether change detection is enabled for this source (reserved key,
    /// default `true`).
    #[must_use]
    pub fn changes_enabled(&self) -> bool {
        sync::lock(&self.state).changes_enabled
    }

    /// Whether the watcher is preferred for this source (reserved key,
    /// default `true`).
    #[must_use]
    pub fn watch_enabled(&self) -> bool {
        sync::lock(&self.state).watch_enabled
    }

    /// One polling round: compare the change stamp, and reload when it
    /// moved. Returns the change to apply, or `None` when nothing should
    /// propagate.
    pub(crate) fn poll_cycle(&self) -> Option<(ChangeEventKind, Option<Node>)> {
        let modified = {
            let state = sync::lock(&self.state);
            let pollable = self.source.as_pollable()?;
            match &state.stamp {
                Some(stamp) => pollable.is_modified(stamp),
                None => true,
            }
        };
        if !modified {
            return None;
        }
        log::debug!("source '{}' reports a modified stamp", self.name());
        self.change_from_reload(ChangeEventKind::Modified)
    }

    /// Reloads after a change signal and classifies the outcome. A reload
    /// failure or a mandatory source losing its data is logged and treated
    /// as unchanged; an optional source losing its data propagates as a
    /// deletion.
    pub(crate) fn change_from_reload(
        &self,
        kind: ChangeEventKind,
    ) -> Option<(ChangeEventKind, Option<Node>)> {
        match self.reload() {
            Err(e) => {
                log::warn!(
                    "reload of source '{}' failed during change detection: {e}; keeping previous data",
                    self.name()
                );
                None
            }
            Ok(Some(tree)) => Some((kind, Some(tree))),
            Ok(None) if self.optional() => Some((ChangeEventKind::Deleted, None)),
            Ok(None) => {
                log::info!(
                    "mandatory source '{}' is not available, ignoring change",
                    self.name()
                );
                None
            }
        }
    }

    fn fetch(&self) -> Result<(Option<Node>, Option<Stamp>)> {
        match self.kind {
            LoadKind::Parsable => {
                let Some(parsable) = self.source.as_parsable() else {
                    return Err(Error::SourceCapability {
                        source_name: self.name().to_string(),
                    });
                };
                let Some(content) = parsable.content()? else {
                    return Ok((None, None));
                };
                let Some(media_type) = content.media_type else {
                    return Err(Error::UnknownMediaType {
                        source_name: self.name().to_string(),
                    });
                };
                let stamp = content
                    .stamp
                    .unwrap_or_else(|| Stamp::of_bytes(&content.data));
                let node = self.parsers.parse(self.name(), &content.data, &media_type)?;
                Ok((Some(node), Some(stamp)))
            }
            LoadKind::Tree => {
                let Some(node_source) = self.source.as_node_source() else {
                    return Err(Error::SourceCapability {
                        source_name: self.name().to_string(),
                    });
                };
                match node_source.load_node()? {
                    Some(content) => Ok((Some(content.node), content.stamp)),
                    None => Ok((None, None)),
                }
            }
            LoadKind::Lazy => Ok((None, None)),
        }
    }

    fn reserved_value(&self, tree: Option<&Node>, key_text: &str) -> Result<Option<String>> {
        let key = Key::parse(key_text)?;
        if self.is_lazy() {
            if let Some(lazy) = self.source.as_lazy() {
                return Ok(lazy
                    .node(&key)?
                    .and_then(|n| n.direct_value().map(str::to_string)));
            }
        }
        Ok(tree
            .and_then(|t| t.lookup(&key))
            .and_then(|n| n.direct_value().map(str::to_string)))
    }

    fn reserved_i32(&self, tree: Option<&Node>, key: &str) -> Result<Option<i32>> {
        self.reserved_value(tree, key)?
            .map(|text| {
                text.parse().map_err(|_| Error::ReservedKey {
                    source_name: self.name().to_string(),
                    key: key.to_string(),
                    reason: format!("'{text}' is not an integer"),
                })
            })
            .transpose()
    }

    fn reserved_u64(&self, tree: Option<&Node>, key: &str) -> Result<Option<u64>> {
        self.reserved_value(tree, key)?
            .map(|text| {
                text.parse().map_err(|_| Error::ReservedKey {
                    source_name: self.name().to_string(),
                    key: key.to_string(),
                    reason: format!("'{text}' is not a number of seconds"),
                })
            })
            .transpose()
    }

    fn reserved_bool(&self, tree: Option<&Node>, key: &str) -> Result<Option<bool>> {
        self.reserved_value(tree, key)?
            .map(|text| {
                text.parse().map_err(|_| Error::ReservedKey {
                    source_name: self.name().to_string(),
                    key: key.to_string(),
                    reason: format!("'{text}' is not a boolean"),
                })
            })
            .transpose()
    }
}
