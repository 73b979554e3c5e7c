//! Builder assembling an [`Aggregate`] from explicitly registered parts.
//!
//! There is no ambient discovery: every source and every non-default
//! parser is registered by the caller, and the builder hands back one
//! self-contained aggregate handle.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::Result;
use crate::key::Key;
use crate::node::{self, flatten, merge, Node};
use crate::parser::{JsonParser, Parser, ParserRegistry, PropertiesParser, YamlParser};
use crate::runtime::SourceRuntime;
use crate::source::Source;
use crate::sync;

use super::{Aggregate, Mechanisms, Shared, Snapshot};

struct Registration {
    source: Arc<dyn Source>,
    priority: Option<i32>,
}

/// Builder for [`Aggregate`].
///
/// # Examples
///
/// ```no_run
/// use strata::source::{EnvSource, FileSource};
/// use strata::AggregateBuilder;
///
/// let aggregate = AggregateBuilder::new()
///     .source(FileSource::new("config/application.yaml"))
///     .source_with_priority(EnvSource::new(), 300)
///     .build()
///     .unwrap();
/// # drop(aggregate);
/// ```
pub struct AggregateBuilder {
    registrations: Vec<Registration>,
    parsers: ParserRegistry,
    use_default_parsers: bool,
    key_resolution: bool,
    changes_enabled: bool,
    poll_interval: Option<Duration>,
}

impl Default for AggregateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateBuilder {
    /// Creates a builder with the default parsers, key-token resolution
    /// enabled, and change support enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            parsers: ParserRegistry::new(),
            use_default_parsers: true,
            key_resolution: true,
            changes_enabled: true,
            poll_interval: None,
        }
    }

    /// Registers a source at its own priority (explicit data, declared
    /// default, or the global default).
    #[must_use]
    pub fn source(mut self, source: impl Source + 'static) -> Self {
        self.registrations.push(Registration {
            source: Arc::new(source),
            priority: None,
        });
        self
    }

    /// Registers a source with an explicit priority override. The
    /// override beats everything the source declares about itself.
    #[must_use]
    pub fn source_with_priority(mut self, source: impl Source + 'static, priority: i32) -> Self {
        self.registrations.push(Registration {
            source: Arc::new(source),
            priority: Some(priority),
        });
        self
    }

    /// Registers a parser ahead of the defaults, so it wins for any media
    /// type both support.
    #[must_use]
    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parsers.register(parser);
        self
    }

    /// Disables the built-in properties/YAML/JSON parsers.
    #[must_use]
    pub fn without_default_parsers(mut self) -> Self {
        self.use_default_parsers = false;
        self
    }

    /// Enables or disables key-token resolution (`${name}` member names).
    #[must_use]
    pub fn key_resolution(mut self, enabled: bool) -> Self {
        self.key_resolution = enabled;
        self
    }

    /// Enables or disables change support for the whole aggregate.
    #[must_use]
    pub fn changes(mut self, enabled: bool) -> Self {
        self.changes_enabled = enabled;
        self
    }

    /// Overrides every source's polling interval. Mainly useful in tests
    /// and short-lived tools.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Loads every source, merges the initial snapshot, and starts the
    /// engine.
    ///
    /// Eager sources load their full tree; lazy sources are then queried
    /// once per fully qualified key found across the eager trees, so a
    /// lazy source only contributes to keys some eager source already
    /// mentioned. Equal-priority sources are put into a fixed total order
    /// by name here, before any merge happens.
    ///
    /// # Errors
    ///
    /// Fails on the first mandatory source without data, on any source
    /// without a loading capability, and on merge conflicts or unresolved
    /// key tokens in the initial tree.
    pub fn build(self) -> Result<Aggregate> {
        let mut parsers = self.parsers;
        if self.use_default_parsers {
            parsers.register(PropertiesParser);
            parsers.register(YamlParser);
            parsers.register(JsonParser);
        }
        let parsers = Arc::new(parsers);

        let mut runtimes = Vec::with_capacity(self.registrations.len());
        for registration in self.registrations {
            runtimes.push(Arc::new(SourceRuntime::new(
                registration.source,
                Arc::clone(&parsers),
                registration.priority,
            )?));
        }

        // Initial, one-time load. Mandatory failures abort construction.
        for runtime in &runtimes {
            runtime.load()?;
        }

        // Priorities are final after the load (a source may have declared
        // its own); equal priorities get a fixed total order by name.
        runtimes.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        let mut contributions: Vec<Option<Node>> =
            runtimes.iter().map(|rt| rt.cached_tree()).collect();

        Self::load_lazy_contributions(&runtimes, &mut contributions)?;

        let (change_tx, change_rx) = mpsc::channel();
        let (notify_tx, notify_rx) = mpsc::channel();

        let shared = Arc::new(Shared {
            runtimes,
            contributions: Mutex::new(contributions),
            current: ArcSwap::from_pointee(Snapshot::new(Node::object())),
            listeners: Arc::new(Mutex::new(Vec::new())),
            key_resolution: self.key_resolution,
            changes_enabled: self.changes_enabled,
            poll_interval_override: self.poll_interval,
            change_tx,
            notify_tx,
            mechanisms: Mutex::new(Mechanisms::default()),
        });

        // Initial merge and token resolution; failures here are fatal,
        // unlike during later recomputes.
        {
            let contributions = sync::lock(&shared.contributions);
            let root = shared.resolve_merged(&contributions)?;
            shared.current.store(Arc::new(Snapshot::new(root)));
        }

        Ok(Aggregate::start(shared, change_rx, notify_rx))
    }

    /// Queries every lazy runtime once per key present across the eager
    /// trees and folds the answers into per-source contributions.
    fn load_lazy_contributions(
        runtimes: &[Arc<SourceRuntime>],
        contributions: &mut [Option<Node>],
    ) -> Result<()> {
        let mut keys: BTreeSet<Key> = BTreeSet::new();
        for tree in contributions.iter().flatten() {
            for key in flatten::full_key_map(tree).keys() {
                if !key.is_root() {
                    keys.insert(key.clone());
                }
            }
        }
        if keys.is_empty() {
            return Ok(());
        }

        for (index, runtime) in runtimes.iter().enumerate() {
            if !runtime.is_lazy() {
                continue;
            }
            let mut tree: Option<Node> = None;
            for key in &keys {
                if let Some(found) = runtime.node(key)? {
                    let wrapped = node::wrap_under(key, found);
                    tree = Some(match tree {
                        None => wrapped,
                        Some(accumulated) => merge::merge(&wrapped, &accumulated)?,
                    });
                }
            }
            contributions[index] = tree;
        }
        Ok(())
    }
}
