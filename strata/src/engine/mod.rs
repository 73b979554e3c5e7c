//! The aggregation engine.
//!
//! An [`Aggregate`] owns the full set of source runtimes, keeps the
//! last-known tree per source, and publishes one immutable merged
//! [`Snapshot`] at a time. Reads are lock-free; readers hold an `Arc` to a
//! snapshot that is never mutated after publication.
//!
//! Change notifications from all sources funnel through one channel into a
//! single recompute thread, so concurrent changes from different sources
//! never interleave their re-merges. A change replaces only the reporting
//! source's cached contribution; every other source's last-known tree is
//! reused untouched, which keeps recompute cost proportional to the number
//! of sources. Listeners are dispatched from a separate notifier thread in
//! publication order, so a slow listener never blocks publishing.

pub mod builder;

use std::fmt;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::key::Key;
use crate::node::{self, merge, Node};
use crate::poll::Poller;
use crate::reserved;
use crate::runtime::SourceRuntime;
use crate::source::ChangeEventKind;
use crate::sync;
use crate::tokens;
use crate::watch::FileWatcher;

pub use builder::AggregateBuilder;

/// One immutable, fully merged configuration tree.
///
/// Snapshots are shared between the engine and any number of readers and
/// are replaced wholesale on every republication.
#[derive(Debug)]
pub struct Snapshot {
    root: Node,
    timestamp: DateTime<Utc>,
}

impl Snapshot {
    fn new(root: Node) -> Self {
        Self {
            root,
            timestamp: Utc::now(),
        }
    }

    /// The merged root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The node at the given key, if present.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Node> {
        self.root.lookup(key)
    }

    /// Convenience lookup of the direct string value at a dotted key.
    /// Returns `None` for absent keys and unparseable key text alike.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        let key = Key::parse(key).ok()?;
        self.root
            .lookup(&key)
            .and_then(|n| n.direct_value().map(str::to_string))
    }

    /// When this snapshot was published.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Name and resolved priority of one registered source, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// The source's name.
    pub name: String,
    /// The source's effective priority.
    pub priority: i32,
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.priority)
    }
}

/// Listener invoked with every published snapshot, in publication order.
pub type ChangeListener = Box<dyn Fn(&Arc<Snapshot>) + Send>;

enum EngineMessage {
    Change {
        index: usize,
        kind: ChangeEventKind,
        key: Key,
        node: Option<Node>,
    },
    Shutdown,
}

#[derive(Default)]
struct Mechanisms {
    armed: bool,
    pollers: Vec<Poller>,
    watchers: Vec<FileWatcher>,
}

pub(crate) struct Shared {
    pub(crate) runtimes: Vec<Arc<SourceRuntime>>,
    /// Last-known tree per runtime, in merge order. Its mutex is also the
    /// engine's global recompute-and-publish serialization point.
    pub(crate) contributions: Mutex<Vec<Option<Node>>>,
    pub(crate) current: ArcSwap<Snapshot>,
    listeners: Arc<Mutex<Vec<ChangeListener>>>,
    pub(crate) key_resolution: bool,
    changes_enabled: bool,
    poll_interval_override: Option<Duration>,
    change_tx: Sender<EngineMessage>,
    notify_tx: Sender<Option<Arc<Snapshot>>>,
    mechanisms: Mutex<Mechanisms>,
}

impl Shared {
    /// Folds the given contributions in merge order and runs token
    /// resolution on the result.
    pub(crate) fn resolve_merged(&self, contributions: &[Option<Node>]) -> Result<Node> {
        let merged = merge::merge_all(contributions.iter().flatten())?;
        if self.key_resolution {
            tokens::resolve(&merged)
        } else {
            Ok(merged)
        }
    }

    /// Publishes `root` unless it equals the current snapshot. Forced
    /// publication skips the structural diff. Must be called with the
    /// contributions lock held so publications stay ordered.
    fn publish(&self, root: Node, force: bool) -> Option<Arc<Snapshot>> {
        if !force && self.current.load().root == root {
            log::debug!("merged tree is unchanged, publication suppressed");
            return None;
        }
        let snapshot = Arc::new(Snapshot::new(root));
        self.current.store(Arc::clone(&snapshot));
        let _ = self.notify_tx.send(Some(Arc::clone(&snapshot)));
        Some(snapshot)
    }

    /// Recomputes one source's contribution after a change and republishes
    /// when the merged tree moved. Merge or token failures keep the
    /// previous snapshot; a running aggregate never crashes on one
    /// source's bad data.
    fn apply_change(&self, index: usize, kind: ChangeEventKind, key: &Key, node: Option<Node>) {
        let name = self.runtimes[index].name();
        log::debug!("source '{name}' reported a {kind} change at '{key}'");

        let mut contributions = sync::lock(&self.contributions);
        match updated_contribution(contributions[index].as_ref(), key, node) {
            Ok(updated) => contributions[index] = updated,
            Err(e) => {
                log::warn!("cannot apply change from source '{name}': {e}; keeping previous data");
                return;
            }
        }
        match self.resolve_merged(&contributions) {
            Ok(root) => {
                self.publish(root, false);
            }
            Err(e) => {
                log::warn!(
                    "recompute after change from source '{name}' failed: {e}; keeping previous snapshot"
                );
            }
        }
    }
}

/// Wraps a changed node under its reporting key and merges it over the
/// source's previous contribution. A root-level change replaces the
/// contribution wholesale.
fn updated_contribution(old: Option<&Node>, key: &Key, node: Option<Node>) -> Result<Option<Node>> {
    if key.is_root() {
        return Ok(node);
    }
    let wrapped = node::wrap_under(key, node.unwrap_or_else(Node::object));
    match old {
        None => Ok(Some(wrapped)),
        Some(old) => Ok(Some(merge::merge(&wrapped, old)?)),
    }
}

fn run_consumer(shared: &Arc<Shared>, rx: &Receiver<EngineMessage>) {
    while let Ok(message) = rx.recv() {
        match message {
            EngineMessage::Change {
                index,
                kind,
                key,
                node,
            } => shared.apply_change(index, kind, &key, node),
            EngineMessage::Shutdown => break,
        }
    }
}

fn run_notifier(listeners: &Arc<Mutex<Vec<ChangeListener>>>, rx: &Receiver<Option<Arc<Snapshot>>>) {
    while let Ok(Some(snapshot)) = rx.recv() {
        for listener in sync::lock(listeners).iter() {
            listener(&snapshot);
        }
    }
}

/// The aggregate of all registered configuration sources.
///
/// Built by [`AggregateBuilder`]; dropping it (or calling
/// [`Aggregate::shutdown`]) stops all change-detection mechanisms and the
/// engine's background threads.
///
/// # Examples
///
/// ```
/// use strata::{AggregateBuilder, MapSource};
///
/// let defaults = MapSource::with_entries("defaults", [("server.port", "8080")]);
/// let aggregate = AggregateBuilder::new().source(defaults).build().unwrap();
/// assert_eq!(aggregate.snapshot().value("server.port").as_deref(), Some("8080"));
/// ```
pub struct Aggregate {
    shared: Arc<Shared>,
    consumer: Option<JoinHandle<()>>,
    notifier: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate").finish_non_exhaustive()
    }
}

impl Aggregate {
    pub(crate) fn start(shared: Arc<Shared>, change_rx: Receiver<EngineMessage>, notify_rx: Receiver<Option<Arc<Snapshot>>>) -> Self {
        let consumer_shared = Arc::clone(&shared);
        let consumer = std::thread::spawn(move || run_consumer(&consumer_shared, &change_rx));
        let notifier_listeners = Arc::clone(&shared.listeners);
        let notifier = std::thread::spawn(move || run_notifier(&notifier_listeners, &notify_rx));
        Self {
            shared,
            consumer: Some(consumer),
            notifier: Some(notifier),
        }
    }

    /// The current snapshot. Lock-free; the returned snapshot stays valid
    /// (and unchanged) for as long as the caller holds it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current.load_full()
    }

    /// The registered sources with their resolved priorities, in merge
    /// order (highest priority first; equal priorities ordered by name).
    #[must_use]
    pub fn sources(&self) -> Vec<SourceInfo> {
        self.shared
            .runtimes
            .iter()
            .map(|rt| SourceInfo {
                name: rt.name().to_string(),
                priority: rt.priority(),
            })
            .collect()
    }

    /// Registers a listener for published snapshots.
    ///
    /// The first registration arms change detection on every capable
    /// source; no polling or watching runs before someone asks for
    /// changes. Listeners observe snapshots in publication order and run
    /// on a dedicated notifier thread.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&Arc<Snapshot>) + Send + 'static,
    {
        sync::lock(&self.shared.listeners).push(Box::new(listener));
        self.arm_changes();
    }

    /// Synchronously reloads every eager source and republishes, even when
    /// nothing changed. Sources whose reload fails keep their previous
    /// tree (the failure is logged).
    ///
    /// # Errors
    ///
    /// Returns an error when the re-merge or token resolution of the
    /// reloaded trees fails.
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let mut contributions = sync::lock(&self.shared.contributions);
        for (index, rt) in self.shared.runtimes.iter().enumerate() {
            if rt.is_lazy() {
                continue;
            }
            match rt.reload() {
                Ok(tree) => contributions[index] = tree,
                Err(e) => log::warn!(
                    "forced reload of source '{}' failed: {e}; keeping previous data",
                    rt.name()
                ),
            }
        }
        let root = self.shared.resolve_merged(&contributions)?;
        match self.shared.publish(root, true) {
            Some(snapshot) => Ok(snapshot),
            None => Ok(self.shared.current.load_full()),
        }
    }

    /// Stops change detection and the engine threads. Idempotent;
    /// in-flight reloads complete before their mechanism stops.
    pub fn shutdown(&mut self) {
        {
            let mut mechanisms = sync::lock(&self.shared.mechanisms);
            for poller in &mut mechanisms.pollers {
                poller.stop();
            }
            for watcher in &mut mechanisms.watchers {
                watcher.stop();
            }
            mechanisms.pollers.clear();
            mechanisms.watchers.clear();
        }
        let _ = self.shared.change_tx.send(EngineMessage::Shutdown);
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
        let _ = self.shared.notify_tx.send(None);
        if let Some(handle) = self.notifier.take() {
            let _ = handle.join();
        }
    }

    /// Starts each capable runtime's change-detection mechanism, once.
    /// Watching is preferred over polling; polling falls back when the
    /// watch cannot be established; self-reporting sources are handed a
    /// callback.
    fn arm_changes(&self) {
        let shared = &self.shared;
        let mut mechanisms = sync::lock(&shared.mechanisms);
        if mechanisms.armed {
            return;
        }
        mechanisms.armed = true;

        if !shared.changes_enabled {
            log::debug!("change support disabled for this aggregate");
            return;
        }
        if shared.current.load().value(reserved::CHANGES_ENABLED).as_deref() == Some("false") {
            log::debug!("change support disabled by the merged configuration");
            return;
        }

        for (index, rt) in shared.runtimes.iter().enumerate() {
            if !rt.changes_enabled() {
                log::debug!("change support disabled for source '{}'", rt.name());
                continue;
            }

            // Lazy sources cannot re-enumerate a tree; only self-reporting
            // works for them.
            if !rt.is_lazy() {
                let watch_target = rt.source().as_watchable().map(|w| w.watch_target());
                if let Some(target) = watch_target {
                    if rt.watch_enabled() {
                        let runtime = Arc::clone(rt);
                        let tx = shared.change_tx.clone();
                        let started = FileWatcher::start(&target, move |kind| {
                            if let Some((kind, node)) = runtime.change_from_reload(kind) {
                                let _ = tx.send(EngineMessage::Change {
                                    index,
                                    kind,
                                    key: Key::root(),
                                    node,
                                });
                            }
                        });
                        match started {
                            Ok(watcher) => {
                                log::debug!(
                                    "watching '{}' for source '{}'",
                                    target.display(),
                                    rt.name()
                                );
                                mechanisms.watchers.push(watcher);
                                continue;
                            }
                            Err(e) => log::warn!(
                                "cannot watch '{}' for source '{}': {e}; falling back to polling",
                                target.display(),
                                rt.name()
                            ),
                        }
                    }
                }

                if rt.source().as_pollable().is_some() && rt.polling_enabled() {
                    let interval = shared
                        .poll_interval_override
                        .unwrap_or_else(|| rt.polling_interval());
                    log::debug!(
                        "polling source '{}' every {interval:?}",
                        rt.name()
                    );
                    let runtime = Arc::clone(rt);
                    let tx = shared.change_tx.clone();
                    mechanisms.pollers.push(Poller::start(interval, move || {
                        if let Some((kind, node)) = runtime.poll_cycle() {
                            let _ = tx.send(EngineMessage::Change {
                                index,
                                kind,
                                key: Key::root(),
                                node,
                            });
                        }
                    }));
                    continue;
                }
            }

            if let Some(event) = rt.source().as_event() {
                log::debug!("source '{}' reports its own changes", rt.name());
                let runtime = Arc::clone(rt);
                let tx = shared.change_tx.clone();
                event.subscribe(Box::new(move |key, node| {
                    let kind = if node.is_some() {
                        ChangeEventKind::Modified
                    } else {
                        ChangeEventKind::Deleted
                    };
                    let tagged = node.map(|n| {
                        n.with_origin(&crate::node::Origin::new(
                            runtime.name(),
                            runtime.priority(),
                        ))
                    });
                    let _ = tx.send(EngineMessage::Change {
                        index,
                        kind,
                        key: key.clone(),
                        node: tagged,
                    });
                }));
            }
        }
    }
}

impl Drop for Aggregate {
    fn drop(&mut self) {
        self.shutdown();
    }
}
