//! In-memory map configuration source.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::Result;
use crate::key::Key;
use crate::node::Node;
use crate::source::{EventListener, EventSource, NodeContent, NodeSource, Source, Stamp};
use crate::sync;

/// A tree-producing source over an in-memory key/value map.
///
/// The handle is cheaply cloneable; one clone is registered with the
/// aggregate while the embedder keeps another to mutate the map. Every
/// mutation notifies the aggregate through the self-reporting change
/// capability, pushing the rebuilt tree without any polling.
///
/// # Examples
///
/// ```
/// use strata::source::MapSource;
///
/// let source = MapSource::new("defaults");
/// source.set("server.port", "8080");
/// let handle = source.clone(); // register this one with the aggregate
/// # drop(handle);
/// ```
#[derive(Clone)]
pub struct MapSource {
    inner: Arc<MapInner>,
}

struct MapInner {
    name: String,
    entries: RwLock<BTreeMap<String, String>>,
    listeners: Mutex<Vec<EventListener>>,
}

impl MapSource {
    /// Creates an empty map source. An empty map loads as an empty object
    /// tree, so the source satisfies a mandatory registration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_entries(name, std::iter::empty::<(String, String)>())
    }

    /// Creates a map source pre-populated from dotted-key/value pairs.
    #[must_use]
    pub fn with_entries<K, V>(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            inner: Arc::new(MapInner {
                name: name.into(),
                entries: RwLock::new(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.into(), v.into()))
                        .collect(),
                ),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Sets one entry and notifies change listeners.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        sync::write(&self.inner.entries).insert(key.into(), value.into());
        self.notify();
    }

    /// Removes one entry and notifies change listeners.
    pub fn remove(&self, key: &str) {
        sync::write(&self.inner.entries).remove(key);
        self.notify();
    }

    fn entries(&self) -> BTreeMap<String, String> {
        sync::read(&self.inner.entries).clone()
    }

    fn notify(&self) {
        let node = match Node::from_pairs(self.entries()) {
            Ok(node) => Some(node),
            Err(e) => {
                log::warn!(
                    "map source '{}' holds unmergeable entries: {e}",
                    self.inner.name
                );
                None
            }
        };
        for listener in sync::lock(&self.inner.listeners).iter() {
            listener(&Key::root(), node.clone());
        }
    }
}

impl Source for MapSource {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn as_node_source(&self) -> Option<&dyn NodeSource> {
        Some(self)
    }

    fn as_event(&self) -> Option<&dyn EventSource> {
        Some(self)
    }
}

impl NodeSource for MapSource {
    fn load_node(&self) -> Result<Option<NodeContent>> {
        let entries = self.entries();
        let mut serialized = Vec::new();
        for (k, v) in &entries {
            serialized.extend_from_slice(k.as_bytes());
            serialized.push(b'=');
            serialized.extend_from_slice(v.as_bytes());
            serialized.push(b'\n');
        }
        Ok(Some(NodeContent {
            node: Node::from_pairs(entries)?,
            stamp: Some(Stamp::of_bytes(&serialized)),
        }))
    }
}

impl EventSource for MapSource {
    fn subscribe(&self, listener: EventListener) {
        sync::lock(&self.inner.listeners).push(listener);
    }
}
