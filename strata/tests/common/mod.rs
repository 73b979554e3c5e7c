//! Shared test utilities for the integration suites.
#![allow(dead_code)] // each integration binary uses its own subset

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use strata::source::{NodeContent, NodeSource, PollableSource};
use strata::{Aggregate, Node, Snapshot, Source, Stamp};

/// A tree-producing source that counts its loads, for change-isolation
/// assertions.
pub struct CountingSource {
    name: String,
    pairs: Mutex<Vec<(String, String)>>,
    loads: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(name: &str, pairs: &[(&str, &str)]) -> (Self, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let source = Self {
            name: name.to_string(),
            pairs: Mutex::new(
                pairs
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            loads: Arc::clone(&loads),
        };
        (source, loads)
    }
}

impl Source for CountingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_node_source(&self) -> Option<&dyn NodeSource> {
        Some(self)
    }
}

impl NodeSource for CountingSource {
    fn load_node(&self) -> strata::Result<Option<NodeContent>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let pairs = self.pairs.lock().unwrap().clone();
        Ok(Some(NodeContent {
            node: Node::from_pairs(pairs)?,
            stamp: None,
        }))
    }
}

/// A pollable source whose stamp always reports modified while its content
/// never changes, for no-op publication tests.
pub struct NoisySource {
    name: String,
    pairs: Vec<(String, String)>,
    modified: Arc<AtomicBool>,
}

impl NoisySource {
    pub fn new(name: &str, pairs: &[(&str, &str)]) -> (Self, Arc<AtomicBool>) {
        let modified = Arc::new(AtomicBool::new(false));
        let source = Self {
            name: name.to_string(),
            pairs: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            modified: Arc::clone(&modified),
        };
        (source, modified)
    }
}

impl Source for NoisySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_node_source(&self) -> Option<&dyn NodeSource> {
        Some(self)
    }

    fn as_pollable(&self) -> Option<&dyn PollableSource> {
        Some(self)
    }
}

impl NodeSource for NoisySource {
    fn load_node(&self) -> strata::Result<Option<NodeContent>> {
        Ok(Some(NodeContent {
            node: Node::from_pairs(self.pairs.clone())?,
            stamp: Some(Stamp::new(b"fixed".to_vec())),
        }))
    }
}

impl PollableSource for NoisySource {
    fn is_modified(&self, _stamp: &Stamp) -> bool {
        self.modified.load(Ordering::SeqCst)
    }
}

/// Registers a channel-backed listener and returns the receiving end.
pub fn subscribe(aggregate: &Aggregate) -> Receiver<Arc<Snapshot>> {
    let (tx, rx): (Sender<Arc<Snapshot>>, Receiver<Arc<Snapshot>>) = mpsc::channel();
    aggregate.on_change(move |snapshot| {
        let _ = tx.send(Arc::clone(snapshot));
    });
    rx
}

/// Waits until a received snapshot satisfies the predicate, draining
/// intermediate publications.
pub fn wait_for_snapshot(
    rx: &Receiver<Arc<Snapshot>>,
    predicate: impl Fn(&Snapshot) -> bool,
) -> Arc<Snapshot> {
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline
            .checked_duration_since(std::time::Instant::now())
            .expect("timed out waiting for a matching snapshot");
        let snapshot = rx
            .recv_timeout(remaining)
            .expect("timed out waiting for a snapshot");
        if predicate(&snapshot) {
            return snapshot;
        }
    }
}
