#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # strata
//!
//! A library for aggregating configuration data from multiple,
//! independently changing sources into one priority-ordered, merged tree.
//!
//! Sources (files, environment variables, in-memory maps, or custom
//! implementations of the [`Source`] contract) each contribute a tree of
//! [`Node`]s. The aggregate merges them highest priority first, resolves
//! `${token}` references in member names, and publishes the result as an
//! immutable [`Snapshot`]. When a source changes (detected by polling,
//! filesystem watching, or the source's own push), only that source is
//! reloaded, the trees are re-merged, and a new snapshot is published to
//! registered listeners.
//!
//! ## Core Types
//!
//! - [`Key`]: dotted, escapable path addressing one node
//! - [`Node`] and [`Origin`]: the tagged-union tree model with provenance
//! - [`Source`]: the capability contract external providers implement
//! - [`AggregateBuilder`] and [`Aggregate`]: assembly and the running engine
//! - [`Snapshot`]: one immutable merged tree
//! - [`Error`] and [`Result`]: error handling types
//!
//! ## Examples
//!
//! ```
//! use strata::{AggregateBuilder, MapSource};
//!
//! let defaults = MapSource::with_entries("defaults", [("server.port", "8080")]);
//! let overrides = MapSource::with_entries("overrides", [("server.port", "9090")]);
//!
//! let aggregate = AggregateBuilder::new()
//!     .source_with_priority(defaults, 10)
//!     .source_with_priority(overrides, 20)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(aggregate.snapshot().value("server.port").as_deref(), Some("9090"));
//! ```

pub mod engine;
pub mod error;
pub mod key;
pub mod node;
pub mod parser;
pub mod poll;
pub mod reserved;
pub mod runtime;
pub mod source;
mod sync;
pub mod tokens;
pub mod watch;

// Re-export key types at crate root for convenience
pub use engine::{Aggregate, AggregateBuilder, Snapshot, SourceInfo};
pub use error::{Error, Result};
pub use key::Key;
pub use node::{Node, Origin};
pub use runtime::SourceRuntime;
pub use source::{
    ChangeEventKind, EnvSource, FileSource, MapSource, Source, Stamp,
};
