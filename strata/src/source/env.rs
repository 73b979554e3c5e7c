//! Environment-variable configuration source.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::key::Key;
use crate::node::Node;
use crate::source::{LazySource, Source};

/// A lazy source answering key lookups from environment variables.
///
/// Because the environment cannot meaningfully enumerate a configuration
/// key space, this source only answers point lookups. For a key such as
/// `server.port` it tries, in order:
///
/// 1. the exact name (`server.port`),
/// 2. the name with every non-alphanumeric character replaced by `_`
///    (`server_port`),
/// 3. the replaced name uppercased (`SERVER_PORT`).
///
/// The variables are snapshotted at construction, so the source is
/// immutable afterwards.
pub struct EnvSource {
    name: String,
    vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// Snapshots the current process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::from_vars("environment-variables", std::env::vars())
    }

    /// Creates a source over an explicit variable map, mainly for tests
    /// and embedders with their own environment handling.
    #[must_use]
    pub fn from_vars(
        name: impl Into<String>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            vars: vars.into_iter().collect(),
        }
    }

    fn mangle(key: &str) -> String {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for EnvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn optional(&self) -> bool {
        true
    }

    fn as_lazy(&self) -> Option<&dyn LazySource> {
        Some(self)
    }
}

impl LazySource for EnvSource {
    fn node(&self, key: &Key) -> Result<Option<Node>> {
        let exact = key.to_string();
        let mangled = Self::mangle(&exact);
        let upper = mangled.to_uppercase();

        let value = self
            .vars
            .get(&exact)
            .or_else(|| self.vars.get(&mangled))
            .or_else(|| self.vars.get(&upper));

        Ok(value.map(Node::value))
    }
}
