//! Reserved configuration keys interpreted by the engine itself.
//!
//! These keys are read from a source's own data (priority, polling) or
//! from the merged tree (global change support); they are ordinary
//! configuration entries everywhere else.

/// Priority of the source that carries this key. Read before the merge so
/// a source can affect its own ordering; it has no meaning afterwards.
pub const SOURCE_PRIORITY: &str = "strata.source.priority";

/// Whether polling-based change detection is enabled for the source that
/// carries this key. Defaults to `true`.
pub const POLLING_ENABLED: &str = "strata.polling.enabled";

/// Polling interval in seconds for the source that carries this key.
/// Defaults to 10 seconds.
pub const POLLING_INTERVAL: &str = "strata.polling.interval";

/// Whether change detection as a whole is enabled. Read per source from
/// the source's own data and globally from the merged tree. Defaults to
/// `true`.
pub const CHANGES_ENABLED: &str = "strata.changes.enabled";

/// Whether a watchable source should prefer its watcher over polling.
/// Defaults to `true`; set to `false` to force polling.
pub const WATCH_ENABLED: &str = "strata.watch.enabled";
