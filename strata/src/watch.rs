//! Push-based file change watching.
//!
//! A [`FileWatcher`] wraps a `notify` watcher on the parent directory of
//! one target file and maps raw filesystem events onto discrete
//! created/modified/deleted change events for that target. Watching the
//! directory rather than the file itself keeps the watch alive across
//! editors that replace the file on save.

use std::ffi::OsString;
use std::path::Path;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;
use crate::source::ChangeEventKind;

/// A cancellable watch on one file.
pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    /// Starts watching `target` and delivers change events to `on_event`
    /// from the watcher's own thread.
    ///
    /// # Errors
    ///
    /// Returns an error when the watch cannot be established, e.g. when
    /// the parent directory does not exist.
    pub fn start<F>(target: &Path, on_event: F) -> Result<Self>
    where
        F: Fn(ChangeEventKind) + Send + 'static,
    {
        let directory = match target.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
            Some(parent) => parent,
            None => Path::new("."),
        }
        .to_path_buf();
        let file_name: Option<OsString> = target.file_name().map(OsString::from);

        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("file watch error: {e}");
                    return;
                }
            };
            let concerns_target = event.paths.is_empty()
                || event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(OsString::from) == file_name);
            if !concerns_target {
                return;
            }
            let kind = match event.kind {
                EventKind::Create(_) => ChangeEventKind::Created,
                EventKind::Remove(_) => ChangeEventKind::Deleted,
                EventKind::Modify(_) => ChangeEventKind::Modified,
                _ => return,
            };
            on_event(kind);
        })?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        Ok(Self {
            watcher: Some(watcher),
        })
    }

    /// Stops watching. Idempotent; dropping the watcher tears down the
    /// underlying notification thread.
    pub fn stop(&mut self) {
        self.watcher.take();
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
