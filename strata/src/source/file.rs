//! File-backed configuration source.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::parser;
use crate::source::{ParsableContent, ParsableSource, PollableSource, Source, Stamp, WatchableSource};

/// A parsable source reading one configuration file.
///
/// The media type is probed from the file extension unless set explicitly.
/// The change stamp is a digest of the file content, so a rewrite that
/// produces identical bytes does not count as a modification. A missing
/// file loads as no data; whether that is tolerated depends on the
/// source's optional flag.
///
/// # Examples
///
/// ```no_run
/// use strata::source::FileSource;
///
/// let source = FileSource::new("config/application.yaml").optional(true);
/// ```
pub struct FileSource {
    name: String,
    path: PathBuf,
    media_type: Option<String>,
    optional: bool,
}

impl FileSource {
    /// Creates a mandatory source for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
            media_type: None,
            optional: false,
        }
    }

    /// Sets whether a missing file is tolerated.
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Overrides the probed media type.
    #[must_use]
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// The path this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn optional(&self) -> bool {
        self.optional
    }

    fn as_parsable(&self) -> Option<&dyn ParsableSource> {
        Some(self)
    }

    fn as_pollable(&self) -> Option<&dyn PollableSource> {
        Some(self)
    }

    fn as_watchable(&self) -> Option<&dyn WatchableSource> {
        Some(self)
    }
}

impl ParsableSource for FileSource {
    fn content(&self) -> Result<Option<ParsableContent>> {
        let Some(data) = self.read()? else {
            return Ok(None);
        };
        let media_type = self
            .media_type
            .clone()
            .or_else(|| parser::media_type_for_path(&self.path).map(str::to_string));
        Ok(Some(ParsableContent {
            stamp: Some(Stamp::of_bytes(&data)),
            media_type,
            data,
        }))
    }
}

impl PollableSource for FileSource {
    fn is_modified(&self, stamp: &Stamp) -> bool {
        match self.read() {
            // A vanished file is reported by the watcher; for polling it
            // compares as unmodified.
            Ok(None) => false,
            Ok(Some(data)) => Stamp::of_bytes(&data) != *stamp,
            Err(e) => {
                log::warn!(
                    "cannot compare change stamp for '{}': {e}; treating as unmodified",
                    self.name
                );
                false
            }
        }
    }
}

impl WatchableSource for FileSource {
    fn watch_target(&self) -> PathBuf {
        self.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MEDIA_TYPE_YAML;

    fn temp_file(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_content_with_probed_media_type() {
        let (_dir, path) = temp_file("app.yaml", "a: 1\n");
        let source = FileSource::new(&path);
        let content = source.content().unwrap().unwrap();
        assert_eq!(content.media_type.as_deref(), Some(MEDIA_TYPE_YAML));
        assert_eq!(content.data, b"a: 1\n");
        assert!(content.stamp.is_some());
    }

    #[test]
    fn test_media_type_override() {
        let (_dir, path) = temp_file("app.conf", "a=1\n");
        let source = FileSource::new(&path).media_type("text/x-java-properties");
        let content = source.content().unwrap().unwrap();
        assert_eq!(content.media_type.as_deref(), Some("text/x-java-properties"));
    }

    #[test]
    fn test_missing_file_is_no_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = FileSource::new(dir.path().join("absent.yaml"));
        assert!(source.content().unwrap().is_none());
    }

    #[test]
    fn test_is_modified_tracks_content() {
        let (_dir, path) = temp_file("app.yaml", "a: 1\n");
        let source = FileSource::new(&path);
        let stamp = source.content().unwrap().unwrap().stamp.unwrap();

        assert!(!source.is_modified(&stamp));
        std::fs::write(&path, "a: 2\n").unwrap();
        assert!(source.is_modified(&stamp));
        // Rewriting identical bytes is not a modification.
        std::fs::write(&path, "a: 1\n").unwrap();
        assert!(!source.is_modified(&stamp));
    }

    #[test]
    fn test_deleted_file_compares_unmodified() {
        let (_dir, path) = temp_file("app.yaml", "a: 1\n");
        let source = FileSource::new(&path);
        let stamp = source.content().unwrap().unwrap().stamp.unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!source.is_modified(&stamp));
    }

    #[test]
    fn test_capabilities() {
        let source = FileSource::new("x.yaml");
        assert!(source.as_parsable().is_some());
        assert!(source.as_pollable().is_some());
        assert!(source.as_watchable().is_some());
        assert!(source.as_node_source().is_none());
        assert!(source.as_lazy().is_none());
    }
}
