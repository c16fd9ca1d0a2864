//! Daemon configuration
//!
//! The config is an operator-edited JSON document listing the directories to
//! monitor and the store each one feeds:
//!
//! ```json
//! { "target_directories": [ { "path": "/home/me/notes", "vector_store": "vec_files" } ] }
//! ```
//!
//! [`ConfigWatcher`] owns the load/staleness cycle: a config is current only
//! while the source file's mtime does not exceed the mtime recorded at the
//! last successful load.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{RecallError, Result};

/// One directory to monitor, with the identifier of the vector store its
/// changes should feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDirectory {
    pub path: PathBuf,
    pub vector_store: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub target_directories: Vec<TargetDirectory>,
}

impl Config {
    fn parse(raw: &str) -> Result<Self> {
        // serde reports the offending field and position in its message.
        serde_json::from_str(raw).map_err(|e| RecallError::ConfigParse(e.to_string()))
    }
}

/// Loads the config file and tracks its modification time.
///
/// Reload is all-or-nothing: a failed read or parse leaves the previously
/// loaded config (if any) untouched and in effect.
pub struct ConfigWatcher {
    path: PathBuf,
    loaded: Option<(Config, SystemTime)>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The currently loaded config, if any.
    pub fn current(&self) -> Option<&Config> {
        self.loaded.as_ref().map(|(config, _)| config)
    }

    /// Read and parse the source, recording its mtime at the instant of
    /// successful load.
    pub fn reload(&mut self) -> Result<&Config> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| RecallError::ConfigRead(format!("{}: {}", self.path.display(), e)))?;
        let config = Config::parse(&raw)?;

        let mtime = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| RecallError::ConfigRead(format!("{}: {}", self.path.display(), e)))?;

        tracing::info!(
            "[Config] Loaded {} ({} target directories)",
            self.path.display(),
            config.target_directories.len()
        );

        let (config, _) = self.loaded.insert((config, mtime));
        Ok(config)
    }

    /// Whether the source has changed since the last successful load.
    ///
    /// Always true before the first load. A source that has disappeared
    /// after a load is a fatal condition, not mere staleness.
    pub fn is_stale(&self) -> Result<bool> {
        let Some((_, recorded)) = &self.loaded else {
            return Ok(true);
        };

        let mtime = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.modified().map_err(|e| {
                RecallError::ConfigRead(format!("{}: {}", self.path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RecallError::ConfigMissing(self.path.clone()));
            }
            Err(e) => {
                return Err(RecallError::ConfigRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        Ok(mtime > *recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(path: &Path, body: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }

    /// Rewrite until the mtime actually advances; some filesystems have
    /// coarse timestamp granularity.
    fn touch_config(path: &Path, body: &str) {
        let before = std::fs::metadata(path).unwrap().modified().unwrap();
        loop {
            write_config(path, body);
            if std::fs::metadata(path).unwrap().modified().unwrap() > before {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }

    const VALID: &str =
        r#"{ "target_directories": [ { "path": "/tmp/docs", "vector_store": "vec_files" } ] }"#;

    #[test]
    fn parses_a_valid_config() {
        let config = Config::parse(VALID).unwrap();
        assert_eq!(config.target_directories.len(), 1);
        assert_eq!(config.target_directories[0].path, PathBuf::from("/tmp/docs"));
        assert_eq!(config.target_directories[0].vector_store, "vec_files");
    }

    #[test]
    fn missing_field_is_a_parse_error_naming_the_field() {
        let err = Config::parse(r#"{ "target_directories": [ { "path": "/tmp/docs" } ] }"#)
            .unwrap_err();
        match err {
            RecallError::ConfigParse(msg) => assert!(msg.contains("vector_store"), "{msg}"),
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let err = Config::parse(r#"{ "target_directories": 3 }"#).unwrap_err();
        assert!(matches!(err, RecallError::ConfigParse(_)));
    }

    #[test]
    fn unloaded_watcher_is_always_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, VALID);

        let watcher = ConfigWatcher::new(&path);
        assert!(watcher.is_stale().unwrap());
    }

    #[test]
    fn fresh_load_is_not_stale_until_the_source_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, VALID);

        let mut watcher = ConfigWatcher::new(&path);
        watcher.reload().unwrap();
        assert!(!watcher.is_stale().unwrap());

        touch_config(&path, VALID);
        assert!(watcher.is_stale().unwrap());
    }

    #[test]
    fn failed_reload_keeps_the_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, VALID);

        let mut watcher = ConfigWatcher::new(&path);
        watcher.reload().unwrap();

        touch_config(&path, "{ not json");
        assert!(watcher.is_stale().unwrap());
        assert!(matches!(
            watcher.reload(),
            Err(RecallError::ConfigParse(_))
        ));

        let config = watcher.current().unwrap();
        assert_eq!(config.target_directories[0].vector_store, "vec_files");
    }

    #[test]
    fn missing_source_after_load_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, VALID);

        let mut watcher = ConfigWatcher::new(&path);
        watcher.reload().unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            watcher.is_stale(),
            Err(RecallError::ConfigMissing(_))
        ));
    }
}
