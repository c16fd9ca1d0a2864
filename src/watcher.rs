//! Directory watch management
//!
//! [`WatchManager`] owns the live set of recursive filesystem watches, one
//! per configured target directory. The set is never patched in place:
//! config changes tear the whole thing down and register everything anew,
//! so stale or duplicate registrations cannot survive a reload.
//!
//! Raw notify events flow through a single mpsc channel; the daemon loop is
//! the only consumer and calls [`WatchManager::route`] to turn each event
//! into per-root [`FileChange`]s.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::TargetDirectory;
use crate::error::Result;

/// A change observed inside one watched root, reported relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub root: PathBuf,
    pub relative: PathBuf,
    pub vector_store: String,
}

/// The live watcher plus the routing table for its registrations.
struct WatchSet {
    _watcher: RecommendedWatcher,
    routes: Vec<(PathBuf, String)>,
}

pub struct WatchManager {
    tx: Sender<notify::Result<Event>>,
    active: Option<WatchSet>,
    generation: u64,
}

impl WatchManager {
    /// Create a manager and the channel its watchers will deliver into.
    pub fn new() -> (Self, Receiver<notify::Result<Event>>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx,
                active: None,
                generation: 0,
            },
            rx,
        )
    }

    /// Tear down any existing watches and register one recursive watch per
    /// target directory.
    ///
    /// Registration is best-effort: a directory that cannot be watched is
    /// logged and skipped so the remaining targets still get coverage.
    /// Failure to construct the watcher itself is an error.
    pub fn rebuild(&mut self, targets: &[TargetDirectory]) -> Result<()> {
        self.teardown();

        let mut watcher = RecommendedWatcher::new(self.tx.clone(), notify::Config::default())?;

        let mut routes = Vec::new();
        for target in targets {
            match watcher.watch(&target.path, RecursiveMode::Recursive) {
                Ok(()) => routes.push((target.path.clone(), target.vector_store.clone())),
                Err(e) => {
                    tracing::warn!("[Watcher] Skipping {}: {}", target.path.display(), e);
                }
            }
        }

        self.generation += 1;
        tracing::info!(
            "[Watcher] Monitoring {} of {} directories (generation {})",
            routes.len(),
            targets.len(),
            self.generation
        );

        self.active = Some(WatchSet {
            _watcher: watcher,
            routes,
        });
        Ok(())
    }

    /// Drop the active watch set. Idempotent.
    pub fn teardown(&mut self) {
        if self.active.take().is_some() {
            tracing::debug!("[Watcher] Watches torn down");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Bumped once per successful rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Map a raw event to the changes it represents.
    ///
    /// Creation is handled identically to modification; directory-level
    /// events and every other kind are dropped. Paths that fall outside all
    /// registered roots are logged and dropped, never propagated.
    pub fn route(&self, event: &Event) -> Vec<FileChange> {
        let Some(set) = &self.active else {
            return Vec::new();
        };

        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return Vec::new();
        }

        let mut changes = Vec::new();
        for path in &event.paths {
            // Only file-level events are forwarded.
            if path.is_dir() {
                continue;
            }

            match route_path(&set.routes, path) {
                Some(change) => changes.push(change),
                None => {
                    tracing::warn!("[Watcher] Event outside watched roots: {}", path.display());
                }
            }
        }
        changes
    }
}

/// Match a path to its registered root. Longest prefix wins, so nested
/// roots resolve to the more specific registration.
fn route_path(routes: &[(PathBuf, String)], path: &Path) -> Option<FileChange> {
    routes
        .iter()
        .filter(|(root, _)| path.starts_with(root))
        .max_by_key(|(root, _)| root.components().count())
        .and_then(|(root, vector_store)| {
            let relative = path.strip_prefix(root).ok()?.to_path_buf();
            Some(FileChange {
                root: root.clone(),
                relative,
                vector_store: vector_store.clone(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn target(path: &Path, store: &str) -> TargetDirectory {
        TargetDirectory {
            path: path.to_path_buf(),
            vector_store: store.to_string(),
        }
    }

    fn event(kind: EventKind, path: &Path) -> Event {
        let mut event = Event::new(kind);
        event.paths.push(path.to_path_buf());
        event
    }

    #[test]
    fn routes_create_and_modify_to_the_owning_root() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, _rx) = WatchManager::new();
        manager.rebuild(&[target(dir.path(), "vec_files")]).unwrap();

        let file = dir.path().join("notes/today.md");
        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
        ] {
            let changes = manager.route(&event(kind, &file));
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].relative, PathBuf::from("notes/today.md"));
            assert_eq!(changes[0].vector_store, "vec_files");
        }
    }

    #[test]
    fn drops_directory_level_and_remove_events() {
        let dir = tempfile::tempdir().unwrap();
        let subdir = dir.path().join("sub");
        std::fs::create_dir(&subdir).unwrap();

        let (mut manager, _rx) = WatchManager::new();
        manager.rebuild(&[target(dir.path(), "vec_files")]).unwrap();

        // The subdirectory exists, so the event is directory-level.
        let changes = manager.route(&event(EventKind::Create(CreateKind::Folder), &subdir));
        assert!(changes.is_empty());

        let changes = manager.route(&event(
            EventKind::Remove(RemoveKind::File),
            &dir.path().join("gone.md"),
        ));
        assert!(changes.is_empty());
    }

    #[test]
    fn drops_paths_outside_every_root() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, _rx) = WatchManager::new();
        manager.rebuild(&[target(dir.path(), "vec_files")]).unwrap();

        let changes = manager.route(&event(
            EventKind::Create(CreateKind::File),
            Path::new("/somewhere/else.md"),
        ));
        assert!(changes.is_empty());
    }

    #[test]
    fn rebuild_replaces_the_routing_table_atomically() {
        let old_dir = tempfile::tempdir().unwrap();
        let new_dir = tempfile::tempdir().unwrap();

        let (mut manager, _rx) = WatchManager::new();
        manager.rebuild(&[target(old_dir.path(), "old_store")]).unwrap();
        assert_eq!(manager.generation(), 1);

        manager.rebuild(&[target(new_dir.path(), "new_store")]).unwrap();
        assert_eq!(manager.generation(), 2);

        // Events under the old root are no longer routed anywhere.
        let changes = manager.route(&event(
            EventKind::Create(CreateKind::File),
            &old_dir.path().join("stale.md"),
        ));
        assert!(changes.is_empty());

        let changes = manager.route(&event(
            EventKind::Create(CreateKind::File),
            &new_dir.path().join("fresh.md"),
        ));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].vector_store, "new_store");
    }

    #[test]
    fn unregisterable_directory_is_skipped_not_fatal() {
        let good = tempfile::tempdir().unwrap();
        let (mut manager, _rx) = WatchManager::new();

        manager
            .rebuild(&[
                target(Path::new("/nonexistent/recalld-test"), "broken"),
                target(good.path(), "vec_files"),
            ])
            .unwrap();

        let changes = manager.route(&event(
            EventKind::Create(CreateKind::File),
            &good.path().join("ok.md"),
        ));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn teardown_is_idempotent_and_stops_routing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, _rx) = WatchManager::new();
        manager.rebuild(&[target(dir.path(), "vec_files")]).unwrap();

        manager.teardown();
        manager.teardown();
        assert!(!manager.is_active());

        let changes = manager.route(&event(
            EventKind::Create(CreateKind::File),
            &dir.path().join("late.md"),
        ));
        assert!(changes.is_empty());
    }
}
