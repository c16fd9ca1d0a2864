//! Daemon controller
//!
//! Top-level supervision: load the config, build the watch set, then run a
//! single sequential loop that interleaves event dispatch with periodic
//! config polling. Rebuilds and event handling share that one thread, so a
//! watch set is never torn down while a handler is mid-flight.
//!
//! Shutdown is cooperative: a termination signal flips the shared flag, the
//! loop exits, the watcher is dropped (joining notify's backend), and any
//! already-queued events are drained before the controller reports
//! `Stopped`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::Event;

use crate::config::ConfigWatcher;
use crate::error::Result;
use crate::watcher::{FileChange, WatchManager};

const RECV_TICK: Duration = Duration::from_millis(200);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Ingestion boundary: called once per observed file change.
///
/// The external chunking/embedding pipeline implements this and writes into
/// a [`crate::storage::VectorStore`]; the daemon itself never computes
/// embeddings.
pub trait ChangeHandler: Send {
    fn on_file_changed(&mut self, change: &FileChange);
}

/// Pass-through handler: logs the change and nothing else.
pub struct LoggingHandler;

impl ChangeHandler for LoggingHandler {
    fn on_file_changed(&mut self, change: &FileChange) {
        tracing::info!(
            "[Daemon] Detected change in file: {} (store {})",
            change.relative.display(),
            change.vector_store
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

pub struct Daemon {
    config: ConfigWatcher,
    watches: WatchManager,
    events_rx: Receiver<notify::Result<Event>>,
    handler: Box<dyn ChangeHandler>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    state: DaemonState,
}

impl Daemon {
    pub fn new(config_path: impl Into<std::path::PathBuf>) -> Self {
        let (watches, events_rx) = WatchManager::new();
        Self {
            config: ConfigWatcher::new(config_path),
            watches,
            events_rx,
            handler: Box::new(LoggingHandler),
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: DaemonState::Initializing,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_handler(mut self, handler: Box<dyn ChangeHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Flag the termination handler flips to request shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Run until a termination request or a fatal supervision error.
    ///
    /// The first config load is fatal on failure: without a config there is
    /// nothing to watch. After that, reload failures are recoverable and the
    /// previous config stays in effect; only a vanished config source stops
    /// the loop.
    pub fn run(&mut self) -> Result<()> {
        let config = self.config.reload()?;
        let targets = config.target_directories.clone();
        self.watches.rebuild(&targets)?;

        self.state = DaemonState::Running;
        tracing::info!("[Daemon] Running (poll interval {:?})", self.poll_interval);

        let outcome = self.supervise();
        self.stop();
        outcome
    }

    fn supervise(&mut self) -> Result<()> {
        let mut last_survey = Instant::now();

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.events_rx.recv_timeout(RECV_TICK) {
                Ok(Ok(event)) => {
                    for change in self.watches.route(&event) {
                        self.handler.on_file_changed(&change);
                    }
                }
                Ok(Err(e)) => tracing::warn!("[Daemon] Watch error: {}", e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // The manager holds the sending side, so this only
                    // happens if it was dropped out from under us.
                    tracing::warn!("[Daemon] Event channel closed");
                    break;
                }
            }

            if last_survey.elapsed() >= self.poll_interval {
                self.survey_config()?;
                last_survey = Instant::now();
            }
        }

        Ok(())
    }

    /// Re-check the config source; on staleness reload it and rebuild the
    /// watch set. A vanished source is fatal; the loop must not keep
    /// polling against nothing.
    fn survey_config(&mut self) -> Result<()> {
        if !self.config.is_stale()? {
            return Ok(());
        }

        let targets = match self.config.reload() {
            Ok(config) => config.target_directories.clone(),
            Err(e) => {
                tracing::warn!("[Daemon] Config reload failed, keeping previous: {}", e);
                return Ok(());
            }
        };

        self.watches.rebuild(&targets)
    }

    /// Tear down watches and drain queued events. Runs at most once; safe
    /// when no watch mechanism was ever started.
    fn stop(&mut self) {
        if self.state == DaemonState::Stopped {
            return;
        }
        self.state = DaemonState::ShuttingDown;
        tracing::info!("[Daemon] Stopping...");

        self.watches.teardown();

        // The watcher's backend is joined at this point; whatever is still
        // in the channel is all that will ever arrive.
        let mut drained = 0;
        while self.events_rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            tracing::debug!("[Daemon] Drained {} queued events on shutdown", drained);
        }

        self.state = DaemonState::Stopped;
        tracing::info!("[Daemon] Stopped");
    }
}
