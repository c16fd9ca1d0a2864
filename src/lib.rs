//! recalld: Local Semantic Search Daemon
//!
//! Keeps an embedding-indexed store of document fragments (SQLite +
//! sqlite-vec) in sync with a set of watched directories:
//! - Storage (durable vector record store, one vec0 table per store)
//! - Engine (exact nearest-neighbor queries)
//! - Watcher (recursive per-directory filesystem watches)
//! - Daemon (config-driven supervision loop + cooperative shutdown)
//!
//! Chunking, embedding, and answer generation live outside this crate; they
//! plug in through [`daemon::ChangeHandler`] and [`storage::VectorStore`].

pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod storage;
pub mod watcher;

pub use config::{Config, ConfigWatcher, TargetDirectory};
pub use daemon::{ChangeHandler, Daemon, DaemonState, LoggingHandler};
pub use engine::{QueryMode, SearchResult, Searcher, VectorQuery};
pub use error::{RecallError, Result};
pub use storage::{Record, VectorStore};
pub use watcher::{FileChange, WatchManager};
