//! chatvault-core: branchable LLM chat session storage
//!
//! This crate persists chat sessions (conversation histories with an LLM)
//! and supports Git-like branching and merging of those histories. Storage
//! media plug in behind the [`Backend`] trait; a JSON-file backend and a
//! SQLite backend ship by default and are selected through a
//! [`BackendRegistry`].

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod filesystem;
pub mod merge;
pub mod models;
pub mod paths;
pub mod schema;
pub mod search;
pub mod session;
pub mod sqlite;

pub use backend::{Backend, BackendConfig, BackendRegistry};
pub use config::Config;
pub use error::Error;
pub use error::Result;
pub use filesystem::FileSystemBackend;
pub use session::{BranchTree, Session, SessionInfo};
pub use sqlite::SqliteBackend;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "chatvault";

/// Returns the environment variable prefix for this application.
pub fn env_prefix() -> String {
    "CHATVAULT".to_string()
}
