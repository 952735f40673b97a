//! Storage backend contract and the registry that builds backends by name.
//!
//! Every storage medium implements the primitive operations (save, load,
//! delete, scan). Branching, merging, tree queries, search and export are
//! provided on top of those primitives, so all media share one behaviour.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config as AppConfig;
use crate::error::{Error, Result};
use crate::export::{ExportFormat, export_session};
use crate::filesystem::FileSystemBackend;
use crate::merge;
use crate::models::{MergeOptions, MergeResult, SearchResult, new_id};
use crate::search::{SearchOptions, search_sessions};
use crate::session::{BranchTree, Session, SessionInfo};
use crate::sqlite::SqliteBackend;

/// Contract every session store satisfies.
///
/// Calls are synchronous and unsynchronised: two concurrent saves of the same
/// session race and the last writer wins. Callers that share a session across
/// threads must serialise writes themselves.
pub trait Backend: Send + Sync {
    /// Backend type tag, as used in [`BackendConfig::backend_type`].
    fn name(&self) -> &'static str;

    /// Persist the full session, overwriting any prior version. Touches
    /// `updated` first.
    fn save(&self, session: &mut Session) -> Result<()>;

    /// Load a session; a missing record is [`Error::NotFound`].
    fn load(&self, id: &str) -> Result<Session>;

    /// Remove a session; a missing record is [`Error::NotFound`].
    fn delete(&self, id: &str) -> Result<()>;

    /// Decode every stored session. Records that fail to decode are skipped
    /// with a warning.
    fn load_all(&self) -> Result<Vec<Session>>;

    /// Empty, unsaved session.
    fn new_session(&self, name: &str) -> Session {
        Session::new(name)
    }

    fn update(&self, session: &mut Session) -> Result<()> {
        self.save(session)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        match self.load(id) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Summaries of all sessions, most recently updated first.
    fn list(&self) -> Result<Vec<SessionInfo>> {
        let mut infos: Vec<SessionInfo> = self.load_all()?.iter().map(SessionInfo::from).collect();
        infos.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(infos)
    }

    fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search_with(query, &SearchOptions::default())
    }

    fn search_with(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let mut sessions = self.load_all()?;
        sessions.sort_by(|a, b| b.updated.cmp(&a.updated));
        search_sessions(&sessions, query, options)
    }

    fn export(&self, id: &str, format: ExportFormat, writer: &mut dyn Write) -> Result<()> {
        let session = self.load(id)?;
        export_session(&session, format, writer)
    }

    /// Loadable children of `id`, in `child_ids` order. Dangling child IDs
    /// are skipped.
    fn get_children(&self, id: &str) -> Result<Vec<SessionInfo>> {
        let parent = self.load(id)?;
        Ok(load_children(self, &parent))
    }

    fn get_parent(&self, id: &str) -> Result<Option<SessionInfo>> {
        let session = self.load(id)?;
        let Some(parent_id) = session.parent_id.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        match self.load(parent_id) {
            Ok(parent) => Ok(Some(parent.info())),
            Err(err) => {
                warn!(session_id = %id, parent_id, error = %err, "Skipping unloadable parent");
                Ok(None)
            }
        }
    }

    /// Tree of loadable descendants rooted at `id`.
    fn get_branch_tree(&self, id: &str) -> Result<BranchTree> {
        let root = self.load(id)?;
        let mut visited = vec![root.id.clone()];
        Ok(build_tree(self, &root, &mut visited))
    }

    /// Fork `parent_id` at `message_index`, persisting the branch and then
    /// the parent.
    fn create_branch(
        &self,
        parent_id: &str,
        message_index: usize,
        branch_name: &str,
    ) -> Result<Session> {
        let mut parent = self.load(parent_id)?;
        let mut branch = parent.create_branch(new_id(), branch_name, message_index)?;
        self.save(&mut branch)?;
        self.save(&mut parent)?;
        info!(
            parent_id,
            branch_id = %branch.id,
            branch_point = message_index,
            "Created branch"
        );
        Ok(branch)
    }

    /// Merge `source_id` into `target_id`. Nothing is written unless the
    /// in-memory merge succeeds.
    fn merge_sessions(
        &self,
        target_id: &str,
        source_id: &str,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        merge::check_ids(target_id, source_id, options)?;

        let target = self.load(target_id)?;
        let source = self.load(source_id)?;
        let outcome = merge::merge(target, &source, options)?;

        let mut target = outcome.target;
        if let Some(mut branch) = outcome.branch {
            self.save(&mut branch)?;
        }
        self.save(&mut target)?;

        info!(
            target_id,
            source_id,
            merge_type = %outcome.result.merge_type,
            merged = outcome.result.merged_count,
            new_branch = outcome.result.new_branch_id.as_deref().unwrap_or(""),
            "Merged sessions"
        );
        Ok(outcome.result)
    }
}

fn load_children<B: Backend + ?Sized>(backend: &B, parent: &Session) -> Vec<SessionInfo> {
    load_child_sessions(backend, parent)
        .iter()
        .map(Session::info)
        .collect()
}

fn load_child_sessions<B: Backend + ?Sized>(backend: &B, parent: &Session) -> Vec<Session> {
    parent
        .child_ids
        .iter()
        .filter_map(|child_id| match backend.load(child_id) {
            Ok(child) => Some(child),
            Err(err) => {
                warn!(
                    parent_id = %parent.id,
                    child_id = %child_id,
                    error = %err,
                    "Skipping unloadable child"
                );
                None
            }
        })
        .collect()
}

fn build_tree<B: Backend + ?Sized>(
    backend: &B,
    session: &Session,
    visited: &mut Vec<String>,
) -> BranchTree {
    let mut tree = BranchTree::leaf(session.info());
    for child in load_child_sessions(backend, session) {
        // Hand-edited files can form cycles; never descend into a node twice.
        if visited.contains(&child.id) {
            warn!(session_id = %child.id, "Branch cycle detected, skipping");
            continue;
        }
        visited.push(child.id.clone());
        tree.children.push(build_tree(backend, &child, visited));
    }
    tree
}

/// Backend selection: a type tag plus backend-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub backend_type: String,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::filesystem(crate::paths::default_sessions_dir())
    }
}

impl BackendConfig {
    pub fn new(backend_type: impl Into<String>) -> Self {
        Self {
            backend_type: backend_type.into(),
            settings: BTreeMap::new(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Self::new(FileSystemBackend::TYPE).with_path(path)
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::new(SqliteBackend::TYPE).with_path(path)
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    fn with_path(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into().to_string_lossy().to_string();
        self.with_setting("path", serde_json::Value::String(path))
    }

    /// String setting, if present.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }

    /// The `path` setting with `~` and environment variables expanded.
    pub fn path(&self) -> Result<PathBuf> {
        self.setting_str("path")
            .filter(|p| !p.is_empty())
            .map(AppConfig::expand_path)
            .ok_or_else(|| {
                Error::Config(format!(
                    "backend '{}' requires a 'path' setting",
                    self.backend_type
                ))
            })
    }
}

/// Constructor for a backend from its configuration.
pub type BackendConstructor = fn(&BackendConfig) -> Result<Box<dyn Backend>>;

/// Process-scoped table of backend constructors keyed by type name.
///
/// Built once at startup and passed by reference to whatever opens storage.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl BackendRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the filesystem and SQLite backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in [FileSystemBackend::TYPE, "fs", "file"] {
            registry.register(name, FileSystemBackend::from_config);
        }
        registry.register(SqliteBackend::TYPE, SqliteBackend::from_config);
        registry
    }

    /// Register a constructor, replacing any previous one under that name.
    pub fn register(&mut self, name: impl Into<String>, constructor: BackendConstructor) {
        self.constructors
            .insert(name.into().to_lowercase(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create(&self, config: &BackendConfig) -> Result<Box<dyn Backend>> {
        let constructor = self
            .constructors
            .get(&config.backend_type.to_lowercase())
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown backend type '{}' (known: {})",
                    config.backend_type,
                    self.names().join(", ")
                ))
            })?;
        constructor(config)
    }
}
