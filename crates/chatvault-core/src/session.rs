//! Sessions and their branch bookkeeping.
//!
//! A [`Session`] owns its [`Conversation`] and refers to its parent and
//! children by ID only. Methods here change in-memory state; persisting both
//! sides of a parent/child link is the backend's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Conversation, Message, Metadata, new_id};

/// Per-session settings, opaque to the engine.
pub type SessionConfig = Metadata;

/// A persisted, addressable conversation plus branch metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub conversation: Conversation,
    #[serde(default)]
    pub config: SessionConfig,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub branch_point: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub child_ids: Vec<String>,
}

impl Session {
    /// Empty, unsaved session with a fresh ID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(new_id(), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            conversation: Conversation::new(),
            config: SessionConfig::new(),
            created: now,
            updated: now,
            tags: Vec::new(),
            metadata: Metadata::new(),
            parent_id: None,
            branch_point: 0,
            branch_name: None,
            child_ids: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }

    pub fn add_message(&mut self, message: Message) {
        self.conversation.add_message(message);
        self.touch();
    }

    pub fn set_model(&mut self, model: impl Into<String>, provider: impl Into<String>) {
        self.conversation.model = model.into();
        self.conversation.provider = provider.into();
        self.conversation.updated = Utc::now();
        self.touch();
    }

    pub fn set_parameters(&mut self, temperature: f64, max_tokens: u32) {
        self.conversation.temperature = temperature;
        self.conversation.max_tokens = max_tokens;
        self.conversation.updated = Utc::now();
        self.touch();
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.conversation.system_prompt = prompt.into();
        self.conversation.updated = Utc::now();
        self.touch();
    }

    /// Add a tag; duplicates are ignored.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_tag(&tag) {
            self.tags.push(tag);
            self.touch();
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        if self.tags.len() != before {
            self.touch();
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_branch(&self) -> bool {
        self.parent_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn message_count(&self) -> usize {
        self.conversation.message_count()
    }

    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.messages.last()
    }

    /// Register a child branch. Adding an ID twice has no effect.
    pub fn add_child(&mut self, child_id: impl Into<String>) {
        let child_id = child_id.into();
        if !self.child_ids.contains(&child_id) {
            self.child_ids.push(child_id);
            self.touch();
        }
    }

    pub fn remove_child(&mut self, child_id: &str) {
        let before = self.child_ids.len();
        self.child_ids.retain(|id| id != child_id);
        if self.child_ids.len() != before {
            self.touch();
        }
    }

    /// Fork a new session from the first `message_index` messages.
    ///
    /// Copied messages get fresh IDs; tags, config and the conversation's
    /// LLM settings carry over. The branch is registered as a child of
    /// `self`, and the caller must persist both sessions.
    pub fn create_branch(
        &mut self,
        branch_id: impl Into<String>,
        branch_name: impl Into<String>,
        message_index: usize,
    ) -> Result<Session> {
        let available = self.message_count();
        if message_index > available {
            return Err(Error::Validation(format!(
                "branch point {message_index} is out of range (session has {available} messages)"
            )));
        }

        let branch_id = branch_id.into();
        if branch_id.is_empty() || branch_id == self.id {
            return Err(Error::Validation(format!(
                "invalid branch id '{branch_id}'"
            )));
        }
        let branch_name = branch_name.into();

        let mut conversation = Conversation::with_settings_of(&self.conversation);
        conversation.messages = self.conversation.messages[..message_index]
            .iter()
            .map(Message::copy_with_new_id)
            .collect();

        let mut branch = Session::with_id(branch_id, branch_name.clone());
        branch.conversation = conversation;
        branch.tags = self.tags.clone();
        branch.config = self.config.clone();
        branch.parent_id = Some(self.id.clone());
        branch.branch_point = message_index;
        branch.branch_name = Some(branch_name);

        self.add_child(branch.id.clone());
        Ok(branch)
    }

    /// Read-only projection used for listings.
    pub fn info(&self) -> SessionInfo {
        SessionInfo::from(self)
    }
}

/// Lightweight summary of a session, without message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub message_count: usize,
    pub model: String,
    pub provider: String,
    pub tags: Vec<String>,
    pub parent_id: Option<String>,
    pub branch_point: usize,
    pub branch_name: Option<String>,
    pub child_count: usize,
    pub is_branch: bool,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            created: session.created,
            updated: session.updated,
            message_count: session.message_count(),
            model: session.conversation.model.clone(),
            provider: session.conversation.provider.clone(),
            tags: session.tags.clone(),
            parent_id: session.parent_id.clone(),
            branch_point: session.branch_point,
            branch_name: session.branch_name.clone(),
            child_count: session.child_ids.len(),
            is_branch: session.is_branch(),
        }
    }
}

/// Parent-to-children view of sessions, rebuilt on every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchTree {
    pub session: SessionInfo,
    pub children: Vec<BranchTree>,
}

impl BranchTree {
    pub fn leaf(session: SessionInfo) -> Self {
        Self {
            session,
            children: Vec::new(),
        }
    }

    /// Number of sessions in the tree, root included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(BranchTree::size).sum::<usize>()
    }

    /// Longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn find(&self, id: &str) -> Option<&BranchTree> {
        if self.session.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
