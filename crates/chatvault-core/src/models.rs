//! Domain models for conversations, merges and search results.
//!
//! Session-level types (with their branch bookkeeping) live in
//! [`crate::session`]; this module holds the pieces a session is built from.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::session::SessionInfo;

/// Free-form metadata attached to sessions and conversations.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Generate a fresh identifier for sessions, conversations and messages.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Message roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Heading form used in transcripts ("User", "Assistant", "System").
    pub fn title(self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
            MessageRole::System => "System",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(Error::Validation(format!("unknown message role '{other}'"))),
        }
    }
}

/// Attachment types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    File,
    Image,
    Code,
}

/// An attachment to a message (file, image, code block).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            attachment_type: AttachmentType::File,
            path: path.into(),
            name: None,
            mime_type: None,
        }
    }

    /// Label used in transcripts: the display name when present, else the path.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

/// A single message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Copy of this message under a new ID; content, role, attachments and
    /// timestamp are kept.
    pub fn copy_with_new_id(&self) -> Self {
        Self {
            id: new_id(),
            ..self.clone()
        }
    }

    /// Whether two messages say the same thing, ignoring IDs and timestamps.
    pub fn same_content(&self, other: &Message) -> bool {
        self.role == other.role && self.content == other.content
    }
}

fn default_temperature() -> f64 {
    0.7
}

/// Ordered message history plus the LLM settings it was produced with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Empty conversation with a fresh ID.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            messages: Vec::new(),
            model: String::new(),
            provider: String::new(),
            temperature: default_temperature(),
            max_tokens: 0,
            system_prompt: String::new(),
            created: now,
            updated: now,
            metadata: Metadata::new(),
        }
    }

    /// New empty conversation carrying over this one's LLM settings.
    pub fn with_settings_of(other: &Conversation) -> Self {
        Self {
            model: other.model.clone(),
            provider: other.provider.clone(),
            temperature: other.temperature,
            max_tokens: other.max_tokens,
            system_prompt: other.system_prompt.clone(),
            ..Self::new()
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn contains_message_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}

/// Merge strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MergeType {
    /// Append the whole source history after the target history.
    #[default]
    Continuation,
    /// Replay the source messages past the point where it diverged from target.
    Rebase,
    /// Copy selected source messages onto target.
    CherryPick,
}

impl std::fmt::Display for MergeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeType::Continuation => write!(f, "continuation"),
            MergeType::Rebase => write!(f, "rebase"),
            MergeType::CherryPick => write!(f, "cherry-pick"),
        }
    }
}

impl FromStr for MergeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "continuation" | "continue" => Ok(MergeType::Continuation),
            "rebase" => Ok(MergeType::Rebase),
            "cherry-pick" | "cherrypick" | "cherry_pick" => Ok(MergeType::CherryPick),
            other => Err(Error::Validation(format!("unknown merge type '{other}'"))),
        }
    }
}

/// Options for merging one session into another.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeOptions {
    #[serde(rename = "type")]
    pub merge_type: MergeType,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub create_branch: bool,
    #[serde(default)]
    pub branch_name: String,
    /// Source message indices to copy; only used by cherry-pick.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_indices: Vec<usize>,
}

impl MergeOptions {
    pub fn new(merge_type: MergeType) -> Self {
        Self {
            merge_type,
            ..Self::default()
        }
    }

    pub fn into_branch(mut self, name: impl Into<String>) -> Self {
        self.create_branch = true;
        self.branch_name = name.into();
        self
    }

    pub fn pick(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.message_indices = indices.into_iter().collect();
        self
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeResult {
    pub merge_type: MergeType,
    pub merged_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_branch_id: Option<String>,
}

/// Which field of a session a search hit came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Name,
    Message,
    SystemPrompt,
    Tag,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Name => write!(f, "name"),
            MatchType::Message => write!(f, "message"),
            MatchType::SystemPrompt => write!(f, "system-prompt"),
            MatchType::Tag => write!(f, "tag"),
        }
    }
}

/// A single hit inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchMatch {
    #[serde(rename = "type")]
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    pub full_text: String,
    pub snippet: String,
    /// Position of the message in the conversation, `None` for non-message hits.
    pub message_index: Option<usize>,
}

/// All hits for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub session: SessionInfo,
    pub matches: Vec<SearchMatch>,
}

impl SearchResult {
    pub fn new(session: SessionInfo) -> Self {
        Self {
            session,
            matches: Vec::new(),
        }
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
