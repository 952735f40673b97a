//! Session export to JSON and Markdown.

use std::io::Write;
use std::str::FromStr;

use chrono::SecondsFormat;

use crate::error::{Error, Result};
use crate::session::Session;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(Error::UnsupportedFormat(format!(
                "'{other}' (expected json or markdown)"
            ))),
        }
    }
}

/// Write `session` to `writer` in the given format.
pub fn export_session(session: &Session, format: ExportFormat, writer: &mut dyn Write) -> Result<()> {
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, session)?;
            writeln!(writer).map_err(|e| Error::io("writing JSON export", e))?;
        }
        ExportFormat::Markdown => {
            writer
                .write_all(render_markdown(session).as_bytes())
                .map_err(|e| Error::io("writing Markdown export", e))?;
        }
    }
    writer
        .flush()
        .map_err(|e| Error::io("flushing export", e))
}

/// Human-readable transcript of a session.
pub fn render_markdown(session: &Session) -> String {
    let mut out = String::new();
    let conv = &session.conversation;

    out.push_str(&format!("# Session: {}\n\n", session.name));
    out.push_str(&format!("**ID:** {}\n", session.id));
    out.push_str(&format!(
        "**Created:** {}\n",
        session.created.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!(
        "**Updated:** {}\n",
        session.updated.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    if !session.tags.is_empty() {
        out.push_str(&format!("**Tags:** {}\n", session.tags.join(", ")));
    }
    if !conv.model.is_empty() {
        out.push_str(&format!("**Model:** {}\n", conv.model));
    }
    if !conv.provider.is_empty() {
        out.push_str(&format!("**Provider:** {}\n", conv.provider));
    }
    if let Some(parent_id) = session.parent_id.as_deref().filter(|p| !p.is_empty()) {
        out.push_str(&format!(
            "**Branch of:** {parent_id} at message {}\n",
            session.branch_point
        ));
    }
    out.push('\n');

    if !conv.system_prompt.is_empty() {
        out.push_str("## System Prompt\n\n");
        out.push_str(&conv.system_prompt);
        out.push_str("\n\n");
    }

    out.push_str("## Conversation\n\n");
    for message in &conv.messages {
        out.push_str(&format!("### {}\n\n", message.role.title()));
        out.push_str(&message.content);
        out.push_str("\n\n");

        if !message.attachments.is_empty() {
            out.push_str("**Attachments:**\n");
            for attachment in &message.attachments {
                out.push_str(&format!("- {}\n", attachment.label()));
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
