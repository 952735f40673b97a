//! Unit tests for session export.

use super::*;
use crate::models::{Attachment, Message};

fn sample() -> Session {
    let mut session = Session::new("Design review");
    session.add_tag("review");
    session.add_tag("q3");
    session.set_model("gpt-4o", "openai");
    session.set_system_prompt("Be concise.");
    session.add_message(Message::user("Please look at this file."));
    session.add_message(
        Message::assistant("Looks good.").with_attachment(Attachment::file("src/main.rs")),
    );
    session
}

fn export_to_string(session: &Session, format: ExportFormat) -> String {
    let mut buf = Vec::new();
    export_session(session, format, &mut buf).expect("export");
    String::from_utf8(buf).expect("utf8")
}

#[test]
fn format_parsing() {
    assert_eq!("json".parse::<ExportFormat>().expect("json"), ExportFormat::Json);
    assert_eq!("MD".parse::<ExportFormat>().expect("md"), ExportFormat::Markdown);
    assert_eq!(
        "markdown".parse::<ExportFormat>().expect("markdown"),
        ExportFormat::Markdown
    );
    let err = "pdf".parse::<ExportFormat>().expect_err("pdf");
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert!(err.is_validation());
}

#[test]
fn json_export_round_trips() {
    let session = sample();
    let json = export_to_string(&session, ExportFormat::Json);
    assert!(json.contains("\n  \"id\""), "expected indented JSON");
    let parsed: Session = serde_json::from_str(&json).expect("parse export");
    assert_eq!(parsed, session);
}

#[test]
fn markdown_has_header_metadata_and_transcript() {
    let session = sample();
    let md = export_to_string(&session, ExportFormat::Markdown);

    assert!(md.starts_with("# Session: Design review\n"));
    assert!(md.contains(&format!("**ID:** {}", session.id)));
    assert!(md.contains("**Created:** "));
    assert!(md.contains("**Updated:** "));
    assert!(md.contains("**Tags:** review, q3"));
    assert!(md.contains("**Model:** gpt-4o"));
    assert!(md.contains("## System Prompt\n\nBe concise."));
    assert!(md.contains("## Conversation"));
    assert!(md.contains("### User\n\nPlease look at this file."));
    assert!(md.contains("### Assistant\n\nLooks good."));
    assert!(md.contains("**Attachments:**\n- src/main.rs"));

    let user = md.find("### User").expect("user heading");
    let assistant = md.find("### Assistant").expect("assistant heading");
    assert!(user < assistant);
}

#[test]
fn markdown_skips_empty_sections() {
    let mut session = Session::new("Bare");
    session.add_message(Message::user("hi"));
    let md = render_markdown(&session);
    assert!(!md.contains("## System Prompt"));
    assert!(!md.contains("**Tags:**"));
    assert!(!md.contains("**Attachments:**"));
    assert!(!md.contains("**Branch of:**"));
}

#[test]
fn markdown_marks_branches() {
    let mut parent = sample();
    let branch = parent.create_branch("b-1", "alt", 1).expect("branch");
    let md = render_markdown(&branch);
    assert!(md.contains(&format!("**Branch of:** {} at message 1", parent.id)));
}
