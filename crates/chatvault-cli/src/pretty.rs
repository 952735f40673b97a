//! Pretty terminal output formatting for the chatvault CLI.

use chatvault_core::models::{MatchType, MessageRole, SearchResult};
use chatvault_core::search::find_case_insensitive;
use chatvault_core::{BranchTree, Session, SessionInfo};
use chrono::{DateTime, Utc};
use console::{Style, Term, style};

/// Terminal width for formatting, with fallback.
fn term_width() -> usize {
    let width = Term::stdout().size().1 as usize;
    if width == 0 { 80 } else { width }
}

/// Format a relative time string (e.g., "2 days ago", "just now").
pub fn relative_time(dt: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(dt);

    if duration.num_seconds() < 60 {
        return "just now".to_string();
    }
    if duration.num_minutes() < 60 {
        let mins = duration.num_minutes();
        return format!("{mins} min{s} ago", s = if mins == 1 { "" } else { "s" });
    }
    if duration.num_hours() < 24 {
        let hours = duration.num_hours();
        return format!("{hours} hour{s} ago", s = if hours == 1 { "" } else { "s" });
    }
    if duration.num_days() < 7 {
        let days = duration.num_days();
        return format!("{days} day{s} ago", s = if days == 1 { "" } else { "s" });
    }
    if duration.num_weeks() < 4 {
        let weeks = duration.num_weeks();
        return format!("{weeks} week{s} ago", s = if weeks == 1 { "" } else { "s" });
    }

    dt.format("%Y-%m-%d").to_string()
}

/// Style for role badges.
fn role_style(role: MessageRole) -> Style {
    match role {
        MessageRole::User => Style::new().cyan().bold(),
        MessageRole::Assistant => Style::new().green().bold(),
        MessageRole::System => Style::new().magenta().bold(),
    }
}

/// Collapse whitespace runs and cut to `max` characters.
fn one_line(s: &str, max: usize) -> String {
    let clean = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= max {
        return clean;
    }
    let cut: String = clean.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Bold-yellow every case-insensitive occurrence of `query` in `text`.
fn highlight(text: &str, query: &str) -> String {
    if !console::colors_enabled() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some((start, end)) = find_case_insensitive(rest, query) {
        out.push_str(&rest[..start]);
        out.push_str(&style(&rest[start..end]).yellow().bold().to_string());
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn branch_label(info: &SessionInfo) -> String {
    match &info.branch_name {
        Some(name) if info.is_branch => format!(" [{name} @ {}]", info.branch_point),
        _ => String::new(),
    }
}

/// Print session summaries, one per line.
pub fn print_session_list(infos: &[SessionInfo]) {
    if infos.is_empty() {
        println!("{}", style("No sessions found.").dim());
        return;
    }

    for info in infos {
        let tags = if info.tags.is_empty() {
            String::new()
        } else {
            format!(" #{}", info.tags.join(" #"))
        };
        println!(
            "{}  {}{}  {}  {}{}",
            style(&info.id).dim(),
            style(&info.name).bold(),
            style(branch_label(info)).cyan(),
            style(format!("{} msgs", info.message_count)).dim(),
            style(relative_time(info.updated)).dim().italic(),
            style(tags).yellow(),
        );
    }
}

/// Print a session header and its full transcript.
pub fn print_session(session: &Session) {
    println!("{}", style(&session.name).bold().white());
    println!("{}", style(format!("ID: {}", session.id)).dim());

    let conversation = &session.conversation;
    if !conversation.model.is_empty() {
        println!(
            "{}",
            style(format!(
                "Model: {} ({}), temperature {}, max tokens {}",
                conversation.model,
                if conversation.provider.is_empty() { "-" } else { conversation.provider.as_str() },
                conversation.temperature,
                conversation.max_tokens
            ))
            .dim()
        );
    }
    if let Some(parent) = &session.parent_id {
        println!(
            "{}",
            style(format!("Branch of {parent} at message {}", session.branch_point)).cyan()
        );
    }
    if !session.child_ids.is_empty() {
        println!(
            "{}",
            style(format!("{} branch(es)", session.child_ids.len())).cyan()
        );
    }
    if !session.tags.is_empty() {
        println!("{}", style(format!("Tags: {}", session.tags.join(", "))).yellow());
    }
    println!(
        "{}",
        style(format!(
            "Created {}, updated {}",
            relative_time(session.created),
            relative_time(session.updated)
        ))
        .dim()
        .italic()
    );

    if !conversation.system_prompt.is_empty() {
        println!();
        println!("{}", role_style(MessageRole::System).apply_to("system prompt"));
        println!("{}", conversation.system_prompt);
    }

    let rule = "─".repeat(term_width().min(80));
    for (idx, message) in session.messages().iter().enumerate() {
        println!("{}", style(&rule).dim());
        println!(
            "{} {}",
            style(format!("#{idx}")).dim(),
            role_style(message.role).apply_to(message.role.title())
        );
        println!("{}", message.content);
        for attachment in &message.attachments {
            println!("{}", style(format!("  + {}", attachment.label())).dim());
        }
    }
}

/// Render a branch tree as indented lines, without styling.
pub fn tree_lines(tree: &BranchTree) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}, {} msgs){}",
        tree.session.name,
        tree.session.id,
        tree.session.message_count,
        branch_label(&tree.session)
    )];
    push_children(tree, "", &mut lines);
    lines
}

fn push_children(tree: &BranchTree, prefix: &str, lines: &mut Vec<String>) {
    let count = tree.children.len();
    for (i, child) in tree.children.iter().enumerate() {
        let last = i + 1 == count;
        let (connector, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        lines.push(format!(
            "{prefix}{connector}{} ({}, {} msgs){}",
            child.session.name,
            child.session.id,
            child.session.message_count,
            branch_label(&child.session)
        ));
        push_children(child, &format!("{prefix}{indent}"), lines);
    }
}

pub fn print_tree(tree: &BranchTree) {
    for (i, line) in tree_lines(tree).into_iter().enumerate() {
        if i == 0 {
            println!("{}", style(line).bold());
        } else {
            println!("{line}");
        }
    }
}

/// Print search results grouped by session.
pub fn print_search_results(results: &[SearchResult], query: &str) {
    if results.is_empty() {
        println!("{}", style("No results found.").dim());
        return;
    }

    let width = term_width().min(100);
    let separator = "─".repeat(width);
    let total: usize = results.iter().map(|r| r.matches.len()).sum();
    println!(
        "{}",
        style(format!(
            " Found {total} match(es) in {} session(s)",
            results.len()
        ))
        .bold()
        .white()
    );

    for result in results {
        println!("{}", style(&separator).dim());
        println!(
            " {}  {}",
            style(&result.session.name).bold(),
            style(format!(
                "{} · {}",
                result.session.id,
                relative_time(result.session.updated)
            ))
            .dim()
        );

        for hit in &result.matches {
            let label = match (hit.match_type, hit.role, hit.message_index) {
                (MatchType::Message, Some(role), Some(idx)) => {
                    format!("{} #{idx}", role_style(role).apply_to(role.title()))
                }
                (match_type, _, _) => style(match_type.to_string()).magenta().to_string(),
            };
            let snippet = one_line(&hit.snippet, width.saturating_sub(8).max(40));
            println!("   {label}  {}", highlight(&snippet, query));
        }
    }
}
