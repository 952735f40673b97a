//! Merge engine.
//!
//! Works purely on in-memory sessions; the backend persists the outcome.
//! Every strategy copies messages under fresh IDs so IDs stay unique within
//! the receiving conversation.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{MergeOptions, MergeResult, MergeType, Message, new_id};
use crate::session::Session;

/// Sessions produced by a merge, ready to be saved.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The target after the merge. When a branch was created this differs
    /// from the input only by the new child ID.
    pub target: Session,
    /// The new branch holding the merged history, if one was requested.
    pub branch: Option<Session>,
    pub result: MergeResult,
}

/// Reject self-merges and options whose IDs disagree with the call.
pub fn check_ids(target_id: &str, source_id: &str, options: &MergeOptions) -> Result<()> {
    if target_id == source_id {
        return Err(Error::Validation(format!(
            "cannot merge session '{target_id}' into itself"
        )));
    }
    if !options.target_id.is_empty() && options.target_id != target_id {
        return Err(Error::Validation(format!(
            "merge options target '{}' does not match '{target_id}'",
            options.target_id
        )));
    }
    if !options.source_id.is_empty() && options.source_id != source_id {
        return Err(Error::Validation(format!(
            "merge options source '{}' does not match '{source_id}'",
            options.source_id
        )));
    }
    Ok(())
}

/// Merge `source` into `target` according to `options`.
pub fn merge(mut target: Session, source: &Session, options: &MergeOptions) -> Result<MergeOutcome> {
    check_ids(&target.id, &source.id, options)?;

    let incoming = match options.merge_type {
        MergeType::Continuation => continuation(source),
        MergeType::Rebase => rebase(&target, source)?,
        MergeType::CherryPick => cherry_pick(source, &options.message_indices)?,
    };
    let merged_count = incoming.len();

    if options.create_branch {
        let name = if options.branch_name.trim().is_empty() {
            format!("merge-{}", source.name)
        } else {
            options.branch_name.clone()
        };
        let point = target.message_count();
        let mut branch = target.create_branch(new_id(), name, point)?;
        append(&mut branch, incoming);

        let result = MergeResult {
            merge_type: options.merge_type,
            merged_count,
            new_branch_id: Some(branch.id.clone()),
        };
        return Ok(MergeOutcome {
            target,
            branch: Some(branch),
            result,
        });
    }

    append(&mut target, incoming);
    Ok(MergeOutcome {
        target,
        branch: None,
        result: MergeResult {
            merge_type: options.merge_type,
            merged_count,
            new_branch_id: None,
        },
    })
}

fn append(session: &mut Session, messages: Vec<Message>) {
    for message in messages {
        session.add_message(message);
    }
}

fn continuation(source: &Session) -> Vec<Message> {
    source
        .messages()
        .iter()
        .map(Message::copy_with_new_id)
        .collect()
}

fn rebase(target: &Session, source: &Session) -> Result<Vec<Message>> {
    let base = common_prefix_len(target.messages(), source.messages());
    if base == 0 && !related(target, source) {
        return Err(Error::Merge(format!(
            "sessions '{}' and '{}' share no history to rebase onto",
            target.id, source.id
        )));
    }

    Ok(source.messages()[base..]
        .iter()
        .map(Message::copy_with_new_id)
        .collect())
}

fn cherry_pick(source: &Session, indices: &[usize]) -> Result<Vec<Message>> {
    if indices.is_empty() {
        return Err(Error::Validation(
            "cherry-pick requires at least one message index".to_string(),
        ));
    }

    let available = source.message_count();
    let mut seen = HashSet::new();
    let mut picked = Vec::with_capacity(indices.len());
    for &idx in indices {
        if idx >= available {
            return Err(Error::Validation(format!(
                "message index {idx} is out of range (source has {available} messages)"
            )));
        }
        if !seen.insert(idx) {
            return Err(Error::Validation(format!(
                "message index {idx} selected more than once"
            )));
        }
        picked.push(source.messages()[idx].copy_with_new_id());
    }
    Ok(picked)
}

/// Number of leading messages both histories agree on by role and content.
pub fn common_prefix_len(a: &[Message], b: &[Message]) -> usize {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.same_content(y))
        .count()
}

/// Parent/child or sibling relationship through stored links.
fn related(a: &Session, b: &Session) -> bool {
    let parent_of = |s: &Session| s.parent_id.clone().filter(|p| !p.is_empty());
    parent_of(a).as_deref() == Some(b.id.as_str())
        || parent_of(b).as_deref() == Some(a.id.as_str())
        || (parent_of(a).is_some() && parent_of(a) == parent_of(b))
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
