//! Contract checks shared by every backend's integration tests.

use chatvault_core::Backend;
use chatvault_core::export::ExportFormat;
use chatvault_core::models::{MatchType, MergeOptions, MergeType, Message};
use chatvault_core::session::Session;

/// Save a session named `name` holding alternating user/assistant messages.
pub fn saved_session(backend: &dyn Backend, name: &str, contents: &[&str]) -> Session {
    let mut session = backend.new_session(name);
    for (i, content) in contents.iter().enumerate() {
        if i % 2 == 0 {
            session.add_message(Message::user(*content));
        } else {
            session.add_message(Message::assistant(*content));
        }
    }
    backend.save(&mut session).expect("save session");
    session
}

pub fn contents(session: &Session) -> Vec<String> {
    session.messages().iter().map(|m| m.content.clone()).collect()
}

pub fn round_trip(backend: &dyn Backend) {
    let mut session = backend.new_session("round trip");
    session.set_model("gpt-4o", "openai");
    session.set_parameters(0.3, 1024);
    session.set_system_prompt("system prompt");
    session.add_tag("alpha");
    session
        .config
        .insert("stream".to_string(), serde_json::json!(true));
    session
        .metadata
        .insert("origin".to_string(), serde_json::json!("test"));
    session.add_message(Message::user("hello"));
    session.add_message(Message::assistant("hi there"));

    let before = session.updated;
    backend.save(&mut session).expect("save");
    assert!(session.updated >= before, "save touches updated");

    let loaded = backend.load(&session.id).expect("load");
    assert_eq!(loaded, session);
}

pub fn missing_is_not_found(backend: &dyn Backend) {
    let err = backend.load("does-not-exist").expect_err("load missing");
    assert!(err.is_not_found(), "load: {err}");
    let err = backend.delete("does-not-exist").expect_err("delete missing");
    assert!(err.is_not_found(), "delete: {err}");
    assert!(!backend.exists("does-not-exist").expect("exists"));
}

pub fn delete_then_load(backend: &dyn Backend) {
    let session = saved_session(backend, "doomed", &["bye"]);
    assert!(backend.exists(&session.id).expect("exists"));
    backend.delete(&session.id).expect("delete");
    let err = backend.load(&session.id).expect_err("load deleted");
    assert!(err.is_not_found());
}

pub fn save_overwrites(backend: &dyn Backend) {
    let mut session = saved_session(backend, "v1", &["one"]);
    session.name = "v2".to_string();
    session.add_message(Message::assistant("two"));
    backend.update(&mut session).expect("update");

    let loaded = backend.load(&session.id).expect("load");
    assert_eq!(loaded.name, "v2");
    assert_eq!(loaded.message_count(), 2);
    assert_eq!(backend.list().expect("list").len(), 1);
}

pub fn list_newest_first(backend: &dyn Backend) {
    let first = saved_session(backend, "first", &[]);
    std::thread::sleep(std::time::Duration::from_millis(10));
    let second = saved_session(backend, "second", &["a", "b", "c"]);

    let infos = backend.list().expect("list");
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].id, second.id);
    assert_eq!(infos[0].message_count, 3);
    assert_eq!(infos[1].id, first.id);
}

pub fn branch_prefix(backend: &dyn Backend) {
    let parent = saved_session(backend, "parent", &["q1", "a1", "q2", "a2"]);

    for k in 0..=parent.message_count() {
        let branch = backend
            .create_branch(&parent.id, k, &format!("b{k}"))
            .expect("create branch");
        let loaded = backend.load(&branch.id).expect("load branch");

        assert_eq!(loaded.message_count(), k);
        assert_eq!(loaded.parent_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(loaded.branch_point, k);
        for (copy, original) in loaded.messages().iter().zip(parent.messages()) {
            assert_eq!(copy.content, original.content);
            assert_eq!(copy.role, original.role);
            assert_ne!(copy.id, original.id);
        }

        let reloaded_parent = backend.load(&parent.id).expect("load parent");
        assert!(reloaded_parent.child_ids.contains(&branch.id));
        assert_eq!(reloaded_parent.message_count(), parent.message_count());
    }

    let err = backend
        .create_branch(&parent.id, 99, "too far")
        .expect_err("out of range");
    assert!(err.is_validation());
    let reloaded = backend.load(&parent.id).expect("load parent");
    assert_eq!(reloaded.child_ids.len(), parent.message_count() + 1);
}

pub fn dangling_children_are_skipped(backend: &dyn Backend) {
    let parent = saved_session(backend, "parent", &["q", "a"]);
    let keep = backend.create_branch(&parent.id, 1, "keep").expect("keep");
    let gone = backend.create_branch(&parent.id, 2, "gone").expect("gone");
    backend.delete(&gone.id).expect("delete child");

    let children = backend.get_children(&parent.id).expect("children");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, keep.id);
    assert!(children[0].is_branch);
    assert_eq!(children[0].branch_name.as_deref(), Some("keep"));

    let err = backend.get_children("no-such-parent").expect_err("missing parent");
    assert!(err.is_not_found());
}

pub fn parent_lookup(backend: &dyn Backend) {
    let parent = saved_session(backend, "parent", &["q"]);
    let child = backend.create_branch(&parent.id, 1, "child").expect("branch");

    let found = backend.get_parent(&child.id).expect("parent");
    assert_eq!(found.map(|p| p.id), Some(parent.id.clone()));
    assert!(backend.get_parent(&parent.id).expect("root").is_none());

    backend.delete(&parent.id).expect("delete parent");
    assert!(backend.get_parent(&child.id).expect("dangling").is_none());
}

pub fn tree_shape(backend: &dyn Backend) {
    let root = saved_session(backend, "root", &["q1", "a1", "q2"]);
    let a = backend.create_branch(&root.id, 1, "a").expect("a");
    let b = backend.create_branch(&root.id, 2, "b").expect("b");
    let a1 = backend.create_branch(&a.id, 1, "a1").expect("a1");
    let a1x = backend.create_branch(&a1.id, 0, "a1x").expect("a1x");
    let dead = backend.create_branch(&b.id, 0, "dead").expect("dead");
    backend.delete(&dead.id).expect("delete dead");

    let tree = backend.get_branch_tree(&root.id).expect("tree");
    assert_eq!(tree.session.id, root.id);
    assert_eq!(tree.children.len(), 2);
    assert_eq!(tree.children[0].session.id, a.id);
    assert_eq!(tree.children[1].session.id, b.id);
    assert!(tree.children[1].children.is_empty());
    assert_eq!(tree.children[0].children.len(), 1);
    assert_eq!(tree.children[0].children[0].children[0].session.id, a1x.id);
    assert_eq!(tree.size(), 5);
    assert_eq!(tree.depth(), 3);

    let subtree = backend.get_branch_tree(&a.id).expect("subtree");
    assert_eq!(subtree.size(), 3);
}

pub fn continuation_merge(backend: &dyn Backend) {
    let source = saved_session(backend, "A", &["a1", "a2"]);
    let target = saved_session(backend, "B", &["b1", "b2"]);

    let result = backend
        .merge_sessions(
            &target.id,
            &source.id,
            &MergeOptions::new(MergeType::Continuation),
        )
        .expect("merge");
    assert_eq!(result.merged_count, 2);
    assert!(result.new_branch_id.is_none());

    let merged = backend.load(&target.id).expect("load target");
    assert_eq!(contents(&merged), vec!["b1", "b2", "a1", "a2"]);
    let untouched = backend.load(&source.id).expect("load source");
    assert_eq!(contents(&untouched), vec!["a1", "a2"]);
}

pub fn branch_creating_merge(backend: &dyn Backend) {
    let source = saved_session(backend, "A", &["a1", "a2"]);
    let target = saved_session(backend, "B", &["b1", "b2"]);

    let result = backend
        .merge_sessions(
            &target.id,
            &source.id,
            &MergeOptions::new(MergeType::Continuation).into_branch("x"),
        )
        .expect("merge");
    let branch_id = result.new_branch_id.expect("new branch id");
    assert!(!branch_id.is_empty());

    let reloaded_target = backend.load(&target.id).expect("load target");
    assert_eq!(contents(&reloaded_target), vec!["b1", "b2"]);
    assert!(reloaded_target.child_ids.contains(&branch_id));

    let branch = backend.load(&branch_id).expect("load branch");
    assert_eq!(branch.parent_id.as_deref(), Some(target.id.as_str()));
    assert_eq!(branch.branch_name.as_deref(), Some("x"));
    assert_eq!(contents(&branch), vec!["b1", "b2", "a1", "a2"]);

    let children = backend.get_children(&target.id).expect("children");
    assert_eq!(children.len(), 1);
}

pub fn failed_merge_writes_nothing(backend: &dyn Backend) {
    let source = saved_session(backend, "A", &["a1"]);
    let target = saved_session(backend, "B", &["b1"]);
    let before = backend.load(&target.id).expect("load target");

    let err = backend
        .merge_sessions(
            &target.id,
            &source.id,
            &MergeOptions::new(MergeType::CherryPick).pick([5]).into_branch("nope"),
        )
        .expect_err("bad index");
    assert!(err.is_validation());
    assert_eq!(backend.load(&target.id).expect("reload"), before);
    assert_eq!(backend.list().expect("list").len(), 2);

    let err = backend
        .merge_sessions(&target.id, "missing", &MergeOptions::default())
        .expect_err("missing source");
    assert!(err.is_not_found());
}

pub fn search_precision(backend: &dyn Backend) {
    saved_session(backend, "S", &["m0", "m1", "m2", "the zanzibar token", "m4"]);
    saved_session(backend, "Other", &["nothing to see"]);

    let results = backend.search("ZANZIBAR").expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].session.name, "S");
    assert_eq!(results[0].matches.len(), 1);
    let hit = &results[0].matches[0];
    assert_eq!(hit.match_type, MatchType::Message);
    assert_eq!(hit.message_index, Some(3));
    assert_eq!(hit.full_text, "the zanzibar token");

    assert!(backend.search("absent-token").expect("search").is_empty());
}

pub fn export_formats(backend: &dyn Backend) {
    let session = saved_session(backend, "Exported", &["question", "answer"]);

    let mut json = Vec::new();
    backend
        .export(&session.id, ExportFormat::Json, &mut json)
        .expect("json export");
    let parsed: Session = serde_json::from_slice(&json).expect("parse json");
    assert_eq!(parsed.id, session.id);

    let mut md = Vec::new();
    backend
        .export(&session.id, ExportFormat::Markdown, &mut md)
        .expect("markdown export");
    let md = String::from_utf8(md).expect("utf8");
    assert!(md.starts_with("# Session: Exported"));
    assert!(md.contains("### Assistant\n\nanswer"));

    let err = backend
        .export("missing", ExportFormat::Json, &mut Vec::new())
        .expect_err("missing");
    assert!(err.is_not_found());
}
