use formloom_descriptor::FieldDescriptor;
use formloom_engine::{Form, FormConfig, FormOptions, StoreMode};
use serde_json::json;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn controlled(config: FormConfig) -> Form {
    Form::new(
        &[FieldDescriptor::text("title"), FieldDescriptor::text("body")],
        FormOptions::default()
            .with_mode(StoreMode::Controlled)
            .with_config(config)
            .with_document(json!({"title": "", "body": ""})),
    )
    .unwrap()
}

#[test]
fn test_commit_is_pending_until_host_acknowledges() {
    let mut form = controlled(FormConfig::default());
    let title = form.node_by_name("title").unwrap();

    form.on_change(title, json!("Draft")).unwrap();
    form.on_blur(title).unwrap();

    assert_eq!(form.data()["title"], json!("Draft"));
    assert_eq!(form.pending_patches().len(), 1);

    let rebase = form
        .set_document(json!({"title": "Draft", "body": ""}))
        .unwrap();
    assert_eq!(rebase.acknowledged, vec![title.index()]);
    assert!(form.pending_patches().is_empty());
    assert!(form.change_sender().is_err());
}

#[test]
fn test_host_edits_are_rebased_under_pending_patches() {
    let mut form = controlled(FormConfig::default());
    let title = form.node_by_name("title").unwrap();
    let body = form.node_by_name("body").unwrap();

    form.on_change(title, json!("Mine")).unwrap();
    form.on_blur(title).unwrap();

    // Host has not seen the title yet but changed the body
    let rebase = form
        .set_document(json!({"title": "", "body": "Theirs"}))
        .unwrap();
    assert_eq!(rebase.replayed, vec![title.index()]);
    assert_eq!(form.data(), &json!({"title": "Mine", "body": "Theirs"}));
    assert_eq!(form.field(body).unwrap().value, json!("Theirs"));
    assert_eq!(form.field(title).unwrap().value, json!("Mine"));
}

#[test]
fn test_second_commit_waits_for_apply() {
    let mut form = controlled(FormConfig::default());
    let title = form.node_by_name("title").unwrap();

    form.on_change(title, json!("One")).unwrap();
    form.on_blur(title).unwrap();
    form.on_change(title, json!("Two")).unwrap();
    form.on_blur(title).unwrap();

    // Waiting in the apply queue
    assert_eq!(form.data()["title"], json!("One"));
    assert!(form.field(title).unwrap().readonly);
    assert_eq!(form.next_deadline(), Some(ms(10)));

    form.set_document(json!({"title": "One", "body": ""})).unwrap();
    form.advance(ms(10)).unwrap();

    assert_eq!(form.data()["title"], json!("Two"));
    assert!(!form.field(title).unwrap().readonly);
    assert_eq!(form.stats().commits, 2);
}

#[test]
fn test_fresher_edit_supersedes_waiting_apply() {
    let mut form = controlled(FormConfig::default());
    let title = form.node_by_name("title").unwrap();

    form.on_change(title, json!("One")).unwrap();
    form.on_blur(title).unwrap();
    form.on_change(title, json!("Two")).unwrap();
    form.on_blur(title).unwrap();
    assert_eq!(form.next_deadline(), Some(ms(10)));

    // The waiting retry is dropped; a new debounce window starts
    form.on_change(title, json!("Three")).unwrap();
    assert_eq!(form.next_deadline(), Some(ms(300)));

    form.set_document(json!({"title": "One", "body": ""})).unwrap();
    form.advance(ms(300)).unwrap();
    assert_eq!(form.data()["title"], json!("Three"));
    assert_eq!(form.stats().commits, 2);
}

#[test]
fn test_apply_ceiling_commits_anyway() {
    let config = FormConfig {
        apply_max_attempts: 3,
        ..FormConfig::default()
    };
    let mut form = controlled(config);
    let title = form.node_by_name("title").unwrap();

    form.on_change(title, json!("One")).unwrap();
    form.on_blur(title).unwrap();
    form.on_change(title, json!("Two")).unwrap();
    form.on_blur(title).unwrap();

    // Host never answers: three retries, then the commit goes ahead
    form.advance(ms(20)).unwrap();
    assert_eq!(form.data()["title"], json!("One"));
    form.advance(ms(10)).unwrap();
    assert_eq!(form.data()["title"], json!("Two"));
    assert_eq!(form.pending_patches().len(), 2);
}

#[test]
fn test_other_fields_are_not_blocked() {
    let mut form = controlled(FormConfig::default());
    let title = form.node_by_name("title").unwrap();
    let body = form.node_by_name("body").unwrap();

    form.on_change(title, json!("One")).unwrap();
    form.on_blur(title).unwrap();
    form.on_change(body, json!("Text")).unwrap();
    form.on_blur(body).unwrap();

    assert_eq!(form.data(), &json!({"title": "One", "body": "Text"}));
    assert_eq!(form.pending_patches().len(), 2);
}
