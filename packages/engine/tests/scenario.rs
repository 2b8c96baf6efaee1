use formloom_descriptor::{FieldDescriptor, ValidationRules};
use formloom_engine::{Form, FormEvent, FormOptions, RuntimeState};
use serde_json::{json, Value};
use std::time::Duration;

fn signup() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::text("email").with_validation(ValidationRules::required()),
        FieldDescriptor::checkbox("agree"),
        FieldDescriptor::button("submit", "Submit"),
    ]
}

fn changes(events: &[FormEvent]) -> Vec<(Value, bool)> {
    events
        .iter()
        .filter_map(|event| match event {
            FormEvent::Change { document, initial } => Some((document.clone(), *initial)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_mount_synthesizes_document() {
    let mut form = Form::new(&signup(), FormOptions::default()).unwrap();

    assert_eq!(form.data(), &json!({"email": "", "agree": false}));
    assert_eq!(form.version(), 0);
    assert!(form.is_ready());
    assert!(!form.is_valid());

    let events = form.drain_events();
    assert!(events.contains(&FormEvent::Ready));
    // Email is required and empty, so there is no initial change
    assert!(changes(&events).is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        FormEvent::Invalidity { name, message, .. } if name == "email" && message == "required"
    )));
}

#[test]
fn test_empty_email_is_rejected() {
    let mut form = Form::new(&signup(), FormOptions::default()).unwrap();
    form.drain_events();
    let email = form.node_by_name("email").unwrap();

    form.on_focus(email).unwrap();
    form.on_change(email, json!("")).unwrap();
    form.on_blur(email).unwrap();

    let field = form.field(email).unwrap();
    assert_eq!(field.invalid.as_deref(), Some("required"));
    assert_eq!(field.state, RuntimeState::Idle);
    assert!(field.dirty);
    assert_eq!(form.version(), 0);
    assert_eq!(form.stats().rejected, 1);
    assert!(changes(&form.drain_events()).is_empty());
}

#[test]
fn test_valid_email_commits_once() {
    let mut form = Form::new(&signup(), FormOptions::default()).unwrap();
    form.drain_events();
    let email = form.node_by_name("email").unwrap();

    form.on_focus(email).unwrap();
    form.on_change(email, json!("ada@example.com")).unwrap();
    form.on_blur(email).unwrap();

    assert_eq!(form.data(), &json!({"email": "ada@example.com", "agree": false}));
    assert_eq!(form.version(), 1);
    assert!(form.is_valid());
    assert_eq!(
        changes(&form.drain_events()),
        vec![(json!({"email": "ada@example.com", "agree": false}), false)]
    );

    // Blurring again writes nothing
    form.on_blur(email).unwrap();
    assert!(form.drain_events().is_empty());
    assert_eq!(form.stats().commits, 1);
}

#[test]
fn test_rejected_email_then_valid_email() {
    let mut form = Form::new(&signup(), FormOptions::default()).unwrap();
    form.drain_events();
    let email = form.node_by_name("email").unwrap();

    form.on_focus(email).unwrap();
    form.on_change(email, json!("")).unwrap();
    form.on_blur(email).unwrap();
    assert_eq!(form.field(email).unwrap().invalid.as_deref(), Some("required"));
    assert!(changes(&form.drain_events()).is_empty());

    form.on_focus(email).unwrap();
    form.on_change(email, json!("a@b.com")).unwrap();
    form.on_blur(email).unwrap();

    let field = form.field(email).unwrap();
    assert_eq!(field.invalid, None);
    assert_eq!(field.state, RuntimeState::Idle);
    assert_eq!(form.version(), 1);
    assert!(form.is_valid());
    assert_eq!(
        changes(&form.drain_events()),
        vec![(json!({"email": "a@b.com", "agree": false}), false)]
    );
}

#[test]
fn test_clearing_required_field_keeps_document_value() {
    let mut form = Form::new(
        &signup(),
        FormOptions::default().with_document(json!({"email": "x@y.z"})),
    )
    .unwrap();
    form.drain_events();
    let email = form.node_by_name("email").unwrap();

    form.on_focus(email).unwrap();
    form.on_change(email, json!("")).unwrap();
    form.on_blur(email).unwrap();

    let field = form.field(email).unwrap();
    assert_eq!(field.value, json!(""));
    assert_eq!(field.invalid.as_deref(), Some("required"));
    assert_eq!(form.data(), &json!({"email": "x@y.z", "agree": false}));
    assert_eq!(form.version(), 0);
    assert!(!form.is_valid());
    assert_eq!(form.stats().rejected, 1);
    assert!(changes(&form.drain_events()).is_empty());
}

#[test]
fn test_checkbox_commits_without_debounce() {
    let mut form = Form::new(
        &signup(),
        FormOptions::default().with_document(json!({"email": "a@b.c"})),
    )
    .unwrap();
    let events = form.drain_events();
    assert_eq!(
        changes(&events),
        vec![(json!({"email": "a@b.c", "agree": false}), true)]
    );

    let agree = form.node_by_name("agree").unwrap();
    form.on_change(agree, json!(true)).unwrap();

    assert_eq!(form.data()["agree"], json!(true));
    assert_eq!(form.next_deadline(), None);
    assert_eq!(changes(&form.drain_events()).len(), 1);
}

#[test]
fn test_typing_waits_for_debounce_window() {
    let mut form = Form::new(&signup(), FormOptions::default()).unwrap();
    let email = form.node_by_name("email").unwrap();

    form.on_change(email, json!("a")).unwrap();
    assert_eq!(form.next_deadline(), Some(Duration::from_millis(300)));
    assert_eq!(form.field(email).unwrap().state, RuntimeState::Debouncing);

    form.advance(Duration::from_millis(299)).unwrap();
    assert_eq!(form.version(), 0);

    form.advance(Duration::from_millis(1)).unwrap();
    assert_eq!(form.version(), 1);
    assert_eq!(form.data()["email"], json!("a"));
}

#[test]
fn test_button_and_typography_not_editable() {
    let mut form = Form::new(
        &[
            FieldDescriptor::button("submit", "Submit"),
            FieldDescriptor::typography("Fill in the form"),
        ],
        FormOptions::default(),
    )
    .unwrap();

    let submit = form.node_by_name("submit").unwrap();
    assert!(form.on_change(submit, json!("x")).is_err());

    let hint = form.compiled().leaves()[1];
    assert!(form.on_change(hint, json!("x")).is_err());
    assert!(form.field(hint).unwrap().name.is_none());
}

#[test]
fn test_field_handle() {
    let mut form = Form::new(&signup(), FormOptions::default()).unwrap();
    {
        let mut email = form.field_by_name("email").unwrap();
        email.on_focus().unwrap();
        email.on_change(json!("h@x.io")).unwrap();
        email.on_blur().unwrap();
        assert_eq!(email.managed().unwrap().value, json!("h@x.io"));
    }
    assert_eq!(form.data()["email"], json!("h@x.io"));
    assert!(form.field_by_name("missing").is_err());
}
