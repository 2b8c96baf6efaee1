use formloom_descriptor::{Compute, ComputeError, ComputeResult, Fallback, FieldDescriptor};
use formloom_engine::{Form, FormEvent, FormOptions};
use futures::channel::oneshot;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Senders = Arc<Mutex<Vec<oneshot::Sender<Result<Value, ComputeError>>>>>;

/// Compute whose results are delivered by hand, in any order
fn deferred(senders: &Senders) -> Compute {
    let senders = Arc::clone(senders);
    Compute::new(move |_, _| {
        let (tx, rx) = oneshot::channel();
        senders.lock().unwrap().push(tx);
        ComputeResult::pending(async move { rx.await.unwrap_or(Err(ComputeError::Canceled)) })
    })
}

fn ready_count(events: &[FormEvent]) -> usize {
    events.iter().filter(|e| **e == FormEvent::Ready).count()
}

#[test]
fn test_deep_tree_ready_once() {
    let mut form = Form::new(
        &[
            FieldDescriptor::text("a"),
            FieldDescriptor::group(vec![
                FieldDescriptor::paper(vec![
                    FieldDescriptor::fragment(vec![FieldDescriptor::text("b")]),
                    FieldDescriptor::expansion("Empty", vec![]),
                ]),
                FieldDescriptor::condition(FieldDescriptor::checkbox("c")),
                FieldDescriptor::typography("note"),
            ]),
        ],
        FormOptions::default(),
    )
    .unwrap();

    assert!(form.is_ready());
    let events = form.drain_events();
    assert_eq!(ready_count(&events), 1);

    let a = form.node_by_name("a").unwrap();
    form.on_change(a, json!("x")).unwrap();
    form.on_blur(a).unwrap();
    assert_eq!(ready_count(&form.drain_events()), 0);
}

#[test]
fn test_ready_waits_for_async_computes() {
    let senders = Senders::default();
    let mut form = Form::new(
        &[
            FieldDescriptor::text("name"),
            FieldDescriptor::group(vec![
                FieldDescriptor::text("rate").with_compute(deferred(&senders)),
                FieldDescriptor::text("quote").with_compute(deferred(&senders)),
            ]),
        ],
        FormOptions::default(),
    )
    .unwrap();

    assert!(!form.is_ready());
    assert_eq!(form.pending_computes(), 2);
    let rate = form.node_by_name("rate").unwrap();
    assert!(form.field(rate).unwrap().loading);

    let mut pending = std::mem::take(&mut *senders.lock().unwrap());
    let quote_tx = pending.pop().unwrap();
    let rate_tx = pending.pop().unwrap();

    // Resolve out of declaration order
    quote_tx.send(Ok(json!("42"))).unwrap();
    assert_eq!(form.pump().unwrap(), 1);
    assert!(!form.is_ready());

    rate_tx.send(Ok(json!("1.5"))).unwrap();
    form.pump().unwrap();
    assert!(form.is_ready());
    assert_eq!(form.field(rate).unwrap().value, json!("1.5"));
    assert!(!form.field(rate).unwrap().loading);

    let events = form.drain_events();
    assert_eq!(ready_count(&events), 1);
    assert!(events.contains(&FormEvent::Change {
        document: json!({"name": ""}),
        initial: true
    }));
}

#[test]
fn test_rejected_compute_still_counts_and_reaches_fallback() {
    let senders = Senders::default();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&failures);

    let mut form = Form::new(
        &[FieldDescriptor::text("rate")
            .with_compute(deferred(&senders))
            .with_fallback(Fallback::new(move |error| {
                seen.lock().unwrap().push(error.to_string())
            }))],
        FormOptions::default(),
    )
    .unwrap();

    let tx = senders.lock().unwrap().pop().unwrap();
    tx.send(Err(ComputeError::from("rate service down"))).unwrap();
    form.pump().unwrap();

    assert!(form.is_ready());
    assert_eq!(
        *failures.lock().unwrap(),
        vec!["Compute rejected: rate service down".to_string()]
    );
}

#[test]
fn test_form_level_fallback() {
    let senders = Senders::default();
    let failures = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&failures);

    let mut form = Form::new(
        &[FieldDescriptor::text("rate").with_compute(deferred(&senders))],
        FormOptions::default().with_fallback(Fallback::new(move |_| *seen.lock().unwrap() += 1)),
    )
    .unwrap();

    // Dropping the sender cancels the compute
    senders.lock().unwrap().clear();
    form.pump().unwrap();
    assert_eq!(*failures.lock().unwrap(), 1);
    assert!(form.is_ready());
}

#[test]
fn test_stale_compute_result_is_ignored() {
    let senders = Senders::default();
    let mut form = Form::new(
        &[
            FieldDescriptor::text("city"),
            FieldDescriptor::text("weather").with_compute(deferred(&senders)),
        ],
        FormOptions::default(),
    )
    .unwrap();
    let city = form.node_by_name("city").unwrap();
    let weather = form.node_by_name("weather").unwrap();

    form.on_change(city, json!("Oslo")).unwrap();
    form.on_blur(city).unwrap();

    let mut pending = std::mem::take(&mut *senders.lock().unwrap());
    assert_eq!(pending.len(), 2);
    let fresh = pending.pop().unwrap();
    let stale = pending.pop().unwrap();

    fresh.send(Ok(json!("snow"))).unwrap();
    form.pump().unwrap();
    stale.send(Ok(json!("sun"))).unwrap();
    form.pump().unwrap();

    assert_eq!(form.field(weather).unwrap().value, json!("snow"));
}

#[test]
fn test_results_after_unmount_are_dropped() {
    let senders = Senders::default();
    let mut form = Form::new(
        &[FieldDescriptor::text("rate").with_compute(deferred(&senders))],
        FormOptions::default(),
    )
    .unwrap();
    let rate = form.node_by_name("rate").unwrap();

    form.unmount();
    let tx = senders.lock().unwrap().pop().unwrap();
    tx.send(Ok(json!("late"))).unwrap();
    assert_eq!(form.pump().unwrap(), 1);

    assert!(!form.is_ready());
    assert_ne!(form.field(rate).unwrap().value, json!("late"));
    assert_eq!(ready_count(&form.drain_events()), 0);
}

#[test]
fn test_hidden_compute_reports_immediately() {
    let senders = Senders::default();
    let form = Form::new(
        &[FieldDescriptor::text("rate")
            .with_compute(deferred(&senders))
            .with_hidden(true)],
        FormOptions::default(),
    )
    .unwrap();
    assert!(form.is_ready());
}
