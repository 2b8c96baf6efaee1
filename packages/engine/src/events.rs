use serde::Serialize;
use serde_json::Value;

/// Notifications for the hosting application, drained with
/// [`Form::drain_events`](crate::Form::drain_events)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FormEvent {
    /// The document changed and every visible field is valid
    Change { document: Value, initial: bool },

    /// Every initially visible stateful field resolved its first value
    Ready,

    /// A field became invalid
    Invalidity {
        name: String,
        message: String,
        payload: Value,
    },
}

/// Counters for hosts and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStats {
    /// Commits that produced a new document version
    pub commits: u64,

    /// Commits withheld by a blocking validation message
    pub rejected: u64,

    /// Flushes skipped by the feedback-loop guard
    pub skipped_flushes: u64,

    /// Flushes that found nothing to write
    pub unchanged: u64,
}
