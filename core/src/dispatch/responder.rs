//! Outbound notification sink.

use std::time::Duration;

/// Result of a request or a lifecycle transition, reported to the external
/// requester. Every inbound request yields exactly one admission report;
/// running effects additionally produce pause/resume/finish reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectReport {
    /// Instantaneous effect applied and already complete.
    AppliedInstant,

    /// Timed effect started for the given duration.
    AppliedFor(Duration),

    /// Unknown effect id; nothing the caller can do with this request.
    NotAppliedUnavailable,

    /// The start action itself failed.
    NotAppliedFailed(String),

    /// The command ran cleanly but verification observed no state change.
    NotVerified,

    /// Preconditions not met right now; retry after caller-side changes.
    NotAppliedRetry,

    /// Temporarily blocked (duplicate or mutex conflict); retry after the
    /// given wait.
    NotAppliedWait(Duration),

    DurationPaused(Duration),
    DurationResumed(Duration),
    DurationFinished,
}

/// External-notification sink, implemented by the excluded transport layer.
/// Calls are fire-and-forget; implementations log their own failures.
pub trait Responder: Send + Sync {
    fn report(&self, effect_id: &str, report: EffectReport);

    fn set_listed(&self, effect_id: &str, listed: bool);

    fn set_selectable(&self, effect_id: &str, selectable: bool);
}
