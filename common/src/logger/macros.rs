use std::time::Duration;

use tracing::{Level, Span, field};

use super::TraceId;

/// Create a root span for a round / dispatch tick / recovery action.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::span!(
        Level::INFO,
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        robot_id = field::Empty,
        task_id = field::Empty,
    )
}

/// Create a child span (inherits the parent's fields automatically).
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "child", name = %name)
}

/// Records identifying fields on the current span without forcing callers
/// to thread them through every tracing call.
pub fn annotate_span(robot_id: Option<&str>, task_id: Option<&uuid::Uuid>) {
    let span = Span::current();
    if let Some(r) = robot_id {
        span.record("robot_id", field::display(r));
    }
    if let Some(t) = task_id {
        span.record("task_id", field::display(t));
    }
}

/// Times `fut` and logs a warning if it exceeds `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
