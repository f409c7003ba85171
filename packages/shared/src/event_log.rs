//! Logging collaborator used by the dispatchers and supervisors.
//!
//! Protocol events (logins, logouts, failures) are reported through
//! [`EventLog`] so a front end can show them. Implementations must return
//! quickly; they are called from connection workers.

/// Sink for protocol event lines
pub trait EventLog: Send + Sync {
    /// Record a protocol event
    fn log_message(&self, text: &str);

    /// Record a failure
    fn log_error_message(&self, text: &str);
}

/// `EventLog` that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn log_message(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn log_error_message(&self, text: &str) {
        tracing::error!("{}", text);
    }
}
