//! User-facing messages.

/// Receives messages meant for the person driving the editor.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Writes user-facing messages to the log. Used when the host does not
/// supply its own notifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        log::error!("[op=notify] USER_ERROR message={}", message);
    }
}
