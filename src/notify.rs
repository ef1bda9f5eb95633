//! User-facing error notification seam.
//!
//! The pipeline hands terminal failures to a [`Notifier`]; how they are
//! shown (toast, banner, log line) belongs to the embedding application.

use tracing::warn;

use crate::error::ApiError;

/// Receives terminal failures that the caller did not suppress.
pub trait Notifier: Send + Sync {
    fn notify(&self, error: &ApiError);
}

/// Default notifier: records the user message in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, error: &ApiError) {
        warn!(
            kind = %error.kind,
            status = ?error.status,
            detail = %error.detail,
            "{}",
            error.user_message
        );
    }
}
