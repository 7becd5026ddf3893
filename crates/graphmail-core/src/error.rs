//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Tenant id, client id or client secret is missing.
    #[error("Mail service is not configured: tenant id, client id and client secret are required")]
    NotConfigured,

    /// Token acquisition or authorization failed.
    #[error("Authentication error: {0}")]
    Auth(#[from] graphmail_oauth::Error),

    /// Graph rejected the message or could not be reached.
    #[error("Send failed{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    SendFailed {
        /// HTTP status, absent for transport errors.
        status: Option<u16>,
        /// Upstream error message or response body.
        message: String,
    },

    /// No sender address on the message and none configured.
    #[error("A sender address is required")]
    MissingSender,

    /// The message has no `to` recipients.
    #[error("At least one recipient is required")]
    NoRecipients,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Token store could not be opened.
    #[error("Token store error: {0}")]
    Store(#[from] graphmail_oauth::StoreError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_failed_display() {
        let with_status = Error::SendFailed {
            status: Some(403),
            message: "Access is denied.".into(),
        };
        assert_eq!(with_status.to_string(), "Send failed (HTTP 403): Access is denied.");

        let transport = Error::SendFailed {
            status: None,
            message: "timed out".into(),
        };
        assert_eq!(transport.to_string(), "Send failed: timed out");
    }
}
