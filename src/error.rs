//! Error types for the chat client coordination layer

use thiserror::Error;

/// Result type for client coordination operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client coordination layer
///
/// Only authentication failures and disconnects are promoted to public
/// events on the coordinator; everything else stays local to the operation
/// that produced it (a rejected send task, a logged recovery failure).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, handshake, connection drop)
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Authentication rejected by the server
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        /// Machine-readable reason from the server, when provided
        reason: Option<String>,
    },

    /// Gap recovery could not fetch missed history
    #[error("Recovery error: {message}")]
    Recovery { message: String },

    /// The send queue worker is gone; the task result can never settle
    #[error("Send queue closed")]
    SendQueueClosed,
}

impl ClientError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>, reason: Option<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            reason,
        }
    }

    /// Create a recovery error
    pub fn recovery(message: impl Into<String>) -> Self {
        Self::Recovery {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::transport("socket reset");
        assert_eq!(err.to_string(), "Transport error: socket reset");

        let err = ClientError::authentication("bad token", Some("401".to_string()));
        assert_eq!(err.to_string(), "Authentication failed: bad token");

        assert_eq!(ClientError::SendQueueClosed.to_string(), "Send queue closed");
    }

    #[test]
    fn test_authentication_reason_is_preserved() {
        match ClientError::authentication("bad token", Some("401".to_string())) {
            ClientError::Authentication { reason, .. } => {
                assert_eq!(reason.as_deref(), Some("401"));
            }
            other => panic!("expected Authentication, got {:?}", other),
        }
    }
}
