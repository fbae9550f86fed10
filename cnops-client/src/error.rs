//! Error types for the API client.

use thiserror::Error;

/// Errors that can occur when talking to the console API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API answered with a non-success status.
    #[error("API returned status {status}{}", message_suffix(.message))]
    Http { status: u16, message: Option<String> },

    /// Token missing or expired.
    #[error("Unauthorized (status {status})")]
    Unauthorized { status: u16 },

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Response body was not the expected JSON.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl ClientError {
    /// True when no usable response was received: every failure except a
    /// body that arrived but could not be parsed.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ClientError::Parse(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Http {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: Some(err.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_not_transport() {
        assert!(!ClientError::Parse("eof".to_string()).is_transport());
        assert!(ClientError::Timeout.is_transport());
        assert!(ClientError::Unauthorized { status: 401 }.is_transport());
    }

    #[test]
    fn test_http_display_includes_backend_message() {
        let err = ClientError::Http {
            status: 403,
            message: Some("admin only".to_string()),
        };
        assert_eq!(err.to_string(), "API returned status 403: admin only");

        let bare = ClientError::Http {
            status: 502,
            message: None,
        };
        assert_eq!(bare.to_string(), "API returned status 502");
    }
}
