//! Transport failures

use thiserror::Error;

/// Failure reported by a [`WooClient`](crate::WooClient) call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never produced an HTTP response
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The API answered with a structured error body
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// The response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the failure is about the response content rather than
    /// getting a response at all
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, TransportError::Decode(_))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = TransportError::Http {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(e.to_string(), "HTTP 503: unavailable");
        assert!(!e.is_malformed_response());
    }

    #[test]
    fn test_from_serde_error_is_decode() {
        let e: TransportError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(e.is_malformed_response());
    }
}
