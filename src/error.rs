// Console errors. Every failure here is local and recoverable by the operator:
// nothing is retried automatically and nothing escalates to a crash.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleError {
    /// Blocked before any request was issued ("select a donation first")
    Validation(String),

    /// The session's role may not perform the action
    Forbidden(String),

    /// Backend answered with a non-success status
    Server { status: u16, message: String },

    /// Request never completed (connect, timeout, TLS...)
    Transport(String),

    /// Success status, but the body did not match the contract
    Decode(String),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    pub fn validation(message: impl Into<String>) -> Self {
        ConsoleError::Validation(message.into())
    }

    /// Text to show the operator, verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Validation(msg) | ConsoleError::Forbidden(msg) => msg.clone(),
            ConsoleError::Server { message, .. } => message.clone(),
            ConsoleError::Transport(_) => "Network error: could not reach the server".to_string(),
            ConsoleError::Decode(_) => "Unexpected response from the server".to_string(),
        }
    }

    /// True when no request left the client.
    pub fn is_local(&self) -> bool {
        matches!(self, ConsoleError::Validation(_) | ConsoleError::Forbidden(_))
    }
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Validation(msg) => write!(f, "validation failed: {msg}"),
            ConsoleError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            ConsoleError::Server { status, message } => write!(f, "server error {status}: {message}"),
            ConsoleError::Transport(msg) => write!(f, "transport error: {msg}"),
            ConsoleError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

/// Pull the operator-facing message out of an error body.
///
/// Order: `detailedMessage`, `message`, `error`, then a body that is itself a
/// JSON string, then `fallback`. Blank fields are skipped.
pub fn extract_server_message(body: &str, fallback: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    match parsed {
        Some(Value::Object(map)) => ["detailedMessage", "message", "error"]
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(|value| value.as_str())
            .map(str::trim)
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
        Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detailed_message_wins() {
        let body = r#"{"detailedMessage":"Donation 7 already claimed","message":"Conflict","error":"Bad Request"}"#;
        assert_eq!(extract_server_message(body, "Failed"), "Donation 7 already claimed");
    }

    #[test]
    fn test_falls_through_blank_fields() {
        let body = r#"{"detailedMessage":"  ","message":null,"error":"Bad Request"}"#;
        assert_eq!(extract_server_message(body, "Failed"), "Bad Request");
    }

    #[test]
    fn test_bare_string_body() {
        assert_eq!(extract_server_message(r#""Staff not found""#, "Failed"), "Staff not found");
    }

    #[test]
    fn test_unparseable_body_uses_fallback() {
        assert_eq!(
            extract_server_message("<html>502 Bad Gateway</html>", "Failed to claim transaction"),
            "Failed to claim transaction"
        );
        assert_eq!(extract_server_message("{}", "Failed"), "Failed");
    }

    #[test]
    fn test_user_message_hides_transport_detail() {
        let err = ConsoleError::Transport("tcp connect error: 10.0.0.1:8080".to_string());
        assert_eq!(err.user_message(), "Network error: could not reach the server");
        assert!(!err.is_local());
        assert!(ConsoleError::validation("Please select a donation").is_local());
    }
}
