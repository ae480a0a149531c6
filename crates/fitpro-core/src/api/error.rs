use thiserror::Error;

/// Errors surfaced by the API clients and the session controller.
///
/// `Clone` so a single in-flight request can hand the same failure to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Course {course_id} was queued by the server (status {status})")]
    Pending { course_id: String, status: u16 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Substrings that mark a failure as an authentication problem
const AUTH_MARKERS: [&str; 4] = ["401", "unauthorized", "token", "expired"];

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build a `Server` error from a non-OK response.
    ///
    /// The backend reports failures as `{"message": "..."}`; anything else is
    /// kept as raw text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());

        let message = if message.is_empty() {
            format!("HTTP {}", status)
        } else {
            Self::truncate_body(&message)
        };

        ApiError::Server { status, message }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Auth {
            status: 401,
            message: message.into(),
        }
    }

    /// HTTP status attached to this error, when one is known
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Pending { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server accepted the operation into its queue
    pub fn is_pending(&self) -> bool {
        matches!(self, ApiError::Pending { .. })
    }

    /// Whether this failure means the stored token can no longer be used.
    ///
    /// Connectivity failures never count: the token may still be valid once
    /// the network comes back.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ApiError::Auth { .. } => true,
            ApiError::Server { status: 400 | 401, .. } => true,
            ApiError::Timeout | ApiError::Network(_) | ApiError::Pending { .. } => false,
            other => {
                let text = other.to_string().to_lowercase();
                AUTH_MARKERS.iter().any(|marker| text.contains(marker))
            }
        }
    }

    /// Short message suitable for showing to a user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Auth { .. } => "Session expired. Please log in again.".to_string(),
            ApiError::Server { message, .. } => message.clone(),
            ApiError::Timeout => "Connection timed out. Please try again.".to_string(),
            ApiError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::Pending { .. } => {
                "The course was queued and will appear in your profile shortly.".to_string()
            }
            ApiError::InvalidResponse(_) => "Unexpected response from server.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_uses_message_field() {
        let err = ApiError::from_status(400, r#"{"message":"Пользователь уже существует"}"#);
        assert_eq!(
            err,
            ApiError::Server {
                status: 400,
                message: "Пользователь уже существует".to_string()
            }
        );
    }

    #[test]
    fn test_from_status_plain_text_and_empty() {
        assert_eq!(
            ApiError::from_status(502, "Bad Gateway\n").to_string(),
            "Server error (502): Bad Gateway"
        );
        assert_eq!(ApiError::from_status(503, "").status(), Some(503));
        assert!(ApiError::from_status(503, "").to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_from_status_truncates_long_body() {
        let body = "x".repeat(2000);
        let ApiError::Server { message, .. } = ApiError::from_status(500, &body) else {
            panic!("expected server error");
        };
        assert!(message.contains("truncated, 2000 total bytes"));
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(ApiError::unauthorized("expired").is_auth_failure());
        assert!(ApiError::from_status(401, "").is_auth_failure());
        assert!(ApiError::from_status(400, "").is_auth_failure());
        assert!(ApiError::InvalidResponse("token missing".into()).is_auth_failure());
        assert!(!ApiError::from_status(500, "boom").is_auth_failure());
        assert!(!ApiError::Network("invalid token in proxy".into()).is_auth_failure());
        assert!(!ApiError::Timeout.is_auth_failure());
    }

    #[test]
    fn test_pending() {
        let err = ApiError::Pending {
            course_id: "ab1c3f".into(),
            status: 500,
        };
        assert!(err.is_pending());
        assert_eq!(err.status(), Some(500));
        assert!(!ApiError::Timeout.is_pending());
    }
}
