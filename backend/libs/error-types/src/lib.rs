use serde::{Deserialize, Serialize};

/// Uniform JSON error body returned by every HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable status text ("Not Found", "Conflict", ...)
    pub error: String,

    /// User facing explanation
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error category used by clients for routing, see [`error_types`]
    pub error_type: String,

    /// Stable machine readable code, see [`error_codes`]
    pub code: String,

    /// Structured context (e.g. quota limit and reset time)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Request id for log correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            details: None,
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// Stable error codes
pub mod error_codes {
    // Authentication
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const NOT_CONVERSATION_PARTICIPANT: &str = "NOT_CONVERSATION_PARTICIPANT";

    // Conversations
    pub const CONVERSATION_NOT_FOUND: &str = "CONVERSATION_NOT_FOUND";
    pub const MESSAGE_NOT_FOUND: &str = "MESSAGE_NOT_FOUND";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";

    // Quota
    pub const QUOTA_EXCEEDED: &str = "QUOTA_EXCEEDED";

    // Interests / matches
    pub const INTEREST_ALREADY_RESOLVED: &str = "INTEREST_ALREADY_RESOLVED";
    pub const CONFLICT: &str = "CONFLICT";

    // Validation
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

    // Database/System
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Error categories
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const QUOTA_ERROR: &str = "quota_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "Not Found",
            "message not found",
            404,
            error_types::NOT_FOUND_ERROR,
            error_codes::MESSAGE_NOT_FOUND,
        );

        assert_eq!(error.status, 404);
        assert_eq!(error.error_type, error_types::NOT_FOUND_ERROR);
        assert_eq!(error.code, error_codes::MESSAGE_NOT_FOUND);
        assert!(error.details.is_none());
    }

    #[test]
    fn test_error_response_details_are_serialized() {
        let error = ErrorResponse::new(
            "Forbidden",
            "quota exceeded",
            403,
            error_types::QUOTA_ERROR,
            error_codes::QUOTA_EXCEEDED,
        )
        .with_details(serde_json::json!({ "limit": 5, "remaining": 0 }));

        let body = serde_json::to_value(&error).unwrap();
        assert_eq!(body["details"]["limit"], 5);
        assert!(body.get("trace_id").is_none());
    }
}
