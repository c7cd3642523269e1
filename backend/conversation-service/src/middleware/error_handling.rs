use crate::error::AppError;
use actix_web::{http::StatusCode, HttpResponse};
use ::error_types::{error_codes, error_types as error_kinds, ErrorResponse};
use serde_json::json;

/// Map domain errors to HTTP responses
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::BadRequest(_) => (error_kinds::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
        AppError::Unauthorized => (error_kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_INVALID),
        AppError::Forbidden => (
            error_kinds::AUTHORIZATION_ERROR,
            error_codes::NOT_CONVERSATION_PARTICIPANT,
        ),
        AppError::NotFound("conversation") => {
            (error_kinds::NOT_FOUND_ERROR, error_codes::CONVERSATION_NOT_FOUND)
        }
        AppError::NotFound("message") => {
            (error_kinds::NOT_FOUND_ERROR, error_codes::MESSAGE_NOT_FOUND)
        }
        AppError::NotFound(_) => (error_kinds::NOT_FOUND_ERROR, error_codes::RESOURCE_NOT_FOUND),
        AppError::Conflict(_) => (error_kinds::CONFLICT_ERROR, error_codes::CONFLICT),
        AppError::QuotaExceeded { .. } => (error_kinds::QUOTA_ERROR, error_codes::QUOTA_EXCEEDED),
        AppError::TransientStore(_) => (
            error_kinds::SERVICE_UNAVAILABLE_ERROR,
            error_codes::STORE_UNAVAILABLE,
        ),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
            (error_kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
        }
    };

    // Store failures carry driver text that should not reach clients.
    let message = match err {
        AppError::TransientStore(_) => "storage temporarily unavailable, retry later".to_string(),
        other => other.to_string(),
    };

    let mut response = ErrorResponse::new(
        status.canonical_reason().unwrap_or("Error"),
        &message,
        status.as_u16(),
        error_type,
        code,
    );

    match err {
        AppError::QuotaExceeded { feature, decision } => {
            response = response.with_details(json!({
                "feature": feature,
                "limit": decision.limit,
                "used": decision.used,
                "remaining": decision.remaining,
                "reset_at": decision.reset_at,
            }));
        }
        AppError::TransientStore(_) => {
            response = response.with_details(json!({ "retryable": true }));
        }
        _ => {}
    }

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    HttpResponse::build(status).json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuotaDecision;

    #[test]
    fn quota_denial_carries_limit_details() {
        let err = AppError::QuotaExceeded {
            feature: "message_sent".into(),
            decision: QuotaDecision::new(false, 5, 5, None),
        };
        let (status, body) = map_error(&err);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error_type, error_kinds::QUOTA_ERROR);
        assert_eq!(body.code, error_codes::QUOTA_EXCEEDED);
        let details = body.details.unwrap();
        assert_eq!(details["used"], 5);
        assert_eq!(details["limit"], 5);
        assert_eq!(details["remaining"], 0);
    }

    #[test]
    fn store_failures_hide_driver_text() {
        let (status, body) = map_error(&AppError::TransientStore("connection reset by peer".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.message.contains("connection reset"));
        assert_eq!(body.details.unwrap()["retryable"], true);
    }

    #[test]
    fn not_found_codes_follow_resource() {
        let (_, body) = map_error(&AppError::NotFound("conversation"));
        assert_eq!(body.code, error_codes::CONVERSATION_NOT_FOUND);
        let (_, body) = map_error(&AppError::NotFound("interest"));
        assert_eq!(body.code, error_codes::RESOURCE_NOT_FOUND);
    }
}
