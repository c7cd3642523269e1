//! Authentication extractor enforcing identity at the type level.
//! A handler taking [`User`] cannot run for an unauthenticated request.

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::verify_token;
use crate::state::AppState;

/// Represents an authenticated user extracted from JWT claims
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
}

impl User {
    /// Reject request bodies that name someone other than the caller.
    pub fn ensure_is(&self, claimed: Uuid) -> Result<(), AppError> {
        if claimed != self.id {
            tracing::warn!(
                security_event = "identity_mismatch",
                user_id = %self.id,
                claimed = %claimed,
                "request body names a different user"
            );
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

impl FromRequest for User {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<User, AppError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        tracing::error!("AppState missing from app data");
        AppError::Internal
    })?;

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(token, &state.config.jwt_secret)?;
    let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(User { id })
}
