use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{error::AppError, middleware::guards::User, models::ToggleOutcome, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct ToggleReactionRequest {
    pub message_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub emoji: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ToggleReactionResponse {
    On { toggled_on: bool },
    Off { toggled_off: bool },
}

impl From<ToggleOutcome> for ToggleReactionResponse {
    fn from(outcome: ToggleOutcome) -> Self {
        match outcome {
            ToggleOutcome::On => Self::On { toggled_on: true },
            ToggleOutcome::Off => Self::Off { toggled_off: true },
        }
    }
}

/// POST /reactions
///
/// Adds the caller's reaction, or removes it when already present.
#[post("/reactions")]
pub async fn toggle_reaction(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<ToggleReactionRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let outcome = state
        .reactions
        .toggle(body.message_id, user.id, &body.emoji)
        .await?;
    Ok(HttpResponse::Ok().json(ToggleReactionResponse::from(outcome)))
}

/// GET /messages/{id}/reactions
#[get("/messages/{id}/reactions")]
pub async fn list_reactions(
    state: web::Data<AppState>,
    user: User,
    message_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let reactions = state
        .reactions
        .reactions_for_message(message_id.into_inner(), user.id)
        .await?;
    Ok(HttpResponse::Ok().json(reactions))
}
