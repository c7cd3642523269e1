use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError, middleware::guards::User, services::chat_service::TypingState,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub participant_id: Uuid,
}

/// POST /conversations
///
/// Returns the direct conversation between the caller and `participant_id`,
/// creating it on first use.
#[post("/conversations")]
pub async fn open_conversation(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<OpenConversationRequest>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .chat
        .conversations
        .open_direct(user.id, body.participant_id)
        .await?;
    Ok(HttpResponse::Ok().json(conversation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingStateDto {
    Start,
    Stop,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub state: TypingStateDto,
}

#[derive(Debug, Serialize)]
pub struct TypingResponse {
    /// False when a start was dropped by the per-user throttle
    pub published: bool,
}

/// POST /conversations/{id}/typing
#[post("/conversations/{id}/typing")]
pub async fn typing(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
    body: web::Json<TypingRequest>,
) -> Result<HttpResponse, AppError> {
    let typing_state = match body.state {
        TypingStateDto::Start => TypingState::Start,
        TypingStateDto::Stop => TypingState::Stop,
    };
    let event = state
        .chat
        .typing(user.id, conversation_id.into_inner(), typing_state)
        .await?;
    Ok(HttpResponse::Ok().json(TypingResponse {
        published: event.is_some(),
    }))
}

/// GET /conversations/{id}/receipts
#[get("/conversations/{id}/receipts")]
pub async fn conversation_receipts(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let receipts = state
        .chat
        .conversation_receipts(user.id, conversation_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(receipts))
}
