use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::guards::User,
    models::{Message, MessageContent, MessageKind, QuotaDecision},
    services::chat_service::SendMessage,
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    #[serde(rename = "type")]
    pub message_type: String,
    #[validate(length(min = 1, max = 4000))]
    pub text: Option<String>,
    #[validate(length(min = 1, max = 512))]
    pub audio_storage_id: Option<String>,
    pub duration_ms: Option<u32>,
    #[validate(length(min = 1, max = 512))]
    pub image_storage_id: Option<String>,
}

impl SendMessageRequest {
    fn into_command(self) -> Result<SendMessage, AppError> {
        let required = |value: Option<String>, field: &str| {
            value.ok_or_else(|| {
                AppError::BadRequest(format!(
                    "{field} is required for {} messages",
                    self.message_type
                ))
            })
        };
        let content = match MessageKind::parse(&self.message_type) {
            Some(MessageKind::Text) => MessageContent::Text {
                text: required(self.text.clone(), "text")?,
            },
            Some(MessageKind::Voice) => MessageContent::Voice {
                audio_storage_id: required(self.audio_storage_id.clone(), "audio_storage_id")?,
                duration_ms: self.duration_ms,
            },
            Some(MessageKind::Image) => MessageContent::Image {
                image_storage_id: required(self.image_storage_id.clone(), "image_storage_id")?,
                text: self.text.clone(),
            },
            None => {
                return Err(AppError::BadRequest(format!(
                    "unsupported message type '{}'",
                    self.message_type
                )))
            }
        };
        Ok(SendMessage {
            conversation_id: self.conversation_id,
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            content,
        })
    }
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    #[serde(flatten)]
    pub message: Message,
    pub quota: QuotaDecision,
}

/// POST /messages
#[post("/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    body.validate()?;

    let (message, quota) = state.chat.send_message(user.id, body.into_command()?).await?;
    Ok(HttpResponse::Created().json(SendMessageResponse { message, quota }))
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub conversation_id: Uuid,
    pub limit: Option<usize>,
    /// Epoch milliseconds; only messages created strictly earlier are returned
    pub before: Option<i64>,
}

/// GET /messages?conversation_id=&limit=&before=
#[get("/messages")]
pub async fn list_messages(
    state: web::Data<AppState>,
    user: User,
    query: web::Query<ListMessagesQuery>,
) -> Result<HttpResponse, AppError> {
    let q = query.into_inner();
    let messages = state
        .chat
        .list_messages(user.id, q.conversation_id, q.limit, q.before)
        .await?;
    Ok(HttpResponse::Ok().json(messages))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub conversation_id: Uuid,
    /// Defaults to the caller
    pub user_id: Option<Uuid>,
}

/// POST /messages/read
#[post("/messages/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<MarkReadRequest>,
) -> Result<HttpResponse, AppError> {
    if let Some(claimed) = body.user_id {
        user.ensure_is(claimed)?;
    }
    let outcome = state.chat.mark_read(user.id, body.conversation_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
