use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::guards::User, models::ReceiptStatus, state::AppState};

#[derive(Debug, Deserialize)]
pub struct RecordReceiptRequest {
    pub message_id: Uuid,
    pub status: ReceiptStatus,
}

#[derive(Debug, Serialize)]
pub struct RecordReceiptResponse {
    pub receipt_id: String,
}

/// POST /receipts
#[post("/receipts")]
pub async fn record_receipt(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<RecordReceiptRequest>,
) -> Result<HttpResponse, AppError> {
    let receipt_id = state
        .chat
        .record_receipt(user.id, body.message_id, body.status)
        .await?;
    Ok(HttpResponse::Ok().json(RecordReceiptResponse { receipt_id }))
}
