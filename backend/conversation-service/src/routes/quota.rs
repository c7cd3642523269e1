use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::{error::AppError, middleware::guards::User, models::QuotaDecision, state::AppState};

#[derive(Debug, Serialize)]
pub struct QuotaStatusResponse {
    pub feature: String,
    #[serde(flatten)]
    pub decision: QuotaDecision,
}

/// GET /quota/{feature}
///
/// Read-only view of the caller's allowance. Nothing is consumed.
#[get("/quota/{feature}")]
pub async fn quota_status(
    state: web::Data<AppState>,
    user: User,
    feature: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let feature = feature.into_inner();
    let decision = state.chat.quota_status(user.id, &feature).await?;
    Ok(HttpResponse::Ok().json(QuotaStatusResponse { feature, decision }))
}
