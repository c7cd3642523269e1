use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::guards::User,
    models::{Interest, InterestStatus, QuotaDecision},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SendInterestRequest {
    pub to_user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SendInterestResponse {
    pub interest: Interest,
    pub quota: QuotaDecision,
}

/// POST /interests
#[post("/interests")]
pub async fn send_interest(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SendInterestRequest>,
) -> Result<HttpResponse, AppError> {
    let (interest, quota) = state
        .interests
        .send_interest(user.id, body.to_user_id)
        .await?;
    Ok(HttpResponse::Created().json(SendInterestResponse { interest, quota }))
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub interest_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub status: InterestStatus,
}

/// POST /interests/respond
///
/// Accepting creates the match and opens the direct conversation.
#[post("/interests/respond")]
pub async fn respond_to_interest(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<RespondRequest>,
) -> Result<HttpResponse, AppError> {
    let interest = state
        .interests
        .respond(user.id, body.interest_id, &body.status)
        .await?;
    Ok(HttpResponse::Ok().json(RespondResponse {
        status: interest.status,
    }))
}

/// GET /interests/{id}
#[get("/interests/{id}")]
pub async fn get_interest(
    state: web::Data<AppState>,
    user: User,
    interest_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let interest = state
        .interests
        .get_interest(user.id, interest_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(interest))
}

/// GET /matches
#[get("/matches")]
pub async fn list_matches(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let matches = state.interests.matches().matches_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(matches))
}
