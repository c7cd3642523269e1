pub mod conversations;
pub mod events;
pub mod health;
pub mod interests;
pub mod messages;
pub mod quota;
pub mod reactions;
pub mod receipts;

use actix_web::web;

use crate::error::AppError;
use crate::metrics;

/// Register every route plus JSON/query extractor error handling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(health::health)
    .route("/metrics", web::get().to(metrics::metrics_handler))
    .service(conversations::open_conversation)
    .service(conversations::typing)
    .service(conversations::conversation_receipts)
    .service(messages::send_message)
    .service(messages::list_messages)
    .service(messages::mark_read)
    .service(events::poll_events)
    .service(events::stream_events)
    .service(reactions::toggle_reaction)
    .service(reactions::list_reactions)
    .service(receipts::record_receipt)
    .service(interests::send_interest)
    .service(interests::respond_to_interest)
    .service(interests::get_interest)
    .service(interests::list_matches)
    .service(quota::quota_status);
}
