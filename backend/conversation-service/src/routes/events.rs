use std::convert::Infallible;
use std::time::Duration;

use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::guards::User,
    models::{now_millis, ConversationEvent, EventCursor, EventId},
    realtime::EventSubscription,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Epoch milliseconds cursor
    #[serde(default)]
    pub since: i64,
    #[serde(default)]
    pub inclusive: bool,
    /// Id of the last delivered event; resumes strictly after `(since, after_id)`
    pub after_id: Option<String>,
    pub limit: Option<usize>,
    /// How long to hold the request open when nothing is pending
    #[serde(default)]
    pub wait_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<ConversationEvent>,
    /// Cursor for the next poll
    pub next_since: i64,
    pub next_inclusive: bool,
    pub next_after_id: Option<EventId>,
}

/// GET /conversations/{id}/events?since=&inclusive=&after_id=&limit=&wait_ms=
#[get("/conversations/{id}/events")]
pub async fn poll_events(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse, AppError> {
    let q = query.into_inner();
    let wait = Duration::from_millis(q.wait_ms).min(state.config.events.long_poll_max_wait);
    let limit = q.limit.unwrap_or(state.config.events.max_batch);
    let cursor = EventCursor {
        since_ms: q.since,
        inclusive: q.inclusive,
        after_id: q.after_id.map(EventId::from_raw),
    };

    let events = state
        .chat
        .events_since(user.id, conversation_id.into_inner(), &cursor, limit, wait)
        .await?;

    let next = events.last().map(EventCursor::after).unwrap_or(cursor);
    Ok(HttpResponse::Ok().json(EventsResponse {
        events,
        next_since: next.since_ms,
        next_inclusive: next.inclusive,
        next_after_id: next.after_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Defaults to now: only events from this point on
    pub since: Option<i64>,
}

/// GET /conversations/{id}/events/stream
///
/// Server-sent events. Each batch is written as one `event:` frame per
/// conversation event; idle periods produce a comment frame so proxies keep
/// the connection open. Closing the connection drops the subscription.
#[get("/conversations/{id}/events/stream")]
pub async fn stream_events(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
    query: web::Query<StreamQuery>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = conversation_id.into_inner();
    state
        .chat
        .conversations
        .require_participant(conversation_id, user.id)
        .await?;

    let since = query
        .since
        .unwrap_or_else(|| now_millis().timestamp_millis());
    let subscription =
        EventSubscription::open(conversation_id, since, state.config.events.max_batch);
    let idle = state.config.events.stream_idle;

    tracing::info!(user_id = %user.id, conversation_id = %conversation_id, "event stream opened");

    let stream = futures::stream::unfold(
        (subscription, state.into_inner()),
        move |(mut subscription, state)| async move {
            match subscription.next_batch(&state.chat.events, idle).await {
                Ok(events) => {
                    let frame = encode_frames(&events);
                    Some((
                        Ok::<_, Infallible>(web::Bytes::from(frame)),
                        (subscription, state),
                    ))
                }
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %subscription.conversation_id(),
                        error = %e,
                        "event stream closed after fetch failure"
                    );
                    None
                }
            }
        },
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

fn encode_frames(events: &[ConversationEvent]) -> String {
    if events.is_empty() {
        return ": keep-alive\n\n".to_string();
    }
    let mut out = String::new();
    for event in events {
        match serde_json::to_string(event) {
            Ok(data) => {
                out.push_str(&format!(
                    "id: {}\nevent: {}\ndata: {}\n\n",
                    event.id,
                    event.kind.type_name(),
                    data
                ));
            }
            Err(e) => tracing::error!(event_id = %event.id, error = %e, "failed to encode event"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;

    #[test]
    fn frames_carry_id_type_and_json() {
        let event = ConversationEvent::new(
            Uuid::new_v4(),
            None,
            EventKind::TypingStop { at: now_millis() },
        );
        let frame = encode_frames(std::slice::from_ref(&event));
        assert!(frame.starts_with(&format!("id: {}\nevent: typing_stop\ndata: {{", event.id)));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn empty_batch_is_a_comment() {
        assert_eq!(encode_frames(&[]), ": keep-alive\n\n");
    }
}
