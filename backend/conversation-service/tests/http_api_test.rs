/// HTTP surface: auth, status codes, and response bodies.
mod common;

use actix_web::{http::StatusCode, test, web, App};
use conversation_service::routes;
use serde_json::{json, Value};
use uuid::Uuid;

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($ctx.state.clone()))
                .configure(routes::configure),
        )
        .await
    };
}

fn send_body(conversation_id: Uuid, from: Uuid, to: Uuid, text: &str) -> Value {
    json!({
        "conversation_id": conversation_id,
        "from_user_id": from,
        "to_user_id": to,
        "type": "text",
        "text": text,
    })
}

#[actix_web::test]
async fn health_is_public() {
    let ctx = common::context();
    let app = app!(ctx);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let ctx = common::context();
    let app = app!(ctx);
    let req = test::TestRequest::get()
        .uri(&format!("/messages?conversation_id={}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn send_returns_created_message_with_quota() {
    let ctx = common::context();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = common::open_conversation(&ctx.state, alice, bob).await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/messages")
        .insert_header(common::bearer(alice))
        .set_json(send_body(conversation.id, alice, bob, "hello"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["type"], "text");
    assert_eq!(body["text"], "hello");
    assert!(body["read_at"].is_null());
    assert_eq!(body["quota"]["used"], 1);
    assert_eq!(body["quota"]["remaining"], 4);
}

#[actix_web::test]
async fn quota_denial_is_forbidden_with_details() {
    let ctx = common::context();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = common::open_conversation(&ctx.state, alice, bob).await;
    let app = app!(ctx);

    for i in 0..5 {
        let req = test::TestRequest::post()
            .uri("/messages")
            .insert_header(common::bearer(alice))
            .set_json(send_body(conversation.id, alice, bob, &format!("m{i}")))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::post()
        .uri("/messages")
        .insert_header(common::bearer(alice))
        .set_json(send_body(conversation.id, alice, bob, "over"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["details"]["feature"], "message_sent");
    assert_eq!(body["details"]["limit"], 5);
    assert_eq!(body["details"]["used"], 5);
    assert_eq!(body["details"]["remaining"], 0);
}

#[actix_web::test]
async fn non_participant_is_forbidden() {
    let ctx = common::context();
    let (alice, bob, eve) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let conversation = common::open_conversation(&ctx.state, alice, bob).await;
    let app = app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!("/messages?conversation_id={}", conversation.id))
        .insert_header(common::bearer(eve))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri(&format!("/conversations/{}/events", conversation.id))
        .insert_header(common::bearer(eve))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn mark_read_for_someone_else_is_forbidden() {
    let ctx = common::context();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = common::open_conversation(&ctx.state, alice, bob).await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/messages/read")
        .insert_header(common::bearer(alice))
        .set_json(json!({ "conversation_id": conversation.id, "user_id": bob }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_body_uses_error_envelope() {
    let ctx = common::context();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/messages")
        .insert_header(common::bearer(Uuid::new_v4()))
        .set_json(json!({ "conversation_id": "not-a-uuid" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["code"].is_string());
}

#[actix_web::test]
async fn events_poll_returns_batch_and_cursor() {
    let ctx = common::context();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = common::open_conversation(&ctx.state, alice, bob).await;
    ctx.state
        .chat
        .send_message(alice, common::text(&conversation, alice, bob, "hi"))
        .await
        .unwrap();
    let app = app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/conversations/{}/events?since=0&inclusive=true",
            conversation.id
        ))
        .insert_header(common::bearer(bob))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "message_sent");
    assert_eq!(body["next_inclusive"], false);
    assert!(body["next_since"].as_i64().unwrap() > 0);
    assert_eq!(body["next_after_id"], events[0]["id"]);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/conversations/{}/events?since={}&after_id={}",
            conversation.id,
            body["next_since"],
            body["next_after_id"].as_str().unwrap()
        ))
        .insert_header(common::bearer(bob))
        .to_request();
    let next: Value = test::call_and_read_body_json(&app, req).await;
    assert!(next["events"].as_array().unwrap().is_empty());
    assert_eq!(next["next_after_id"], body["next_after_id"]);
}

#[actix_web::test]
async fn reaction_endpoint_toggles() {
    let ctx = common::context();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = common::open_conversation(&ctx.state, alice, bob).await;
    let (message, _) = ctx
        .state
        .chat
        .send_message(alice, common::text(&conversation, alice, bob, "hi"))
        .await
        .unwrap();
    let app = app!(ctx);

    let toggle = || {
        test::TestRequest::post()
            .uri("/reactions")
            .insert_header(common::bearer(bob))
            .set_json(json!({ "message_id": message.id, "emoji": "😂" }))
            .to_request()
    };

    let first: Value = test::call_and_read_body_json(&app, toggle()).await;
    assert_eq!(first, json!({ "toggled_on": true }));
    let second: Value = test::call_and_read_body_json(&app, toggle()).await;
    assert_eq!(second, json!({ "toggled_off": true }));

    let req = test::TestRequest::post()
        .uri("/reactions")
        .insert_header(common::bearer(bob))
        .set_json(json!({ "message_id": Uuid::new_v4(), "emoji": "😂" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn interest_accept_creates_single_match() {
    let ctx = common::context();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/interests")
        .insert_header(common::bearer(alice))
        .set_json(json!({ "to_user_id": bob }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let interest_id = body["interest"]["id"].as_str().unwrap().to_string();

    let respond = |status: &str| {
        test::TestRequest::post()
            .uri("/interests/respond")
            .insert_header(common::bearer(bob))
            .set_json(json!({ "interest_id": interest_id, "status": status }))
            .to_request()
    };

    let accepted: Value = test::call_and_read_body_json(&app, respond("accepted")).await;
    assert_eq!(accepted["status"], "accepted");

    let retry = test::call_service(&app, respond("accepted")).await;
    assert_eq!(retry.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/matches")
        .insert_header(common::bearer(alice))
        .to_request();
    let matches: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(matches.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn quota_endpoint_reports_without_consuming() {
    let ctx = common::context();
    let app = app!(ctx);
    let user = Uuid::new_v4();

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/quota/profile_view")
            .insert_header(common::bearer(user))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["feature"], "profile_view");
        assert_eq!(body["used"], 0);
        assert_eq!(body["limit"], 20);
    }
}
