mod common;

use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app_with, FailingMailer, RecordingMailer, TestApp};

fn valid_order() -> Value {
    json!({
        "name": "Анна",
        "middle-name": "Сергеевна",
        "phone": "+37512345678",
        "email": "anna@example.com",
        "message": "Хочу заказать доску с гравировкой",
        "productTitle": "Доска из дуба",
        "website": "",
        "timestamp": Utc::now().timestamp_millis() - 10_000,
    })
}

async fn post_order(app: &TestApp, path: &str, body: &Value, source: &str) -> (StatusCode, Value) {
    let response = app
        .client
        .post(app.url(path))
        .header("x-forwarded-for", source)
        .json(body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response
        .json::<Value>()
        .await
        .expect("Failed to parse response JSON");
    (status, body)
}

async fn recording_app() -> (TestApp, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    let app = spawn_app_with(mailer.clone(), |_| {}).await;
    (app, mailer)
}

#[tokio::test]
async fn valid_order_is_mailed() {
    let (app, mailer) = recording_app().await;

    let (status, body) = post_order(&app, "/api/order", &valid_order(), "198.51.100.1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[Новый заказ] Анна - Доска из дуба");
    assert!(sent[0].html.contains("+37512345678"));
    assert!(sent[0].html.contains("IP: 127.0.0.1"));
    assert_eq!(
        sent[0].reply_to.as_ref().map(|r| r.email.as_str()),
        Some("anna@example.com")
    );
}

#[tokio::test]
async fn legacy_endpoint_accepts_url_encoded_forms() {
    let (app, mailer) = recording_app().await;

    let response = app
        .client
        .post(app.url("/api/send_order.php"))
        .form(&[
            ("name", "Пётр"),
            ("phone", "+79161234567"),
            ("message", "Перезвоните, пожалуйста"),
        ])
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await.expect("JSON body");
    assert_eq!(body["success"], true);
    assert_eq!(
        mailer.sent()[0].subject,
        "[Новое сообщение] Пётр - Связаться с нами"
    );
}

#[tokio::test]
async fn spam_is_rejected_without_mail() {
    let (app, mailer) = recording_app().await;

    let mut honeypot = valid_order();
    honeypot["website"] = json!("http://spam.example");
    let (status, body) = post_order(&app, "/api/order", &honeypot, "198.51.100.2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let mut too_fast = valid_order();
    too_fast["timestamp"] = json!(Utc::now().timestamp_millis() - 500);
    let (status, _) = post_order(&app, "/api/order", &too_fast, "198.51.100.2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn field_rules_are_enforced() {
    let (app, mailer) = recording_app().await;

    let mut no_contact = valid_order();
    no_contact["phone"] = json!("");
    no_contact["email"] = json!("not-an-email");
    let (status, body) = post_order(&app, "/api/order", &no_contact, "198.51.100.3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Укажите телефон или email для связи.");

    let mut bad_phone = valid_order();
    bad_phone["phone"] = json!("8 029 123 45 67");
    let (status, _) = post_order(&app, "/api/order", &bad_phone, "198.51.100.3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut short_message = valid_order();
    short_message["message"] = json!("Да");
    let (status, _) = post_order(&app, "/api/order", &short_message, "198.51.100.3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut short_name = valid_order();
    short_name["name"] = json!("А");
    let (status, _) = post_order(&app, "/api/order", &short_name, "198.51.100.3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn sixth_order_within_an_hour_is_rate_limited() {
    let (app, mailer) = recording_app().await;

    for _ in 0..5 {
        let (status, _) = post_order(&app, "/api/order", &valid_order(), "203.0.113.9").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = post_order(&app, "/api/order", &valid_order(), "203.0.113.9").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(mailer.sent().len(), 5);

    let (status, _) = post_order(&app, "/api/order", &valid_order(), "203.0.113.10").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(mailer.sent().len(), 5);
}

#[tokio::test]
async fn trusted_proxy_hop_keys_the_budget() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = spawn_app_with(mailer.clone(), |config| {
        config.order.trusted_proxy_hops = 1;
    })
    .await;

    for n in 0..5 {
        let chain = format!("10.9.9.{n}, 203.0.113.20");
        let (status, _) = post_order(&app, "/api/order", &valid_order(), &chain).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = post_order(&app, "/api/order", &valid_order(), "10.9.9.99, 203.0.113.20").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = post_order(&app, "/api/order", &valid_order(), "203.0.113.21").await;
    assert_eq!(status, StatusCode::OK);
    assert!(mailer.sent()[5].html.contains("IP: 203.0.113.21"));
}

#[tokio::test]
async fn mail_failure_is_a_generic_500() {
    let app = spawn_app_with(Arc::new(FailingMailer), |_| {}).await;

    let (status, body) = post_order(&app, "/api/order", &valid_order(), "198.51.100.4").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(!message.is_empty());
    assert!(!message.contains("smtp.test"));
}
