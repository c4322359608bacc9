mod common;

use std::{sync::Arc, time::Duration};

use reqwest::{header, StatusCode};

use common::{
    location, session_cookie_pair, spawn_app, spawn_app_with, RecordingMailer, ADMIN_PASSWORD,
    ADMIN_USERNAME,
};

#[tokio::test]
async fn anonymous_admin_page_redirects_to_login() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/admin"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/admin/login"));
}

#[tokio::test]
async fn anonymous_admin_api_gets_json_401() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/admin/products/1"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse response JSON");
    assert_eq!(body["error"], "Требуется авторизация");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = spawn_app().await;

    let wrong_password = app.login_as(ADMIN_USERNAME, "not-the-password").await;
    let unknown_user = app.login_as("nobody", ADMIN_PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong_password.headers().get(header::SET_COOKIE).is_none());
    assert!(unknown_user.headers().get(header::SET_COOKIE).is_none());

    let first = wrong_password.text().await.expect("body");
    let second = unknown_user.text().await.expect("body");
    assert_eq!(first, second);
    assert!(first.contains("Неверное имя пользователя или пароль"));
}

#[tokio::test]
async fn login_issues_a_hardened_session_cookie() {
    let app = spawn_app().await;

    let response = app.login_as(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/admin"));

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("Set-Cookie header")
        .to_owned();
    assert!(cookie.starts_with("handwood.sid="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=3600"));
    assert!(!cookie.contains("Secure"));

    let pair = session_cookie_pair(&response).expect("cookie pair");
    let dashboard = app.get_with("/admin", &pair).await;
    assert_eq!(dashboard.status(), StatusCode::OK);

    let login_again = app.get_with("/admin/login", &pair).await;
    assert_eq!(login_again.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&login_again).as_deref(), Some("/admin"));
}

#[tokio::test]
async fn https_requests_get_secure_cookies() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/admin/login"))
        .header("x-forwarded-proto", "https")
        .form(&[("username", ADMIN_USERNAME), ("password", ADMIN_PASSWORD)])
        .send()
        .await
        .expect("Failed to send request");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("Set-Cookie header");
    assert!(cookie.ends_with("; Secure"));
}

#[tokio::test]
async fn logout_destroys_the_session() {
    let app = spawn_app().await;
    let cookie = app.admin_cookie().await;

    let response = app.get_with("/admin/logout", &cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("Set-Cookie header");
    assert!(cleared.contains("Max-Age=0"));

    let after = app.get_with("/admin", &cookie).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&after).as_deref(), Some("/admin/login"));
}

#[tokio::test]
async fn forged_cookie_is_anonymous() {
    let app = spawn_app().await;

    let response = app.get_with("/admin", "handwood.sid=not.a.token").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn session_expires_after_its_ttl() {
    let app = spawn_app_with(Arc::new(RecordingMailer::default()), |config| {
        config.session.ttl = Duration::from_secs(1);
    })
    .await;
    let cookie = app.admin_cookie().await;

    assert_eq!(app.get_with("/admin", &cookie).await.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let expired = app.get_with("/admin", &cookie).await;
    assert_eq!(expired.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&expired).as_deref(), Some("/admin/login"));
}

#[tokio::test]
async fn password_change_reports_the_failing_field() {
    let app = spawn_app().await;
    let cookie = app.admin_cookie().await;

    let cases = [
        (ADMIN_PASSWORD, "newpass1", "different", "confirmPassword"),
        (ADMIN_PASSWORD, "abc", "abc", "newPassword"),
        ("wrong-current", "newpass1", "newpass1", "currentPassword"),
    ];
    for (current, new, confirm, field) in cases {
        let response = app
            .post_form_with(
                "/admin/change-password",
                &cookie,
                &[
                    ("currentPassword", current),
                    ("newPassword", new),
                    ("confirmPassword", confirm),
                ],
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.text().await.expect("body");
        assert!(
            body.contains(&format!("data-field=\"{field}\"")),
            "expected an error on {field}"
        );
    }

    let still_old = app.login_as(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(still_old.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn password_change_replaces_the_hash() {
    let app = spawn_app().await;
    let cookie = app.admin_cookie().await;

    let response = app
        .post_form_with(
            "/admin/change-password",
            &cookie,
            &[
                ("currentPassword", ADMIN_PASSWORD),
                ("newPassword", "brand-new-pass"),
                ("confirmPassword", "brand-new-pass"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.expect("body").contains("Пароль успешно изменён"));

    let old = app.login_as(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
    let new = app.login_as(ADMIN_USERNAME, "brand-new-pass").await;
    assert_eq!(new.status(), StatusCode::SEE_OTHER);
}
