#![allow(dead_code)]

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{header, redirect, Client, Response, StatusCode};
use uuid::Uuid;

use handwood::api::{create_app, AppState};
use handwood::config::{
    AdminSeed, Config, OrderConfig, ServerConfig, SessionConfig, SmtpConfig, SmtpSecurity,
};
use handwood::middleware::{auth::AuthState, session::SessionStore};
use handwood::services::{
    mailer::{MailError, Mailer},
    order::Notification,
    rate_limit::OrderRateLimiter,
};
use handwood::store::{Store, PRODUCT_IMAGE_DIR};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(notification.clone());
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _: &Notification) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused by smtp.test".to_owned()))
    }
}

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub store: Store,
    pub root: PathBuf,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.store.public_dir().join(PRODUCT_IMAGE_DIR)
    }

    pub async fn login_as(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/admin/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .expect("Failed to send login request")
    }

    /// Logs in as the seeded admin and returns the `name=value` cookie pair.
    pub async fn admin_cookie(&self) -> String {
        let response = self.login_as(ADMIN_USERNAME, ADMIN_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie_pair(&response).expect("Login did not set a session cookie")
    }

    pub async fn get_with(&self, path: &str, cookie: &str) -> Response {
        self.client
            .get(self.url(path))
            .header(header::COOKIE, cookie)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_form_with(&self, path: &str, cookie: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .header(header::COOKIE, cookie)
            .form(form)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_multipart_with(
        &self,
        path: &str,
        cookie: &str,
        form: reqwest::multipart::Form,
    ) -> Response {
        self.client
            .post(self.url(path))
            .header(header::COOKIE, cookie)
            .multipart(form)
            .send()
            .await
            .expect("Failed to send request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub fn session_cookie_pair(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_owned)
}

pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

pub fn test_config(root: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            max_body_size: 20 * 1024 * 1024,
        },
        database_url: format!("sqlite://{}?mode=rwc", root.join("test.db").display()),
        public_dir: root.join("public"),
        session: SessionConfig {
            secret: "test-session-secret".to_owned(),
            ttl: Duration::from_secs(60 * 60),
            secure_cookies: false,
        },
        admin: AdminSeed {
            username: ADMIN_USERNAME.to_owned(),
            password: ADMIN_PASSWORD.to_owned(),
        },
        smtp: SmtpConfig {
            host: "smtp.test".to_owned(),
            port: 25,
            security: SmtpSecurity::None,
            user: String::new(),
            password: String::new(),
            from: "shop@handwood.test".to_owned(),
            from_name: "HandWood".to_owned(),
            recipient: "owner@handwood.test".to_owned(),
        },
        cors_allowed: Vec::new(),
        order: OrderConfig {
            rate_limit_per_hour: 5,
            min_fill_time: Duration::from_secs(3),
            trusted_proxy_hops: 0,
        },
    }
}

pub fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("handwood-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("Failed to create test dir");
    root
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(RecordingMailer::default()), |_| {}).await
}

pub async fn spawn_app_with(mailer: Arc<dyn Mailer>, configure: impl FnOnce(&mut Config)) -> TestApp {
    let root = temp_root();
    let mut config = test_config(&root);
    configure(&mut config);

    let store = Store::connect(&config.database_url, config.public_dir.clone())
        .await
        .expect("Failed to open test database");
    store.init(&config.admin).await.expect("Failed to init store");

    let sessions = Arc::new(SessionStore::new(config.session.ttl));
    let auth = AuthState::new(sessions, &config.session.secret, config.session.secure_cookies);
    let limit = NonZeroU32::new(config.order.rate_limit_per_hour).expect("positive limit");

    let state = AppState {
        store: Arc::new(store.clone()),
        auth,
        mailer,
        order_limiter: Arc::new(OrderRateLimiter::per_hour(limit)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = listener.local_addr().expect("listener address");
    let app = create_app(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    let client = Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to build client");

    TestApp {
        address: format!("http://{address}"),
        client,
        store,
        root,
    }
}
