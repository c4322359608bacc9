use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::views::ErrorPage;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Требуется авторизация")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("Слишком много запросов. Попробуйте позже.")]
    RateLimited,
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Mail delivery failed: {0}")]
    Mail(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Internal failure detail attached to error responses for the logging
/// middleware. Never serialized into the body.
#[derive(Clone, Debug)]
pub struct ErrorDetail(pub String);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Mail(_)
            | AppError::Io(_)
            | AppError::Config(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(_)
            | AppError::Unauthorized
            | AppError::NotFound(_)
            | AppError::RateLimited => self.to_string(),
            _ => "Внутренняя ошибка сервера".to_owned(),
        }
    }

    fn attach_detail(&self, mut response: Response) -> Response {
        if self.status().is_server_error() {
            response
                .extensions_mut()
                .insert(ErrorDetail(self.to_string()));
        }
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let response = (
            self.status(),
            Json(json!({
                "error": self.public_message()
            })),
        )
            .into_response();
        self.attach_detail(response)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Некорректные данные".to_owned());
        AppError::Validation(message)
    }
}

/// Same failure taxonomy as [`AppError`], rendered as an HTML page for
/// browser-facing routes.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<DbErr> for PageError {
    fn from(err: DbErr) -> Self {
        PageError(err.into())
    }
}

impl From<ValidationErrors> for PageError {
    fn from(errors: ValidationErrors) -> Self {
        PageError(errors.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let err = self.0;
        let page = ErrorPage {
            status: err.status().as_u16(),
            message: err.public_message(),
        };
        let response = match page.render() {
            Ok(html) => (err.status(), Html(html)).into_response(),
            Err(_) => (err.status(), err.public_message()).into_response(),
        };
        err.attach_detail(response)
    }
}
