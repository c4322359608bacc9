use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header,
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Accepts either a JSON body or an url-encoded form, picked by `Content-Type`.
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let payload = if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(payload)| payload)
                .map_err(|err| rejected(&err.body_text()))?
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(payload)| payload)
                .map_err(|err| rejected(&err.body_text()))?
        };

        Ok(FormOrJson(payload))
    }
}

fn rejected(detail: &str) -> AppError {
    tracing::debug!(detail, "Rejected request body");
    AppError::Validation("Некорректные данные запроса".to_owned())
}
