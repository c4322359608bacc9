use axum::{
    extract::Extension,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::AppState;
use crate::entities::admin;
use crate::error::{AppError, PageError};
use crate::middleware::session::AdminIdentity;
use crate::views::{self, ChangePasswordPage, FieldError, LoginPage};

const INVALID_CREDENTIALS: &str = "Неверное имя пользователя или пароль";
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn login_page(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if state.auth.current_admin(&headers).await.is_some() {
        return Ok(Redirect::to("/admin").into_response());
    }
    Ok(views::render(&LoginPage { error: None })?.into_response())
}

/// Unknown usernames and wrong passwords get the same answer.
pub async fn login(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let username = form.username.trim();
    let admin = match state.store.find_admin_by_username(username).await? {
        Some(admin) => Some(admin).filter(|admin| admin.check_hash(&form.password)),
        None => {
            admin::check_dummy_hash(&form.password);
            None
        }
    };

    let Some(admin) = admin else {
        warn!(%username, "Failed admin login");
        let page = LoginPage {
            error: Some(INVALID_CREDENTIALS.to_owned()),
        };
        return Ok((StatusCode::UNAUTHORIZED, views::render(&page)?).into_response());
    };

    let identity = AdminIdentity {
        admin_id: admin.id,
        admin_username: admin.username,
    };
    let cookie = state
        .auth
        .login(identity, &headers)
        .await
        .map_err(AppError::from)?;
    info!(%username, "Admin logged in");

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/admin")).into_response())
}

pub async fn logout(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let cookie = state.auth.logout(&headers).await;
    ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

pub async fn change_password_page(
    Extension(identity): Extension<AdminIdentity>,
) -> Result<Response, PageError> {
    password_page(StatusCode::OK, identity, None, None)
}

/// Checks run in a fixed order and stop at the first failing field.
pub async fn change_password(
    Extension(state): Extension<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Response, PageError> {
    let rejected = |field: &'static str, message: &str| {
        let error = FieldError {
            field,
            message: message.to_owned(),
        };
        password_page(StatusCode::BAD_REQUEST, identity.clone(), Some(error), None)
    };

    if form.new_password != form.confirm_password {
        return rejected(
            "confirmPassword",
            "Новый пароль и подтверждение не совпадают",
        );
    }
    if form.new_password.chars().count() < MIN_PASSWORD_LEN {
        return rejected(
            "newPassword",
            "Пароль должен содержать минимум 6 символов",
        );
    }

    let Some(admin) = state.store.find_admin_by_id(identity.admin_id).await? else {
        return Err(AppError::NotFound("Администратор не найден".to_owned()).into());
    };
    if !admin.check_hash(&form.current_password) {
        return rejected("currentPassword", "Неверный текущий пароль");
    }

    if !state
        .store
        .update_admin_password(admin.id, &form.new_password)
        .await?
    {
        return Err(AppError::NotFound("Администратор не найден".to_owned()).into());
    }
    info!(username = %identity.admin_username, "Admin password changed");

    password_page(
        StatusCode::OK,
        identity,
        None,
        Some("Пароль успешно изменён".to_owned()),
    )
}

fn password_page(
    status: StatusCode,
    identity: AdminIdentity,
    error: Option<FieldError>,
    success: Option<String>,
) -> Result<Response, PageError> {
    let page = ChangePasswordPage {
        username: identity.admin_username,
        error,
        success,
    };
    Ok((status, views::render(&page)?).into_response())
}
