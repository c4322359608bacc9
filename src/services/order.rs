//! Order/contact form rules shared by every order entry point: sanitising,
//! the anti-spam heuristic, field checks and the notification body.

use std::time::Duration;

use askama::Template;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const MAX_FIELD_LEN: usize = 500;
pub const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;
pub const MIN_MESSAGE_LEN: usize = 5;

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[0-9]{1,4}[0-9]{7,14}$").expect("phone pattern compiles"));
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Raw order form, accepted as JSON or url-encoded.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OrderSubmission {
    pub name: Option<String>,
    #[serde(rename = "middle-name", alias = "middleName")]
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "productTitle", alias = "product")]
    pub product_title: Option<String>,
    /// Hidden field; humans leave it empty.
    pub website: Option<String>,
    /// Page-load time in milliseconds since the epoch.
    #[serde(deserialize_with = "lenient_number")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidOrder {
    pub name: String,
    pub middle_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub product_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderRejection {
    #[error("Ошибка. Попробуйте позже.")]
    Spam,
    #[error("{0}")]
    Invalid(&'static str),
}

pub fn clean_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(MAX_FIELD_LEN)
        .collect()
}

pub fn validate_email(email: &str) -> Option<String> {
    let email = email.trim();
    EMAIL_REGEX.is_match(email).then(|| email.to_owned())
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(phone)
}

/// Applies the anti-spam check, then the field rules, in that order.
/// `now_ms` is the current time in milliseconds since the epoch.
pub fn validate(
    submission: &OrderSubmission,
    now_ms: i64,
    min_fill_time: Duration,
) -> Result<ValidOrder, OrderRejection> {
    let cleaned = |field: &Option<String>| clean_text(field.as_deref().unwrap_or_default());
    let present = |value: String| (!value.is_empty()).then_some(value);

    let honeypot = cleaned(&submission.website);
    let too_fast = submission
        .timestamp
        .filter(|ts| *ts > 0.0)
        .is_some_and(|ts| (now_ms as f64 - ts) < min_fill_time.as_millis() as f64);
    if !honeypot.is_empty() || too_fast {
        return Err(OrderRejection::Spam);
    }

    let name = cleaned(&submission.name);
    if !NAME_LEN.contains(&name.chars().count()) {
        return Err(OrderRejection::Invalid("Имя должно быть от 2 до 100 символов."));
    }

    let phone = present(cleaned(&submission.phone));
    let email = submission.email.as_deref().and_then(validate_email);
    if phone.is_none() && email.is_none() {
        return Err(OrderRejection::Invalid("Укажите телефон или email для связи."));
    }
    if phone.as_deref().is_some_and(|p| !is_valid_phone(p)) {
        return Err(OrderRejection::Invalid(
            "Неверный формат номера телефона. Используйте +7XXXXXXXXXX или +375XXXXXXXXX",
        ));
    }

    let message = cleaned(&submission.message);
    if message.chars().count() < MIN_MESSAGE_LEN {
        return Err(OrderRejection::Invalid("Сообщение должно быть минимум 5 символов"));
    }

    Ok(ValidOrder {
        name,
        middle_name: present(cleaned(&submission.middle_name)),
        phone,
        email,
        message,
        product_title: present(cleaned(&submission.product_title)),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTo {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub reply_to: Option<ReplyTo>,
}

#[derive(Template)]
#[template(path = "email/order.html")]
struct OrderEmail<'a> {
    order: &'a ValidOrder,
    source: &'a str,
}

/// Builds the admin notification for an accepted order. `source` is the
/// submitter's address, shown in the footer.
pub fn compose_notification(
    order: &ValidOrder,
    source: &str,
) -> Result<Notification, askama::Error> {
    let html = OrderEmail { order, source }.render()?;

    let subject = match &order.product_title {
        Some(product) => format!("[Новый заказ] {} - {product}", order.name),
        None => format!("[Новое сообщение] {} - Связаться с нами", order.name),
    };

    Ok(Notification {
        subject,
        html,
        text: order.message.clone(),
        reply_to: order.email.as_ref().map(|email| ReplyTo {
            name: order.name.clone(),
            email: email.clone(),
        }),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}
