use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{extract::FormOrJson, AppState};
use crate::error::AppError;
use crate::services::order::{compose_notification, validate, OrderRejection, OrderSubmission};

const ACCEPTED: &str = "Спасибо! Ваше сообщение отправлено. Мы свяжемся с вами в ближайшее время.";
const DELIVERY_FAILED: &str = "Не удалось отправить сообщение. Попробуйте позже.";

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub message: String,
}

fn reply(status: StatusCode, success: bool, message: impl Into<String>) -> Response {
    (
        status,
        Json(OrderResponse {
            success,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Serves both `/api/order` and the legacy `/api/send_order.php`.
pub async fn submit_order(
    Extension(state): Extension<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<FormOrJson<OrderSubmission>, AppError>,
) -> Response {
    let submission = match payload {
        Ok(FormOrJson(submission)) => submission,
        Err(err) => return reply(err.status(), false, err.public_message()),
    };

    let order = match validate(
        &submission,
        Utc::now().timestamp_millis(),
        state.config.order.min_fill_time,
    ) {
        Ok(order) => order,
        Err(rejection) => {
            if rejection == OrderRejection::Spam {
                warn!("Order rejected by the spam check");
            }
            return reply(StatusCode::BAD_REQUEST, false, rejection.to_string());
        }
    };

    let source = client_ip(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.config.order.trusted_proxy_hops,
    );
    if let Err(err) = state.order_limiter.check(source) {
        return reply(err.status(), false, err.public_message());
    }

    let notification = match compose_notification(&order, &source.to_string()) {
        Ok(notification) => notification,
        Err(err) => {
            error!(%source, error = %err, "Failed to render order notification");
            return reply(StatusCode::INTERNAL_SERVER_ERROR, false, DELIVERY_FAILED);
        }
    };
    match state.mailer.send(&notification).await {
        Ok(()) => {
            info!(%source, subject = %notification.subject, "Order notification sent");
            reply(StatusCode::OK, true, ACCEPTED)
        }
        Err(err) => {
            error!(%source, error = %err, "Failed to send order notification");
            reply(StatusCode::INTERNAL_SERVER_ERROR, false, DELIVERY_FAILED)
        }
    }
}

/// Address an order is charged to.
///
/// Without trusted proxies this is the peer. Behind `trusted_hops` proxies it
/// is the `X-Forwarded-For` entry appended by the outermost of them; entries
/// further left are client-supplied and ignored.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> IpAddr {
    let peer = peer
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let Some(skip) = trusted_hops.checked_sub(1) else {
        return peer;
    };

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .collect();
    hops.iter()
        .rev()
        .nth(skip)
        .and_then(|hop| hop.parse().ok())
        .unwrap_or(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().expect("valid address")
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn forwarded_header_is_ignored_without_trusted_proxies() {
        let headers = forwarded("203.0.113.7");
        let peer = "192.0.2.1:4000".parse().ok();

        assert_eq!(client_ip(&headers, peer, 0), ip("192.0.2.1"));
        assert_eq!(client_ip(&HeaderMap::new(), None, 0), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn trusted_proxy_entry_wins_over_spoofed_prefix() {
        let headers = forwarded("1.2.3.4, 203.0.113.7");
        let peer = "10.0.0.1:4000".parse().ok();

        assert_eq!(client_ip(&headers, peer, 1), ip("203.0.113.7"));
        assert_eq!(client_ip(&headers, peer, 2), ip("1.2.3.4"));
    }

    #[test]
    fn short_or_garbage_chain_falls_back_to_peer() {
        let peer = "10.0.0.1:4000".parse().ok();

        assert_eq!(client_ip(&forwarded("unknown"), peer, 1), ip("10.0.0.1"));
        assert_eq!(client_ip(&forwarded("203.0.113.7"), peer, 2), ip("10.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new(), peer, 1), ip("10.0.0.1"));
    }
}
