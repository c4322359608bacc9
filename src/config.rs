use std::{env, path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

use crate::error::{AppError, Result};

const DEFAULT_SESSION_SECRET: &str = "handwood-secret-key";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database_url: String,
    pub public_dir: PathBuf,
    pub session: SessionConfig,
    pub admin: AdminSeed,
    pub smtp: SmtpConfig,
    pub cors_allowed: Vec<String>,
    pub order: OrderConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl: Duration,
    /// Forces the `Secure` cookie attribute regardless of the request scheme.
    pub secure_cookies: bool,
}

/// Credentials of the admin account created on first boot.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Ssl,
    /// STARTTLS upgrade, usually port 587.
    StartTls,
    None,
}

impl FromStr for SmtpSecurity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssl" | "smtps" => Ok(SmtpSecurity::Ssl),
            "tls" | "starttls" => Ok(SmtpSecurity::StartTls),
            "none" | "" => Ok(SmtpSecurity::None),
            other => Err(AppError::Config(format!("Invalid SMTP_SECURE value: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub user: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Accepted submissions per hour per source address.
    pub rate_limit_per_hour: u32,
    /// Submissions arriving sooner than this after page load are treated as bots.
    pub min_fill_time: Duration,
    /// Reverse proxies in front of the app that append to `X-Forwarded-For`.
    /// Zero keys the rate limit on the peer address alone.
    pub trusted_proxy_hops: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_secret = env::var("SESSION_SECRET").unwrap_or_else(|_| {
            warn!("SESSION_SECRET not set, using the built-in default");
            DEFAULT_SESSION_SECRET.to_owned()
        });
        let ttl = session_ttl(parse_var("SESSION_TTL_HOURS", "24")?)?;

        let smtp_user = first_var(&["SMTP_USER", "EMAIL_USER"]).unwrap_or_default();
        let smtp_password = first_var(&["SMTP_PASS", "EMAIL_PASS"]).unwrap_or_default();

        let rate_limit: u32 = parse_var("ORDER_RATE_LIMIT", "5")?;
        if rate_limit == 0 {
            return Err(AppError::Config("ORDER_RATE_LIMIT must be positive".to_owned()));
        }

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_owned()),
                port: parse_var("PORT", "3000")?,
                max_body_size: parse_var("MAX_BODY_SIZE", "52428800")?,
            },
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://database.db?mode=rwc".to_owned()),
            public_dir: env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "public".to_owned())
                .into(),
            session: SessionConfig {
                secret: session_secret,
                ttl,
                secure_cookies: env::var("APP_ENV")
                    .or_else(|_| env::var("NODE_ENV"))
                    .map(|v| v == "production")
                    .unwrap_or(false),
            },
            admin: AdminSeed {
                username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_owned()),
                password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_owned()),
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.hostinger.com".to_owned()),
                port: parse_var("SMTP_PORT", "465")?,
                security: env::var("SMTP_SECURE")
                    .unwrap_or_else(|_| "ssl".to_owned())
                    .parse()?,
                from: env::var("MAIL_FROM").unwrap_or_else(|_| smtp_user.clone()),
                from_name: env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "HandWood".to_owned()),
                recipient: env::var("ADMIN_EMAIL").unwrap_or_else(|_| smtp_user.clone()),
                user: smtp_user,
                password: smtp_password,
            },
            cors_allowed: env::var("CORS_ALLOWED")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
            order: OrderConfig {
                rate_limit_per_hour: rate_limit,
                min_fill_time: Duration::from_secs(3),
                trusted_proxy_hops: parse_var("TRUSTED_PROXY_HOPS", "0")?,
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn session_ttl(hours: u64) -> Result<Duration> {
    hours
        .checked_mul(60 * 60)
        .filter(|_| hours > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| AppError::Config("Invalid SESSION_TTL_HOURS value".to_owned()))
}

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> Result<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_owned())
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid {key} value")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_security_accepts_common_spellings() {
        assert_eq!("ssl".parse::<SmtpSecurity>().ok(), Some(SmtpSecurity::Ssl));
        assert_eq!("STARTTLS".parse::<SmtpSecurity>().ok(), Some(SmtpSecurity::StartTls));
        assert_eq!("tls".parse::<SmtpSecurity>().ok(), Some(SmtpSecurity::StartTls));
        assert_eq!("none".parse::<SmtpSecurity>().ok(), Some(SmtpSecurity::None));
        assert!("pigeon".parse::<SmtpSecurity>().is_err());
    }

    #[test]
    fn session_ttl_rejects_overflowing_hours() {
        assert_eq!(session_ttl(24).ok(), Some(Duration::from_secs(86_400)));
        assert!(matches!(session_ttl(u64::MAX), Err(AppError::Config(_))));
        assert!(matches!(session_ttl(u64::MAX / 3600 + 1), Err(AppError::Config(_))));
        assert!(session_ttl(0).is_err());
    }
}
