pub mod mailer;
pub mod order;
pub mod rate_limit;
