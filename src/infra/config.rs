use std::env;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;
use url::Url;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    pub magic_link_ttl_minutes: i64,
    pub resend_api_key: SecretString,
    pub email_from: String,
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_bot_name: Option<String>,
    pub reminder_poll_seconds: u64,
    pub notification_cooldown_hours: i64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub rate_limit_per_email: u64,
}

fn required(var: &str) -> String {
    env::var(var).unwrap_or_else(|_| panic!("{var} must be set"))
}

fn parsed_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = SecretString::new(required("JWT_SECRET").into());

        let access_token_ttl_secs: i64 = parsed_or("ACCESS_TOKEN_TTL_SECS", 86_400);
        let refresh_token_ttl_days: i64 = parsed_or("REFRESH_TOKEN_TTL_DAYS", 30);

        let app_origin: Url = required("APP_ORIGIN")
            .parse()
            .expect("APP_ORIGIN must be a valid URL");
        let cors_origin: HeaderValue = env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .parse()
            .expect("CORS_ORIGIN must be a valid header value");

        let bind_addr: SocketAddr = parsed_or("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url = required("DATABASE_URL");
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let resend_api_key = SecretString::new(required("RESEND_API_KEY").into());
        let email_from = required("EMAIL_FROM");

        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|raw| !raw.is_empty())
            .map(|raw| SecretString::new(raw.into()));
        let telegram_bot_name = env::var("TELEGRAM_BOT_NAME")
            .ok()
            .filter(|raw| !raw.is_empty());

        Self {
            jwt_secret,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            refresh_token_ttl: Duration::days(refresh_token_ttl_days),
            app_origin,
            cors_origin,
            magic_link_ttl_minutes: parsed_or("MAGIC_LINK_TTL_MINUTES", 15),
            bind_addr,
            database_url,
            redis_url,
            resend_api_key,
            email_from,
            telegram_bot_token,
            telegram_bot_name,
            reminder_poll_seconds: parsed_or("REMINDER_POLL_SECONDS", 3600),
            notification_cooldown_hours: parsed_or("NOTIFICATION_COOLDOWN_HOURS", 24),
            rate_limit_window_secs: parsed_or("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_per_ip: parsed_or("RATE_LIMIT_PER_IP", 60),
            rate_limit_per_email: parsed_or("RATE_LIMIT_PER_EMAIL", 30),
        }
    }
}
