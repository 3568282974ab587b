use crate::{
    adapters::{
        email::resend::ResendEmailSender, http::app_state::AppState, telegram::TelegramNotifier,
    },
    infra::{config::AppConfig, postgres_persistence, rate_limit::RedisRateLimiter},
    use_cases::{
        AuditRepo,
        reminders::{ReminderRepo, ReminderUseCases},
        subscriptions::{SubscriptionRepo, SubscriptionUseCases},
        telegram::{TelegramRepo, TelegramUseCases},
        user::{AuthUseCases, EmailSender, UserRepo},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let rate_limiter = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
            config.rate_limit_per_email,
        )
        .await?,
    );

    let email = Arc::new(ResendEmailSender::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));
    let notifier = Arc::new(TelegramNotifier::new(config.telegram_bot_token.clone()));

    let user_repo = postgres_arc.clone() as Arc<dyn UserRepo>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let telegram_repo = postgres_arc.clone() as Arc<dyn TelegramRepo>;
    let reminder_repo = postgres_arc.clone() as Arc<dyn ReminderRepo>;
    let audit_repo = postgres_arc.clone() as Arc<dyn AuditRepo>;

    let auth_use_cases = AuthUseCases::new(
        user_repo.clone(),
        email.clone() as Arc<dyn EmailSender>,
        audit_repo.clone(),
        config.app_origin.to_string(),
    );

    let subscription_use_cases = SubscriptionUseCases::new(
        subscription_repo,
        user_repo.clone(),
        audit_repo.clone(),
    );

    let telegram_use_cases = TelegramUseCases::new(
        telegram_repo.clone(),
        audit_repo.clone(),
        config.telegram_bot_name.clone(),
        config.app_origin.to_string(),
    );

    let reminder_use_cases = ReminderUseCases::new(
        reminder_repo,
        notifier,
        email as Arc<dyn EmailSender>,
        user_repo,
        telegram_repo,
        audit_repo,
        config.notification_cooldown_hours,
    );

    Ok(AppState {
        config: Arc::new(config),
        auth_use_cases: Arc::new(auth_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        telegram_use_cases: Arc::new(telegram_use_cases),
        reminder_use_cases: Arc::new(reminder_use_cases),
        rate_limiter,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "subtrack=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
