use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    infra::{config::AppConfig, rate_limit::RateLimiterTrait},
    use_cases::{
        reminders::ReminderUseCases, subscriptions::SubscriptionUseCases,
        telegram::TelegramUseCases, user::AuthUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_use_cases: Arc<AuthUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub telegram_use_cases: Arc<TelegramUseCases>,
    pub reminder_use_cases: Arc<ReminderUseCases>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}

impl FromRef<AppState> for Arc<AuthUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_use_cases.clone()
    }
}
