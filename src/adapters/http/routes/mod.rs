pub mod auth;
pub mod notifications;
pub mod subscriptions;
pub mod telegram;
pub mod user;

use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/user", user::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/telegram", telegram::router())
        .nest("/notifications", notifications::router())
}

pub(crate) fn current_user_id(cookies: &CookieJar, app_state: &AppState) -> AppResult<Uuid> {
    let access_token = cookies
        .get("access_token")
        .ok_or(AppError::InvalidCredentials)?;
    let claims = jwt::verify(access_token.value(), &app_state.config.jwt_secret)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidCredentials)
}
