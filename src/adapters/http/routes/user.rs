use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::{
    adapters::http::{app_state::AppState, routes::current_user_id},
    app_error::AppResult,
    domain::entities::{settings::UserSettings, user::User},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    #[serde(flatten)]
    user: User,
    telegram_linked: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/settings", get(settings).put(update_settings))
}

async fn me(State(app_state): State<AppState>, cookies: CookieJar) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let user = app_state.auth_use_cases.profile(user_id).await?;
    let telegram_linked = app_state
        .telegram_use_cases
        .linked_account(user_id)
        .await?
        .is_some();
    Ok(Json(MeResponse {
        user,
        telegram_linked,
    }))
}

async fn settings(
    State(app_state): State<AppState>,
    cookies: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let settings = app_state.auth_use_cases.settings(user_id).await?;
    Ok(Json(settings))
}

async fn update_settings(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Json(payload): Json<UserSettings>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let settings = app_state
        .auth_use_cases
        .update_settings(user_id, payload)
        .await?;
    Ok(Json(settings))
}
