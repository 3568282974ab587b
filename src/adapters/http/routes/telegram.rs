use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::{
    adapters::http::{app_state::AppState, routes::current_user_id},
    app_error::AppResult,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkCompletePayload {
    token: String,
    telegram_chat_id: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/link-token", post(create_link_token))
        .route("/link", post(complete_link).delete(unlink))
}

async fn create_link_token(
    State(app_state): State<AppState>,
    cookies: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let issued = app_state
        .telegram_use_cases
        .create_link_token(user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Called from the deep link; the one-time token carries the identity, so
/// no cookie auth here.
async fn complete_link(
    State(app_state): State<AppState>,
    Json(payload): Json<LinkCompletePayload>,
) -> AppResult<impl IntoResponse> {
    let account = app_state
        .telegram_use_cases
        .complete_link(&payload.token, payload.telegram_chat_id)
        .await?;
    Ok(Json(account))
}

async fn unlink(
    State(app_state): State<AppState>,
    cookies: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    app_state.telegram_use_cases.unlink(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
