use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    adapters::http::{app_state::AppState, routes::current_user_id},
    app_error::AppResult,
    use_cases::reminders::TestNotificationRequest,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/test", post(send_test))
}

async fn send_test(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Json(payload): Json<TestNotificationRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let notification = app_state
        .reminder_use_cases
        .send_test(user_id, payload)
        .await?;
    Ok(Json(notification))
}
