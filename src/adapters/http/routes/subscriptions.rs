use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, routes::current_user_id},
    app_error::AppResult,
    domain::entities::subscription::SubscriptionStatus,
    use_cases::subscriptions::{
        DEFAULT_SNOOZE_DAYS, PortableData, SubscriptionDraft, SubscriptionFilter,
        SubscriptionPatch,
    },
};

#[derive(Deserialize)]
struct ListQuery {
    status: Option<SubscriptionStatus>,
    q: Option<String>,
}

#[derive(Deserialize)]
struct StatusPayload {
    status: SubscriptionStatus,
}

#[derive(Deserialize)]
struct SnoozePayload {
    days: Option<u32>,
}

#[derive(Serialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/reminders", get(reminders))
        .route("/summary", get(summary))
        .route("/export", get(export))
        .route("/import", post(import))
        .route(
            "/{id}",
            get(get_one).put(replace).patch(patch).delete(delete_one),
        )
        .route("/{id}/status", axum::routing::patch(set_status))
        .route("/{id}/snooze", post(snooze).delete(clear_snooze))
}

async fn list(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let items = app_state
        .subscription_use_cases
        .list(
            user_id,
            SubscriptionFilter {
                status: query.status,
                q: query.q,
            },
        )
        .await?;
    Ok(Json(ItemsResponse { items }))
}

async fn create(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Json(payload): Json<SubscriptionDraft>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let created = app_state
        .subscription_use_cases
        .create(user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_one(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let sub = app_state.subscription_use_cases.get(user_id, id).await?;
    Ok(Json(sub))
}

async fn replace(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubscriptionDraft>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let updated = app_state
        .subscription_use_cases
        .replace(user_id, id, payload)
        .await?;
    Ok(Json(updated))
}

async fn patch(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubscriptionPatch>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let updated = app_state
        .subscription_use_cases
        .patch(user_id, id, payload)
        .await?;
    Ok(Json(updated))
}

async fn delete_one(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    app_state.subscription_use_cases.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let updated = app_state
        .subscription_use_cases
        .set_status(user_id, id, payload.status)
        .await?;
    Ok(Json(updated))
}

async fn snooze(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
    payload: Option<Json<SnoozePayload>>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let days = payload
        .and_then(|Json(p)| p.days)
        .unwrap_or(DEFAULT_SNOOZE_DAYS);
    let updated = app_state
        .subscription_use_cases
        .snooze(user_id, id, days)
        .await?;
    Ok(Json(updated))
}

async fn clear_snooze(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let updated = app_state
        .subscription_use_cases
        .clear_snooze(user_id, id)
        .await?;
    Ok(Json(updated))
}

async fn reminders(
    State(app_state): State<AppState>,
    cookies: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let items = app_state.subscription_use_cases.reminders(user_id).await?;
    Ok(Json(ItemsResponse { items }))
}

async fn summary(
    State(app_state): State<AppState>,
    cookies: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let summary = app_state.subscription_use_cases.summary(user_id).await?;
    Ok(Json(summary))
}

async fn export(
    State(app_state): State<AppState>,
    cookies: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let data = app_state.subscription_use_cases.export(user_id).await?;
    Ok(Json(data))
}

async fn import(
    State(app_state): State<AppState>,
    cookies: CookieJar,
    Json(payload): Json<PortableData>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user_id(&cookies, &app_state)?;
    let outcome = app_state
        .subscription_use_cases
        .import(user_id, payload)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::json;
    use uuid::Uuid;

    use crate::test_utils::TestAppStateBuilder;

    use super::*;

    struct TestContext {
        server: TestServer,
        cookie: HeaderValue,
    }

    fn context() -> TestContext {
        let (app_state, user_id) = TestAppStateBuilder::new()
            .with_user("tester@example.com")
            .build();

        let token = crate::application::jwt::issue(
            user_id,
            &app_state.config.jwt_secret,
            time::Duration::hours(1),
        )
        .expect("failed to issue test token");

        let router = router().with_state(app_state);
        let server = TestServer::new(router).expect("failed to start test server");
        let cookie = HeaderValue::from_str(&format!("access_token={token}")).unwrap();
        TestContext { server, cookie }
    }

    fn cookie_header() -> HeaderName {
        HeaderName::from_static("cookie")
    }

    #[tokio::test]
    async fn rejects_requests_without_token() {
        let ctx = context();
        let response = ctx.server.get("/").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_list_and_delete_roundtrip() {
        let ctx = context();

        let created = ctx
            .server
            .post("/")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({
                "name": "Netflix",
                "price": "15.99",
                "currency": "EUR",
                "endAt": "2030-01-15T00:00:00Z",
                "vendor": "Netflix Inc."
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        assert_eq!(body["status"], "active");
        let id = body["id"].as_str().unwrap().to_string();

        let listed = ctx
            .server
            .get("/")
            .add_header(cookie_header(), ctx.cookie.clone())
            .await;
        listed.assert_status_ok();
        let listed: serde_json::Value = listed.json();
        assert_eq!(listed["items"].as_array().unwrap().len(), 1);

        let deleted = ctx
            .server
            .delete(&format!("/{id}"))
            .add_header(cookie_header(), ctx.cookie.clone())
            .await;
        deleted.assert_status(StatusCode::NO_CONTENT);

        let missing = ctx
            .server
            .get(&format!("/{id}"))
            .add_header(cookie_header(), ctx.cookie.clone())
            .await;
        missing.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn past_end_at_creates_expired_record() {
        let ctx = context();

        let created = ctx
            .server
            .post("/")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({
                "name": "Lapsed",
                "price": "4.00",
                "currency": "USD",
                "endAt": "2020-01-01T00:00:00Z"
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        assert_eq!(body["status"], "expired");
    }

    #[tokio::test]
    async fn snooze_endpoint_hides_item_from_reminders() {
        let ctx = context();

        let in_three_days = chrono::Utc::now() + chrono::Duration::days(3);
        let created = ctx
            .server
            .post("/")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({
                "name": "Due soon",
                "price": "9.99",
                "currency": "USD",
                "endAt": in_three_days.to_rfc3339()
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<serde_json::Value>()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let queue: serde_json::Value = ctx
            .server
            .get("/reminders")
            .add_header(cookie_header(), ctx.cookie.clone())
            .await
            .json();
        assert_eq!(queue["items"].as_array().unwrap().len(), 1);

        let snoozed = ctx
            .server
            .post(&format!("/{id}/snooze"))
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({ "days": 7 }))
            .await;
        snoozed.assert_status_ok();

        let queue: serde_json::Value = ctx
            .server
            .get("/reminders")
            .add_header(cookie_header(), ctx.cookie.clone())
            .await
            .json();
        assert!(queue["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_endpoint_archives_and_restores() {
        let ctx = context();

        let created = ctx
            .server
            .post("/")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({
                "name": "Spotify",
                "price": "10.99",
                "currency": "USD",
                "endAt": "2030-06-01T00:00:00Z"
            }))
            .await;
        let id = created.json::<serde_json::Value>()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let archived = ctx
            .server
            .patch(&format!("/{id}/status"))
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({ "status": "archived" }))
            .await;
        archived.assert_status_ok();
        assert_eq!(archived.json::<serde_json::Value>()["status"], "archived");

        // Archived records drop out of totals.
        let summary: serde_json::Value = ctx
            .server
            .get("/summary")
            .add_header(cookie_header(), ctx.cookie.clone())
            .await
            .json();
        assert!(summary["totals"].as_object().unwrap().is_empty());

        let restored = ctx
            .server
            .patch(&format!("/{id}/status"))
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({ "status": "active" }))
            .await;
        assert_eq!(restored.json::<serde_json::Value>()["status"], "active");
    }

    #[tokio::test]
    async fn import_rejects_malformed_timestamps() {
        let ctx = context();

        let response = ctx
            .server
            .post("/import")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({
                "subscriptions": [{
                    "id": Uuid::new_v4(),
                    "userId": Uuid::new_v4(),
                    "name": "Broken",
                    "price": "1.00",
                    "currency": "USD",
                    "endAt": "not-a-date",
                    "status": "active",
                    "createdAt": "2026-01-01T00:00:00Z",
                    "updatedAt": "2026-01-01T00:00:00Z"
                }],
                "settings": {
                    "reminderDaysBefore": 7,
                    "defaultCurrency": "USD",
                    "locale": "en",
                    "timezone": "UTC"
                }
            }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn export_then_import_roundtrip() {
        let ctx = context();

        ctx.server
            .post("/")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&json!({
                "name": "Keeper",
                "price": "3.50",
                "currency": "GBP",
                "endAt": "2030-03-03T00:00:00Z"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let exported: serde_json::Value = ctx
            .server
            .get("/export")
            .add_header(cookie_header(), ctx.cookie.clone())
            .await
            .json();
        assert_eq!(exported["subscriptions"].as_array().unwrap().len(), 1);

        let imported = ctx
            .server
            .post("/import")
            .add_header(cookie_header(), ctx.cookie.clone())
            .json(&exported)
            .await;
        imported.assert_status_ok();
        assert_eq!(imported.json::<serde_json::Value>()["imported"], 1);
    }
}
