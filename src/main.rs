use dotenvy::dotenv;
use tracing::info;

use std::net::SocketAddr;
use subtrack::infra::{app::create_app, setup::init_app_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    // Read bind address from config before moving app_state
    let bind_addr = app_state.config.bind_addr;

    spawn_reminder_poll(app_state.clone());

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn spawn_reminder_poll(app_state: subtrack::adapters::http::app_state::AppState) {
    let poll_every = app_state.config.reminder_poll_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(poll_every.max(1)));
        loop {
            interval.tick().await;
            if let Err(err) = app_state.reminder_use_cases.dispatch_due().await {
                tracing::error!(error = %err, "reminder dispatch failed");
            }
        }
    });
}
