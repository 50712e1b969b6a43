mod event;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = state::Config::from_env();
    let app_state = state::AppState::new(config);

    // Spawn the guest-session expiry sweeper.
    let _sweeper = services::sweeper::spawn_sweeper_task(app_state.clone());

    let app = routes::app(app_state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "jamroom listening");
    axum::serve(listener, app).await.expect("server failed");
}
