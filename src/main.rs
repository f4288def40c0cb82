use axum::{routing::get, Router};
use chrono::Duration as TtlDuration;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sketchroom::config::Config;
use sketchroom::room::{start_cleanup_task, CleanupConfig, RegistrySettings, RoomRegistry};
use sketchroom::shared::AppState;
use sketchroom::websockets::websocket_handler;
use sketchroom::{Broker, InMemoryRouter, JsonFileStore};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sketchroom session broker");

    let config = Config::from_env();

    // Restore the registry from the persisted snapshot; it is the source of
    // truth across restarts
    let store = Arc::new(JsonFileStore::new(&config.snapshot_path));
    let settings = RegistrySettings {
        capacity: config.room_capacity,
        room_ttl: TtlDuration::from_std(config.room_ttl).expect("room TTL out of range"),
    };
    let registry = Arc::new(
        RoomRegistry::restore(store, settings)
            .await
            .expect("Failed to restore room registry"),
    );

    let router = Arc::new(InMemoryRouter::new());
    let (broker, broker_handle) = Broker::new(registry.clone(), router);
    tokio::spawn(broker.run());

    // Background sweep for expired rooms
    tokio::spawn(start_cleanup_task(
        registry,
        CleanupConfig {
            sweep_interval: config.cleanup_interval,
        },
    ));

    let app_state = AppState::new(broker_handle);

    // build our application: the websocket endpoint plus a liveness probe
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap();
    info!(addr = %config.bind_addr, "Server running");
    axum::serve(listener, app).await.unwrap();
}
