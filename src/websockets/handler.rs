use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use tracing::{info, warn};

use crate::session::Session;
use crate::shared::AppState;

use super::socket::Connection;

/// WebSocket endpoint: `GET /ws`. Each upgraded connection becomes one
/// broker client with a server-assigned identifier.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, state: AppState) {
    let session = match Session::connect(state.broker.clone()).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Failed to register websocket client with broker");
            return;
        }
    };

    let client_id = session.client_id().to_string();
    info!(client_id = %client_id, "WebSocket connection established");

    let connection = Connection::new(session, Box::new(socket));

    // Run until disconnect; dropping the session inside `run` emits the
    // client's implicit leave
    match connection.run().await {
        Ok(()) => {
            info!(client_id = %client_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(client_id = %client_id, error = ?e, "WebSocket connection error");
        }
    }
}
