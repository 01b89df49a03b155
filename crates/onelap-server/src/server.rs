use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use onelap_registry::SessionRegistry;

use crate::client::{self, ClientId, ClientRegistry};
use crate::handlers::HandlerState;
use crate::pages;
use crate::validator::StructuralValidator;

/// Server configuration.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    /// Reject structurally invalid payloads. Off by default: payloads
    /// are opaque and relayed verbatim.
    pub validation: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            max_send_queue: 256,
            validation: false,
        }
    }
}

impl ServerConfig {
    /// Base of the shareable dashboard locators handed to monitors.
    pub fn public_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler_state: Arc<HandlerState>,
    pub message_tx: mpsc::Sender<(ClientId, String)>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/dashboard/{session_id}", get(pages::dashboard))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps the
/// background tasks alive.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(SessionRegistry::new());
    let clients = Arc::new(ClientRegistry::new(config.max_send_queue));

    let _cleanup = client::start_cleanup_task(
        Arc::clone(&clients),
        std::time::Duration::from_secs(60),
    );

    let (msg_tx, msg_rx) = mpsc::channel::<(ClientId, String)>(1024);

    let mut handler_state = HandlerState::new(
        Arc::clone(&registry),
        Arc::clone(&clients),
        config.public_base_url(),
    );
    if config.validation {
        handler_state = handler_state.with_validator(Arc::new(StructuralValidator));
    }
    let handler_state = Arc::new(handler_state);

    // All inbound events drain through one task, so joins, publishes and
    // their broadcasts are processed in arrival order.
    let processor_state = Arc::clone(&handler_state);
    let processor = tokio::spawn(process_messages(msg_rx, processor_state));

    let app_state = AppState {
        handler_state,
        message_tx: msg_tx,
    };

    let router = build_router(app_state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), validation = config.validation, "Server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _processor: processor,
        _cleanup,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _processor: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, rx) = state.handler_state.clients.register();
    tracing::info!(client_id = %client_id, "WebSocket client connected");

    client::handle_ws_connection(
        socket,
        client_id,
        rx,
        Arc::clone(&state.handler_state.clients),
        state.message_tx,
    )
    .await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.handler_state.registry.len(),
        "clients": state.handler_state.clients.count(),
    }))
}

/// Drain inbound client messages in arrival order.
async fn process_messages(
    mut rx: mpsc::Receiver<(ClientId, String)>,
    state: Arc<HandlerState>,
) {
    while let Some((client_id, raw)) = rx.recv().await {
        crate::handlers::dispatch(&state, &client_id, &raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0, // random port
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = start(test_config()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn index_page_is_served() {
        let handle = start(test_config()).await.unwrap();

        let url = format!("http://127.0.0.1:{}/", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body = resp.text().await.unwrap();
        assert!(body.contains("1Lap Race Dashboard Server"));
    }

    #[tokio::test]
    async fn dashboard_page_embeds_session_id() {
        let handle = start(test_config()).await.unwrap();
        let id = onelap_core::ids::SessionId::new();

        let url = format!("http://127.0.0.1:{}/dashboard/{id}", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.text().await.unwrap().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn dashboard_page_rejects_malformed_ids() {
        let handle = start(test_config()).await.unwrap();

        let url = format!("http://127.0.0.1:{}/dashboard/not-a-session", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[test]
    fn build_router_creates_routes() {
        let registry = Arc::new(SessionRegistry::new());
        let clients = Arc::new(ClientRegistry::new(32));
        let handler_state = Arc::new(HandlerState::new(registry, clients, "http://0.0.0.0:5000"));
        let (msg_tx, _msg_rx) = mpsc::channel(32);

        let state = AppState {
            handler_state,
            message_tx: msg_tx,
        };

        let _router = build_router(state);
    }

    #[test]
    fn public_base_url_format() {
        let config = ServerConfig::default();
        assert_eq!(config.public_base_url(), "http://0.0.0.0:5000");
    }
}
