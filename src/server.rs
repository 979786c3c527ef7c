//! HTTP host for the plugin: the form page, WebSocket sessions and health.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Form, FromRequestParts, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::{QueryLensError, Result};
use crate::plugin::{Plugin, PluginDetails, PluginRequest, PluginResponse, QueryLensPlugin};
use crate::session::{LensRequest, LensResponse, MessageChannel};

type AppState = Arc<QueryLensPlugin>;

/// A session channel over an upgraded WebSocket.
pub struct WebSocketChannel {
    socket: WebSocket,
}

impl WebSocketChannel {
    pub fn new(socket: WebSocket) -> Self {
        WebSocketChannel { socket }
    }
}

#[async_trait]
impl MessageChannel for WebSocketChannel {
    async fn recv(&mut self) -> Result<Option<LensRequest>> {
        loop {
            let message = match self.socket.recv().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(QueryLensError::protocol(format!("read: {e}"))),
                None => return Ok(None),
            };
            match message {
                Message::Text(text) => return LensRequest::parse(text.as_str()).map(Some),
                Message::Binary(bytes) => {
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| QueryLensError::protocol(format!("read: {e}")))?;
                    return LensRequest::parse(text).map(Some);
                }
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
    }

    async fn send(&mut self, response: &LensResponse) -> Result<()> {
        self.socket
            .send(Message::Text(response.to_json()?.into()))
            .await
            .map_err(|e| QueryLensError::protocol(format!("write: {e}")))
    }
}

/// Routes for `plugin` mounted at `route`, plus `/health`.
pub fn router(plugin: Arc<QueryLensPlugin>, route: &str) -> Router {
    Router::new()
        .route(route, get(plugin_get).post(plugin_post))
        .route("/health", get(health))
        .with_state(plugin)
}

/// Serve until ctrl-c.
pub async fn serve(plugin: Arc<QueryLensPlugin>) -> Result<()> {
    let config = plugin.engine().config().server.clone();
    let app = router(plugin, &config.route);
    let listener = TcpListener::bind(config.bind.as_str()).await?;
    info!(bind = %config.bind, route = %config.route, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn plugin_get(
    State(plugin): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    let plugin_request = PluginRequest {
        params,
        form: HashMap::new(),
    };
    match plugin.handle(&plugin_request) {
        PluginResponse::Page(html) => Html(html).into_response(),
        PluginResponse::Stream { relevant } => {
            let (mut parts, _body) = request.into_parts();
            let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &plugin).await {
                Ok(upgrade) => upgrade,
                Err(rejection) => return rejection.into_response(),
            };
            upgrade.on_upgrade(move |socket| run_session(plugin, socket, relevant))
        }
    }
}

async fn plugin_post(
    State(plugin): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    match plugin.handle(&PluginRequest { params, form }) {
        PluginResponse::Page(html) => Html(html).into_response(),
        PluginResponse::Stream { .. } => (
            StatusCode::BAD_REQUEST,
            "streaming sessions must be opened with GET",
        )
            .into_response(),
    }
}

async fn run_session(plugin: AppState, socket: WebSocket, relevant: Vec<String>) {
    let session = plugin.engine().open_session(relevant);
    let mut channel = WebSocketChannel::new(socket);
    // Errors are logged by the session; the socket is closed on drop.
    let _ = session.run(&mut channel).await;
}

async fn health(State(plugin): State<AppState>) -> Json<PluginDetails> {
    Json(plugin.details())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LensConfig;
    use crate::resources::Resources;
    use crate::session::LensEngine;

    fn plugin() -> Arc<QueryLensPlugin> {
        let engine =
            LensEngine::new(LensConfig::default(), Arc::new(Resources::default())).unwrap();
        Arc::new(QueryLensPlugin::new(Arc::new(engine)))
    }

    #[tokio::test]
    async fn test_health() {
        let Json(details) = health(State(plugin())).await;
        assert_eq!(details.title, "QueryLens");
    }

    #[tokio::test]
    async fn test_post_renders_form() {
        let form = HashMap::from([("query".to_string(), "diabetes".to_string())]);
        let response = plugin_post(State(plugin()), Query(HashMap::new()), Form(form)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_without_upgrade_headers_is_rejected() {
        let params = HashMap::from([("lens".to_string(), "y".to_string())]);
        let request = axum::http::Request::builder()
            .uri("/plugin/querylens?lens=y")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = plugin_get(State(plugin()), Query(params), request).await;
        assert!(response.status().is_client_error());
    }
}
