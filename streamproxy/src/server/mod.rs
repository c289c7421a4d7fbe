pub mod dev;
pub mod error;
pub mod proxy;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, http::HeaderValue, routing::get};
use tokio::sync::watch;
use url::Url;

use crate::config::ProxyConfig;

use upstream::{Allowlist, Upstream};

/// Path of the production proxy endpoint.
pub const PROXY_PATH: &str = "/api/proxy";

#[derive(Clone)]
pub struct AppState {
    pub allowlist: Arc<Allowlist>,
    pub upstream: Upstream,
    pub cors_origin: HeaderValue,
    pub stream_origin: Url,
    pub youtube_origin: Url,
}

impl AppState {
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        let stream_origin = Url::parse(&config.stream_origin)
            .with_context(|| format!("Invalid stream origin {}", config.stream_origin))?;
        let youtube_origin = Url::parse(&config.youtube_origin)
            .with_context(|| format!("Invalid YouTube origin {}", config.youtube_origin))?;
        let cors_origin = HeaderValue::from_str(&config.cors_origin)
            .with_context(|| format!("Invalid CORS origin {}", config.cors_origin))?;

        Ok(Self {
            allowlist: Arc::new(Allowlist::new(&config.allowed_hosts)),
            upstream: Upstream::new(&stream_origin)?,
            cors_origin,
            stream_origin,
            youtube_origin,
        })
    }
}

/// Build the router. The reverse proxy routes exist only in development.
pub fn router(state: AppState, config: &ProxyConfig) -> Router {
    let mut app = Router::new().route(
        PROXY_PATH,
        get(proxy::proxy_get).options(proxy::proxy_options),
    );

    if config.dev_routes_enabled() {
        app = app
            .route("/stream/{*path}", get(dev::stream))
            .route("/yt/{*path}", get(dev::youtube));
    }

    app.with_state(state)
}

/// Run the HTTP server.
pub async fn run_server(
    addr: SocketAddr,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;

    use axum::{
        Json, Router,
        body::Body,
        http::{HeaderMap, StatusCode, header},
        response::{IntoResponse, Response},
        routing::get,
    };
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::Environment;

    async fn playlist() -> impl IntoResponse {
        (
            [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
            "#EXTM3U\n#EXT-X-VERSION:3\n",
        )
    }

    async fn untyped() -> Response {
        Response::new(Body::from("raw bytes"))
    }

    async fn echo_headers(headers: HeaderMap) -> Json<serde_json::Value> {
        let get = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(serde_json::json!({
            "origin": get(header::ORIGIN),
            "referer": get(header::REFERER),
            "cache_control": get(header::CACHE_CONTROL),
        }))
    }

    async fn broken() -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    /// Start a fake stream origin on a random local port.
    pub async fn spawn_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/live/index.m3u8", get(playlist))
            .route("/raw", get(untyped))
            .route("/headers", get(echo_headers))
            .route("/broken", get(broken));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Config that allows the local upstream and points the dev routes at it.
    pub fn local_config(upstream: SocketAddr, environment: Environment) -> ProxyConfig {
        ProxyConfig {
            environment,
            allowed_hosts: vec!["127.0.0.1".to_string()],
            stream_origin: format!("http://{upstream}"),
            youtube_origin: format!("http://{upstream}"),
            ..ProxyConfig::default()
        }
    }

    pub fn app(config: &ProxyConfig) -> Router {
        router(AppState::new(config).unwrap(), config)
    }

    pub async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
