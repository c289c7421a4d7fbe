//! Path-prefix reverse proxy for local development.
//!
//! `/stream/<path>` goes to the stream origin with the spoofed headers,
//! `/yt/<path>` goes to YouTube as-is.

use axum::{
    extract::{Path, RawQuery, State},
    http::HeaderMap,
    response::Response,
};
use url::Url;

use super::AppState;
use super::error::ProxyError;
use super::upstream::relay;

/// `origin` with its path and query replaced.
fn rewrite(origin: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = origin.clone();
    url.set_path(path);
    url.set_query(query);
    url
}

pub async fn stream(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    let url = rewrite(&state.stream_origin, &path, query.as_deref());
    let upstream = state.upstream.get_spoofed(url).await?;
    Ok(relay(upstream, HeaderMap::new()))
}

pub async fn youtube(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    let url = rewrite(&state.youtube_origin, &path, query.as_deref());
    let upstream = state.upstream.get_plain(url).await?;
    Ok(relay(upstream, HeaderMap::new()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Environment;
    use crate::server::testing::{app, body_string, local_config, spawn_upstream};

    async fn get(app: axum::Router, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap()
    }

    #[test]
    fn test_rewrite_keeps_origin_host() {
        let origin = Url::parse("https://ft-hetzner.flowstreams.cx").unwrap();
        assert_eq!(
            rewrite(&origin, "cam1/index.m3u8", Some("token=abc")).as_str(),
            "https://ft-hetzner.flowstreams.cx/cam1/index.m3u8?token=abc"
        );
        assert_eq!(
            rewrite(&origin, "//evil.example/x", None).host_str(),
            Some("ft-hetzner.flowstreams.cx")
        );
    }

    #[tokio::test]
    async fn test_stream_prefix_forwards_with_spoofed_headers() {
        let upstream = spawn_upstream().await;
        let app = app(&local_config(upstream, Environment::Development));

        let response = get(app.clone(), "/stream/live/index.m3u8").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.apple.mpegurl"
        );
        assert!(body_string(response).await.starts_with("#EXTM3U"));

        let response = get(app, "/stream/headers").await;
        let seen: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(seen["referer"], format!("http://{upstream}/"));
    }

    #[tokio::test]
    async fn test_youtube_prefix_sends_no_spoofed_headers() {
        let upstream = spawn_upstream().await;
        let app = app(&local_config(upstream, Environment::Development));

        let response = get(app, "/yt/headers?v=abc").await;
        assert_eq!(response.status(), StatusCode::OK);
        let seen: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(seen["origin"].is_null());
        assert!(seen["referer"].is_null());
    }

    #[tokio::test]
    async fn test_upstream_status_is_relayed() {
        let upstream = spawn_upstream().await;
        let app = app(&local_config(upstream, Environment::Development));

        let response = get(app, "/stream/broken").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unreachable_origin() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed = listener.local_addr().unwrap();
        drop(listener);
        let app = app(&local_config(closed, Environment::Development));

        let response = get(app, "/stream/live/index.m3u8").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
