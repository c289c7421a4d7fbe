use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use url::{Url, form_urlencoded};

use super::AppState;
use super::error::ProxyError;
use super::upstream::relay;

fn cors_headers(origin: &HeaderValue) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers
}

/// Extract the single `url` parameter as an absolute http(s) URL.
fn target_url(query: Option<&str>) -> Result<Url, ProxyError> {
    let mut values = form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(name, _)| name == "url")
        .map(|(_, value)| value);

    let (Some(raw), None) = (values.next(), values.next()) else {
        return Err(ProxyError::InvalidUrl);
    };
    let url = Url::parse(&raw).map_err(|_| ProxyError::InvalidUrl)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ProxyError::InvalidUrl),
    }
}

/// `GET /api/proxy?url=...`
pub async fn proxy_get(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    let target = target_url(query.as_deref())?;
    if !state.allowlist.allows(&target) {
        tracing::warn!(host = target.host_str().unwrap_or_default(), "Rejected host");
        return Err(ProxyError::ForbiddenDomain);
    }

    let upstream = state.upstream.get_spoofed(target).await?;
    if !upstream.status().is_success() {
        tracing::warn!(status = %upstream.status(), url = %upstream.url(), "Upstream refused");
        return Err(ProxyError::upstream(upstream.status()));
    }

    Ok(relay(upstream, cors_headers(&state.cors_origin)))
}

/// CORS preflight.
pub async fn proxy_options(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, cors_headers(&state.cors_origin))
}
