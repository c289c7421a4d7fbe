use std::collections::HashSet;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use url::Url;

use super::error::ProxyError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Hostnames the proxy may fetch from. Matching is exact and case-insensitive.
#[derive(Debug, Clone)]
pub struct Allowlist {
    hosts: HashSet<String>,
}

impl Allowlist {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.hosts.contains(&host.to_ascii_lowercase()))
    }
}

/**
    HTTP client for upstream fetches.

    Streaming responses must not hit a total request timeout, so only the
    connect phase is bounded.
*/
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    spoofed: HeaderMap,
}

impl Upstream {
    /// `origin` is presented to upstreams as the page the request came from.
    pub fn new(origin: &Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self {
            client,
            spoofed: spoofed_headers(origin)?,
        })
    }

    /// GET `url` with the spoofed `Origin`/`Referer` headers.
    pub async fn get_spoofed(&self, url: Url) -> Result<reqwest::Response, ProxyError> {
        self.send(url, self.spoofed.clone()).await
    }

    /// GET `url` with no extra headers.
    pub async fn get_plain(&self, url: Url) -> Result<reqwest::Response, ProxyError> {
        self.send(url, HeaderMap::new()).await
    }

    async fn send(&self, url: Url, headers: HeaderMap) -> Result<reqwest::Response, ProxyError> {
        tracing::debug!(%url, "Fetching upstream");
        Ok(self.client.get(url).headers(headers).send().await?)
    }
}

fn spoofed_headers(origin: &Url) -> anyhow::Result<HeaderMap> {
    let origin = origin.origin().ascii_serialization();
    let mut headers = HeaderMap::new();
    headers.insert(header::ORIGIN, HeaderValue::from_str(&origin)?);
    headers.insert(header::REFERER, HeaderValue::from_str(&format!("{origin}/"))?);
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(headers)
}

/// Turn an upstream response into ours: status, content type and a streamed
/// body, plus `extra` headers.
pub fn relay(upstream: reqwest::Response, extra: HeaderMap) -> Response {
    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    let mut response = (status, Body::from_stream(stream)).into_response();
    let headers = response.headers_mut();
    headers.extend(extra);
    headers.insert(header::CONTENT_TYPE, content_type);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_matches_exact_hosts() {
        let allowlist = Allowlist::new(["ft-hetzner.flowstreams.cx", " FTest.3045x.com "]);

        let allowed = |s: &str| allowlist.allows(&Url::parse(s).unwrap());
        assert!(allowed("https://ft-hetzner.flowstreams.cx/live/index.m3u8"));
        assert!(allowed("https://FTEST.3045x.com:8443/a"));
        assert!(!allowed("https://evil.example/x"));
        assert!(!allowed("https://sub.ftest.3045x.com/a"));
        assert!(!allowed("https://ftest.3045x.com.evil.example/a"));
    }

    #[test]
    fn test_spoofed_headers() {
        let origin = Url::parse("https://ft-hetzner.flowstreams.cx/some/page").unwrap();
        let headers = spoofed_headers(&origin).unwrap();
        assert_eq!(headers[header::ORIGIN], "https://ft-hetzner.flowstreams.cx");
        assert_eq!(headers[header::REFERER], "https://ft-hetzner.flowstreams.cx/");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    }
}
