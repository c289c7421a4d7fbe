use clap::ValueEnum;
use url::{Url, form_urlencoded};

/// Same-origin proxy endpoint used in production.
pub const PROXY_ENDPOINT: &str = "/api/proxy";
/// Dev-server prefix for YouTube pages.
pub const YOUTUBE_PREFIX: &str = "/yt";
/// Dev-server prefix for everything else.
pub const STREAM_PREFIX: &str = "/stream";

/// Deployment mode, selects how stream URLs are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/**
    Maps origin stream URLs to paths served by the proxy.

    Never fails: malformed input is passed through unchanged.
*/
#[derive(Debug, Clone, Copy)]
pub struct ProxyUrlResolver {
    environment: Environment,
}

impl ProxyUrlResolver {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn resolve(&self, original_url: &str) -> String {
        let url = match Url::parse(original_url) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => url,
            Ok(_) => {
                tracing::warn!(url = original_url, "URL has no host, leaving it unproxied");
                return original_url.to_string();
            }
            Err(e) => {
                tracing::warn!(url = original_url, error = %e, "Invalid URL, leaving it unproxied");
                return original_url.to_string();
            }
        };

        match self.environment {
            Environment::Production => {
                let query: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("url", original_url)
                    .finish();
                format!("{PROXY_ENDPOINT}?{query}")
            }
            Environment::Development => {
                let mut proxied = String::new();
                if is_youtube_host(&url) {
                    proxied.push_str(YOUTUBE_PREFIX);
                    proxied.push_str(url.path());
                    push_query(&mut proxied, &url);
                } else {
                    proxied.push_str(STREAM_PREFIX);
                    proxied.push_str(url.path());
                    push_query(&mut proxied, &url);
                    if let Some(fragment) = url.fragment() {
                        proxied.push('#');
                        proxied.push_str(fragment);
                    }
                }
                proxied
            }
        }
    }
}

pub(crate) fn is_youtube_host(url: &Url) -> bool {
    url.host_str().is_some_and(|h| h.contains("youtube.com"))
}

fn push_query(out: &mut String, url: &Url) {
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        out.push('?');
        out.push_str(query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_routes_through_api_proxy() {
        let resolver = ProxyUrlResolver::new(Environment::Production);
        assert_eq!(
            resolver.resolve("https://ftest.3045x.com/d678xcnkn2slngkx/index.m3u8"),
            "/api/proxy?url=https%3A%2F%2Fftest.3045x.com%2Fd678xcnkn2slngkx%2Findex.m3u8"
        );
    }

    #[test]
    fn test_production_encodes_query_and_fragment() {
        let resolver = ProxyUrlResolver::new(Environment::Production);
        let proxied = resolver.resolve("https://ftest.3045x.com/a.m3u8?x=1&y=2#frag");
        let (_, query) = proxied.split_once('?').unwrap();
        let url: Vec<_> = form_urlencoded::parse(query.as_bytes()).collect();
        assert_eq!(url.len(), 1);
        assert_eq!(url[0].0, "url");
        assert_eq!(url[0].1, "https://ftest.3045x.com/a.m3u8?x=1&y=2#frag");
    }

    #[test]
    fn test_development_stream_prefix_keeps_path_query_fragment() {
        let resolver = ProxyUrlResolver::new(Environment::Development);
        assert_eq!(
            resolver.resolve("https://ftest.3045x.com/cam/index.m3u8?token=abc#live"),
            "/stream/cam/index.m3u8?token=abc#live"
        );
    }

    #[test]
    fn test_development_youtube_prefix_drops_fragment() {
        let resolver = ProxyUrlResolver::new(Environment::Development);
        assert_eq!(
            resolver.resolve("https://www.youtube.com/watch?v=abc123#t=10"),
            "/yt/watch?v=abc123"
        );
    }

    #[test]
    fn test_malformed_urls_pass_through() {
        for environment in [Environment::Development, Environment::Production] {
            let resolver = ProxyUrlResolver::new(environment);
            for input in ["not a url", "", "http://", "data:text/plain,hello", "/relative/path"] {
                assert_eq!(resolver.resolve(input), input, "{environment:?} {input:?}");
            }
        }
    }
}
