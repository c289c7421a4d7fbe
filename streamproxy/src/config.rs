use clap::ValueEnum;

/// Hosts the proxy will fetch from unless overridden.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 2] = ["ft-hetzner.flowstreams.cx", "ftest.3045x.com"];
pub const DEFAULT_STREAM_ORIGIN: &str = "https://ft-hetzner.flowstreams.cx";
pub const DEFAULT_YOUTUBE_ORIGIN: &str = "https://www.youtube.com";
pub const DEFAULT_CORS_ORIGIN: &str = "*";

/// Deployment mode. Development also serves the path-prefix reverse proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Runtime configuration of the proxy server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub environment: Environment,
    pub allowed_hosts: Vec<String>,
    /// Value of `Access-Control-Allow-Origin` on relayed responses.
    pub cors_origin: String,
    /// Origin the upstream sees in `Origin`/`Referer`, and the target of `/stream/*`.
    pub stream_origin: String,
    /// Target of `/yt/*`.
    pub youtube_origin: String,
}

impl ProxyConfig {
    pub fn dev_routes_enabled(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            stream_origin: DEFAULT_STREAM_ORIGIN.to_string(),
            youtube_origin: DEFAULT_YOUTUBE_ORIGIN.to_string(),
        }
    }
}
