use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tokio::{signal, sync::watch};

use crate::config::{
    DEFAULT_ALLOWED_HOSTS, DEFAULT_CORS_ORIGIN, DEFAULT_STREAM_ORIGIN, DEFAULT_YOUTUBE_ORIGIN,
    Environment, ProxyConfig,
};
use crate::server::{AppState, PROXY_PATH};

#[derive(Parser, Debug)]
#[command(name = "streamproxy")]
#[command(about = "CORS and referrer proxy for the stream wall")]
pub struct ServeCommand {
    /// HTTP server port
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Development also serves the /stream and /yt reverse proxy
    #[arg(long, value_enum, env = "STREAMWALL_ENV", default_value = "development")]
    pub environment: Environment,

    /// Upstream host the proxy may fetch from (repeatable)
    #[arg(long = "allow-host", default_values_t = DEFAULT_ALLOWED_HOSTS.map(String::from))]
    pub allowed_hosts: Vec<String>,

    /// Access-Control-Allow-Origin sent with proxied responses
    #[arg(long, default_value = DEFAULT_CORS_ORIGIN)]
    pub cors_origin: String,

    /// Origin presented to upstreams, and target of /stream
    #[arg(long, default_value = DEFAULT_STREAM_ORIGIN)]
    pub stream_origin: String,

    /// Target of /yt
    #[arg(long, default_value = DEFAULT_YOUTUBE_ORIGIN)]
    pub youtube_origin: String,
}

impl ServeCommand {
    fn config(&self) -> ProxyConfig {
        ProxyConfig {
            environment: self.environment,
            allowed_hosts: self.allowed_hosts.clone(),
            cors_origin: self.cors_origin.clone(),
            stream_origin: self.stream_origin.clone(),
            youtube_origin: self.youtube_origin.clone(),
        }
    }

    pub async fn run(self) -> Result<()> {
        // Shutdown signal
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let config = self.config();
        let state = AppState::new(&config)?;
        let app = crate::server::router(state, &config);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        println!();
        println!("Proxy listening on http://localhost:{}{}", self.port, PROXY_PATH);
        println!("  Allowed hosts: {}", config.allowed_hosts.join(", "));
        if config.dev_routes_enabled() {
            println!("  /stream -> {}", config.stream_origin);
            println!("  /yt     -> {}", config.youtube_origin);
        }
        println!();

        let server_handle = tokio::spawn(async move {
            if let Err(e) = crate::server::run_server(addr, app, shutdown_rx).await {
                tracing::error!(error = %e, "Server error");
            }
        });

        // Wait for Ctrl+C
        signal::ctrl_c().await?;
        println!("\nShutting down...");
        let _ = shutdown_tx.send(true);
        let _ = server_handle.await;

        println!("Done.");
        Ok(())
    }
}
