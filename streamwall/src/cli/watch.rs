use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{
    signal,
    sync::{mpsc, watch},
};
use url::Url;

use crate::playback::{
    ManifestProbeBackend, RetryConfig, SegmentGrabber, TokioScheduler, probe::DEFAULT_POLL_INTERVAL,
    retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES},
};
use crate::playlist::{Environment, ProxyUrlResolver, load_streams};
use crate::viewer::{DEFAULT_WIDTH, GridLayout, HELP, Viewer, ViewerCommand};

const DEFAULT_PROXY_BASE: &str = "http://localhost:3000/";

#[derive(Parser, Debug)]
pub struct WatchCommand {
    /// Playlist file (defaults to the bundled camera list)
    #[arg(long)]
    pub playlist: Option<PathBuf>,

    /// How stream URLs are routed through the proxy
    #[arg(long, value_enum, env = "STREAMWALL_ENV", default_value = "development")]
    pub environment: Environment,

    /// Base URL of the running proxy
    #[arg(long, default_value = DEFAULT_PROXY_BASE)]
    pub proxy_base: String,

    /// Retries per stream before it is marked as failed
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further one
    #[arg(long, default_value_t = DEFAULT_BASE_DELAY.as_millis() as u64)]
    pub retry_delay_ms: u64,

    /// Upper bound on a single retry delay (unbounded by default)
    #[arg(long)]
    pub max_retry_delay_ms: Option<u64>,

    /// Viewport width used to pick the number of grid columns
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Capture live previews for HLS tiles in grid view
    #[arg(long)]
    pub thumbnails: bool,
}

impl Default for WatchCommand {
    fn default() -> Self {
        Self {
            playlist: None,
            environment: Environment::default(),
            proxy_base: DEFAULT_PROXY_BASE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_retry_delay_ms: None,
            width: DEFAULT_WIDTH,
            thumbnails: false,
        }
    }
}

impl WatchCommand {
    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: self.max_retry_delay_ms.map(Duration::from_millis),
        }
    }

    pub async fn run(self) -> Result<()> {
        let proxy_base = Url::parse(&self.proxy_base)
            .with_context(|| format!("Invalid proxy base URL {}", self.proxy_base))?;
        let resolver = ProxyUrlResolver::new(self.environment);
        let streams = load_streams(self.playlist.as_deref(), &resolver).await?;

        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let backend = ManifestProbeBackend::new(
            client.clone(),
            proxy_base.clone(),
            DEFAULT_POLL_INTERVAL,
        );

        let mut viewer = Viewer::new(
            Arc::new(backend),
            Arc::new(TokioScheduler::current()),
            self.retry_config(),
        )
        .with_layout(GridLayout::for_width(self.width));
        if self.thumbnails {
            viewer = viewer.with_grabber(Arc::new(SegmentGrabber::new(
                client,
                proxy_base.clone(),
            )));
        }

        println!("Proxy: {proxy_base}");
        println!("{HELP}");
        viewer.load_streams(streams);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            let _ = shutdown_tx.send(true);
        });

        let mut last_view = String::new();
        viewer
            .run(spawn_console(), shutdown_rx, |viewer| {
                let view = viewer.render();
                if view != last_view {
                    println!("{view}");
                    last_view = view;
                }
            })
            .await;

        println!("\nDone.");
        Ok(())
    }
}

/// Read commands from stdin until EOF.
///
/// Runs on its own thread: a blocking stdin read cannot be cancelled and would
/// otherwise hold up runtime shutdown.
fn spawn_console() -> mpsc::Receiver<ViewerCommand> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match ViewerCommand::parse(&line) {
                Some(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command: {}\n{HELP}", line.trim()),
            }
        }
    });
    rx
}
