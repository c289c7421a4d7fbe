use std::time::Duration;

use tokio::task::JoinHandle;
use url::Url;

use crate::playlist::StreamDescriptor;

use super::session::{Player, PlayerBackend, PlayerError, PlayerEvents};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const PLAYLIST_TAG: &str = "#EXTM3U";

/**
    Headless players that poll stream URLs through the proxy.

    Proxied URLs are relative (`/api/proxy?...`, `/stream/...`), so they are
    joined onto the proxy's base URL.
*/
#[derive(Debug, Clone)]
pub struct ManifestProbeBackend {
    client: reqwest::Client,
    base_url: Url,
    poll_interval: Duration,
}

impl ManifestProbeBackend {
    pub fn new(client: reqwest::Client, base_url: Url, poll_interval: Duration) -> Self {
        Self {
            client,
            base_url,
            poll_interval,
        }
    }
}

impl PlayerBackend for ManifestProbeBackend {
    fn create(&self, descriptor: &StreamDescriptor) -> Box<dyn Player> {
        Box::new(ManifestProbe {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            poll_interval: self.poll_interval,
            expect_playlist: descriptor.is_hls(),
            task: None,
        })
    }
}

/**
    A player that keeps fetching its URL instead of decoding it.

    Reports ready on the first good response and an error on the first bad
    one, after which it stops polling until reloaded.
*/
pub struct ManifestProbe {
    client: reqwest::Client,
    base_url: Url,
    poll_interval: Duration,
    expect_playlist: bool,
    task: Option<JoinHandle<()>>,
}

impl Player for ManifestProbe {
    fn load(&mut self, url: &str, events: PlayerEvents) -> Result<(), PlayerError> {
        let target = self.base_url.join(url).map_err(|e| PlayerError::Load {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let client = self.client.clone();
        let interval = self.poll_interval;
        let expect_playlist = self.expect_playlist;

        self.task = Some(tokio::spawn(async move {
            let mut ready = false;
            loop {
                match fetch(&client, &target, expect_playlist).await {
                    Ok(()) => {
                        if !ready {
                            ready = true;
                            events.ready();
                        }
                    }
                    Err(e) => {
                        events.error(e.to_string());
                        return;
                    }
                }
                tokio::time::sleep(interval).await;
            }
        }));
        Ok(())
    }

    // Nothing is decoded, so there is no audio to mute.
    fn set_muted(&mut self, _muted: bool) {}

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ManifestProbe {
    fn drop(&mut self) {
        self.release();
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &Url,
    expect_playlist: bool,
) -> Result<(), PlayerError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| PlayerError::Playback(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PlayerError::Playback(format!("HTTP {status}")));
    }

    if expect_playlist {
        let body = response
            .text()
            .await
            .map_err(|e| PlayerError::Playback(format!("failed to read playlist: {e}")))?;
        if !body.trim_start().starts_with(PLAYLIST_TAG) {
            return Err(PlayerError::Playback("response is not an HLS playlist".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::*;
    use crate::playback::session::SessionEvent;
    use crate::playlist::{StreamKey, StreamKind};

    async fn spawn_upstream() -> Url {
        let app = Router::new()
            .route(
                "/stream/live/index.m3u8",
                get(|| async { "#EXTM3U\n#EXT-X-VERSION:3\nseg1.ts\n" }),
            )
            .route("/stream/html/index.m3u8", get(|| async { "<html></html>" }))
            .route(
                "/stream/gone/index.m3u8",
                get(|| async { (StatusCode::NOT_FOUND, "gone") }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn descriptor(path: &str) -> StreamDescriptor {
        StreamDescriptor {
            title: path.to_string(),
            original_url: format!("https://ftest.3045x.com{path}"),
            proxied_url: format!("/stream{path}"),
            kind: StreamKind::Hls,
        }
    }

    async fn probe(path: &str) -> SessionEvent {
        let base = spawn_upstream().await;
        let backend =
            ManifestProbeBackend::new(reqwest::Client::new(), base, Duration::from_secs(60));
        let descriptor = descriptor(path);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut player = backend.create(&descriptor);
        player
            .load(
                &descriptor.proxied_url,
                PlayerEvents::new(descriptor.key(), 1, tx),
            )
            .unwrap();
        let event = rx.recv().await.unwrap();
        player.release();
        event
    }

    #[tokio::test]
    async fn test_live_playlist_reports_ready() {
        let event = probe("/live/index.m3u8").await;
        assert_eq!(
            event,
            SessionEvent::Ready {
                key: StreamKey::new("/stream/live/index.m3u8"),
                generation: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_playlist_reports_error() {
        let event = probe("/gone/index.m3u8").await;
        match event {
            SessionEvent::Error { reason, .. } => assert!(reason.contains("404")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_playlist_body_reports_error() {
        let event = probe("/html/index.m3u8").await;
        assert!(matches!(event, SessionEvent::Error { .. }));
    }
}
