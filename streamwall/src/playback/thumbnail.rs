use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

use crate::playlist::StreamDescriptor;

use super::session::PlayerError;

/// How often a visible tile refreshes its preview.
pub const CAPTURE_INTERVAL: Duration = Duration::from_millis(5000);

const PLAYLIST_TAG: &str = "#EXTM3U";
const MAX_PLAYLIST_DEPTH: usize = 2;

/// A captured preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub data: Arc<Vec<u8>>,
    pub content_type: String,
}

/// Source of preview captures.
#[async_trait]
pub trait FrameGrabber: Send + Sync {
    /// Attach to `url`, capture one preview and release everything it
    /// acquired before returning.
    async fn capture(&self, url: &str) -> Result<Snapshot, PlayerError>;
}

/// What a tile should show as its preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    /// Remote still image, already cache-busted.
    Static(String),
    Captured(Snapshot),
    Loading,
}

/**
    Preview lifecycle for one grid tile.

    Capturing only runs while the tile is visible: the first capture starts
    right away, then one every [`CAPTURE_INTERVAL`]. Hiding the tile or
    dropping the session stops the task and forgets the last capture.
*/
pub struct ThumbnailSession {
    descriptor: StreamDescriptor,
    grabber: Arc<dyn FrameGrabber>,
    interval: Duration,
    latest: watch::Sender<Option<Snapshot>>,
    task: Option<JoinHandle<()>>,
    visible: bool,
}

impl ThumbnailSession {
    pub fn new(descriptor: StreamDescriptor, grabber: Arc<dyn FrameGrabber>) -> Self {
        Self::with_interval(descriptor, grabber, CAPTURE_INTERVAL)
    }

    pub fn with_interval(
        descriptor: StreamDescriptor,
        grabber: Arc<dyn FrameGrabber>,
        interval: Duration,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            descriptor,
            grabber,
            interval,
            latest,
            task: None,
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.latest.subscribe()
    }

    pub fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;

        if visible {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn thumbnail(&self) -> Thumbnail {
        if let Some(url) = self.descriptor.snapshot_url() {
            return Thumbnail::Static(cache_busted(url));
        }
        match self.latest.borrow().as_ref() {
            Some(snapshot) => Thumbnail::Captured(snapshot.clone()),
            None => Thumbnail::Loading,
        }
    }

    fn start(&mut self) {
        if !self.descriptor.is_hls() {
            return;
        }

        let grabber = Arc::clone(&self.grabber);
        let latest = self.latest.clone();
        let url = self.descriptor.proxied_url.clone();
        let title = self.descriptor.title.clone();
        let period = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match grabber.capture(&url).await {
                    Ok(snapshot) => {
                        tracing::debug!(stream = %title, bytes = snapshot.data.len(), "Captured preview");
                        latest.send_replace(Some(snapshot));
                    }
                    Err(e) => {
                        tracing::warn!(stream = %title, error = %e, "Preview capture failed");
                    }
                }
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.latest.send_replace(None);
    }
}

impl Drop for ThumbnailSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn cache_busted(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}t={}", chrono::Utc::now().timestamp_millis())
}

/**
    Grabs the newest media segment of an HLS stream as its preview source.

    Master playlists are followed to their last variant. Decoding the segment
    into an image is left to whoever displays it.
*/
#[derive(Debug, Clone)]
pub struct SegmentGrabber {
    client: reqwest::Client,
    base_url: Url,
}

impl SegmentGrabber {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response, PlayerError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PlayerError::Playback(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(PlayerError::Playback(format!("HTTP {}", response.status())));
        }
        Ok(response)
    }
}

#[async_trait]
impl FrameGrabber for SegmentGrabber {
    async fn capture(&self, url: &str) -> Result<Snapshot, PlayerError> {
        let mut playlist_url = self.base_url.join(url).map_err(|e| PlayerError::Load {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        for _ in 0..MAX_PLAYLIST_DEPTH {
            let body = self
                .get(&playlist_url)
                .await?
                .text()
                .await
                .map_err(|e| PlayerError::Playback(format!("failed to read playlist: {e}")))?;
            if !body.trim_start().starts_with(PLAYLIST_TAG) {
                return Err(PlayerError::Playback("response is not an HLS playlist".to_string()));
            }

            let uri = last_uri(&body)
                .ok_or_else(|| PlayerError::Playback("playlist has no entries".to_string()))?;
            let target = playlist_url
                .join(uri)
                .map_err(|e| PlayerError::Playback(format!("bad playlist entry {uri}: {e}")))?;

            if is_variant_playlist(&body) {
                playlist_url = target;
                continue;
            }

            let response = self.get(&target).await?;
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("video/mp2t")
                .to_string();
            let data = response
                .bytes()
                .await
                .map_err(|e| PlayerError::Playback(format!("failed to read segment: {e}")))?;
            return Ok(Snapshot {
                data: Arc::new(data.to_vec()),
                content_type,
            });
        }

        Err(PlayerError::Playback("too many nested playlists".to_string()))
    }
}

fn last_uri(playlist: &str) -> Option<&str> {
    playlist
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty() && !l.starts_with('#'))
}

fn is_variant_playlist(playlist: &str) -> bool {
    playlist.lines().any(|l| l.starts_with("#EXT-X-STREAM-INF"))
}
