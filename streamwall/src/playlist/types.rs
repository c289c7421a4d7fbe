use std::fmt;

use serde::Serialize;

/// Identity of a stream: its proxied URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    pub fn new(proxied_url: impl Into<String>) -> Self {
        Self(proxied_url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of player a stream needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamKind {
    YouTube { snapshot_url: Option<String> },
    Hls,
}

impl StreamKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::YouTube { .. } => "youtube",
            Self::Hls => "hls",
        }
    }
}

/// A stream entry from the playlist. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    pub title: String,
    pub original_url: String,
    pub proxied_url: String,
    pub kind: StreamKind,
}

impl StreamDescriptor {
    pub fn key(&self) -> StreamKey {
        StreamKey::new(&self.proxied_url)
    }

    /// Static preview image, if the stream kind publishes one.
    pub fn snapshot_url(&self) -> Option<&str> {
        match &self.kind {
            StreamKind::YouTube { snapshot_url } => snapshot_url.as_deref(),
            StreamKind::Hls => None,
        }
    }

    /// HLS streams are polled as playlists and previewed from their own segments.
    pub fn is_hls(&self) -> bool {
        matches!(self.kind, StreamKind::Hls)
    }
}
