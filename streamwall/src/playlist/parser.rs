use url::Url;

use super::resolver::{ProxyUrlResolver, is_youtube_host};
use super::types::{StreamDescriptor, StreamKind};

const EXTINF_PREFIX: &str = "#EXTINF:";
const URL_PREFIX: &str = "http";

/**
    Parse an extended M3U playlist into stream descriptors.

    Each `#EXTINF:<duration>,<title>` line names the URL line that follows it.
    The title is everything after the first comma, so commas inside a title are
    kept.
    Lines that are neither are skipped, so this never fails.
*/
pub fn parse_playlist(content: &str, resolver: &ProxyUrlResolver) -> Vec<StreamDescriptor> {
    let mut streams = Vec::new();
    let mut pending_title: Option<String> = None;

    for line in content.split('\n') {
        let line = line.trim_end();

        if let Some(info) = line.strip_prefix(EXTINF_PREFIX) {
            let title = info
                .split_once(',')
                .map(|(_, title)| title.trim())
                .unwrap_or_default();
            pending_title = Some(title.to_string());
        } else if line.starts_with(URL_PREFIX) {
            let original_url = line.trim().to_string();
            let title = pending_title.take().unwrap_or_default();
            streams.push(StreamDescriptor {
                title,
                proxied_url: resolver.resolve(&original_url),
                kind: classify(&original_url),
                original_url,
            });
        }
    }

    streams
}

fn classify(original_url: &str) -> StreamKind {
    match Url::parse(original_url) {
        Ok(url) if is_youtube_host(&url) => StreamKind::YouTube {
            snapshot_url: youtube_snapshot_url(&url),
        },
        _ => StreamKind::Hls,
    }
}

/// Still image published for a YouTube video (`v` query parameter).
fn youtube_snapshot_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, id)| id.into_owned())
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://img.youtube.com/vi/{id}/0.jpg"))
}
