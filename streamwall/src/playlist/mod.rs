pub mod parser;
pub mod resolver;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};

pub use parser::parse_playlist;
pub use resolver::{Environment, ProxyUrlResolver};
pub use types::{StreamDescriptor, StreamKey, StreamKind};

/// Camera feeds shipped with the binary.
const BUNDLED_PLAYLIST: &str = include_str!("../../assets/playlist.m3u8");

/**
    Load stream descriptors from a playlist file, or the bundled playlist when
    no path is given.
*/
pub async fn load_streams(
    path: Option<&Path>,
    resolver: &ProxyUrlResolver,
) -> Result<Vec<StreamDescriptor>> {
    let content = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read playlist {}", path.display()))?,
        None => BUNDLED_PLAYLIST.to_string(),
    };

    let streams = parse_playlist(&content, resolver);
    tracing::info!(
        count = streams.len(),
        environment = ?resolver.environment(),
        "Loaded playlist"
    );
    Ok(streams)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_playlist() {
        let resolver = ProxyUrlResolver::new(Environment::Production);
        let streams = parse_playlist(BUNDLED_PLAYLIST, &resolver);
        assert_eq!(streams.len(), 24);
        assert_eq!(streams[0].title, "Director Mode");
        assert_eq!(streams[23].title, "Confessional");
        assert!(streams.iter().all(|s| s.proxied_url.starts_with("/api/proxy?url=")));
    }

    #[tokio::test]
    async fn test_missing_playlist_file() {
        let resolver = ProxyUrlResolver::new(Environment::Development);
        let err = load_streams(Some(Path::new("/nonexistent/playlist.m3u8")), &resolver)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read playlist"));
    }
}
