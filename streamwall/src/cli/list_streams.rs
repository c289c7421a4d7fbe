use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::playlist::{Environment, ProxyUrlResolver, load_streams};

#[derive(Parser, Debug)]
pub struct ListStreamsCommand {
    /// Playlist file (defaults to the bundled camera list)
    #[arg(long)]
    pub playlist: Option<PathBuf>,

    /// How stream URLs are routed through the proxy
    #[arg(long, value_enum, env = "STREAMWALL_ENV", default_value = "development")]
    pub environment: Environment,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl ListStreamsCommand {
    pub async fn run(self) -> Result<()> {
        let resolver = ProxyUrlResolver::new(self.environment);
        let streams = load_streams(self.playlist.as_deref(), &resolver).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&streams)?);
            return Ok(());
        }

        println!("Streams ({}):", streams.len());
        for (i, stream) in streams.iter().enumerate() {
            println!(
                "  {:>2}. [{}] {}\n      {}",
                i + 1,
                stream.kind.label(),
                stream.title,
                stream.proxied_url
            );
        }
        Ok(())
    }
}
