use anyhow::Result;
use clap::{Parser, Subcommand};

mod list_streams;
mod watch;

pub use list_streams::ListStreamsCommand;
pub use watch::WatchCommand;

#[derive(Parser, Debug)]
#[command(name = "streamwall")]
#[command(about = "Grid viewer for live HLS and YouTube streams")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the stream wall in the terminal (default)
    Watch(WatchCommand),
    /// Print the parsed playlist and exit
    ListStreams(ListStreamsCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let command = self
            .command
            .unwrap_or(Command::Watch(WatchCommand::default()));

        match command {
            Command::Watch(cmd) => cmd.run().await,
            Command::ListStreams(cmd) => cmd.run().await,
        }
    }
}
