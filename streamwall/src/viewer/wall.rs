use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::playback::{
    FrameGrabber, PlaybackSession, PlaybackState, PlayerBackend, RetryConfig, RetryDecision,
    RetryTicket, Scheduler, SessionEvent, StateStore, StreamRetryPolicy, StreamStatus, Thumbnail,
    ThumbnailSession,
};
use crate::playlist::{StreamDescriptor, StreamKey};

use super::commands::ViewerCommand;
use super::layout::GridLayout;

const TITLE_WIDTH: usize = 18;

/// Which streams are on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Grid,
    /// One stream, by index into the stream list.
    Single(usize),
}

/// Something that happened outside the viewer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    Session(SessionEvent),
    RetryDue(RetryTicket),
}

/// Presentation data for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub index: usize,
    pub title: String,
    pub muted: bool,
    pub status: StreamStatus,
    pub thumbnail: Option<Thumbnail>,
}

/**
    The stream wall.

    Owns every piece of per-stream state: descriptors, playback flags, retry
    timers, mounted players and preview sessions. Players and timers only talk
    back through channels drained by [`Viewer::next_event`], so all state
    changes happen on whichever task drives the viewer.
*/
pub struct Viewer {
    streams: Vec<StreamDescriptor>,
    store: StateStore,
    policy: StreamRetryPolicy,
    backend: Arc<dyn PlayerBackend>,
    grabber: Option<Arc<dyn FrameGrabber>>,
    sessions: HashMap<StreamKey, PlaybackSession>,
    thumbnails: HashMap<StreamKey, ThumbnailSession>,
    mode: ViewMode,
    layout: GridLayout,
    /// Last player generation handed out. Never reset, so a remounted or
    /// reloaded stream cannot match events from a player it replaced.
    generation: u64,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    retry_tx: mpsc::UnboundedSender<RetryTicket>,
    retry_rx: mpsc::UnboundedReceiver<RetryTicket>,
}

impl Viewer {
    pub fn new(
        backend: Arc<dyn PlayerBackend>,
        scheduler: Arc<dyn Scheduler>,
        retry: RetryConfig,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        Self {
            streams: Vec::new(),
            store: StateStore::new(),
            policy: StreamRetryPolicy::new(retry, scheduler),
            backend,
            grabber: None,
            sessions: HashMap::new(),
            thumbnails: HashMap::new(),
            mode: ViewMode::Grid,
            layout: GridLayout::default(),
            generation: 0,
            session_tx,
            session_rx,
            retry_tx,
            retry_rx,
        }
    }

    /// Capture previews for grid tiles with `grabber`.
    pub fn with_grabber(mut self, grabber: Arc<dyn FrameGrabber>) -> Self {
        self.grabber = Some(grabber);
        self
    }

    pub fn with_layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn state(&self, index: usize) -> Option<&PlaybackState> {
        self.store.get(&self.streams.get(index)?.key())
    }

    pub fn status(&self, index: usize) -> Option<StreamStatus> {
        self.policy.status(&self.streams.get(index)?.key(), &self.store)
    }

    pub fn is_mounted(&self, index: usize) -> bool {
        self.streams
            .get(index)
            .is_some_and(|s| self.sessions.contains_key(&s.key()))
    }

    pub fn pending_retries(&self) -> usize {
        self.policy.pending_count()
    }

    /**
        Replace the stream list.

        Pending retries, players and previews of the old list are torn down
        first; every stream starts again from default state.
    */
    pub fn load_streams(&mut self, streams: Vec<StreamDescriptor>) {
        self.teardown();

        let keys: Vec<StreamKey> = streams.iter().map(StreamDescriptor::key).collect();
        self.store.reset(&keys);
        self.streams = streams;
        self.mode = ViewMode::Grid;

        if let Some(grabber) = &self.grabber {
            for stream in &self.streams {
                self.thumbnails.insert(
                    stream.key(),
                    ThumbnailSession::new(stream.clone(), Arc::clone(grabber)),
                );
            }
        }

        tracing::info!(count = self.streams.len(), "Stream list loaded");
        self.sync_mounts();
    }

    /// Cancel every timer and release every player and preview.
    pub fn teardown(&mut self) {
        self.policy.cancel_all();
        self.sessions.clear();
        self.thumbnails.clear();
        self.store.clear();
    }

    pub fn toggle_mute(&mut self, index: usize) -> Option<bool> {
        let key = self.streams.get(index)?.key();
        let muted = self.store.toggle_mute(&key)?;
        if let Some(session) = self.sessions.get_mut(&key) {
            session.set_muted(muted);
        }
        Some(muted)
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.streams.len() {
            return false;
        }
        self.set_mode(ViewMode::Single(index));
        true
    }

    pub fn next(&mut self) {
        if let ViewMode::Single(index) = self.mode {
            let next = (index + 1) % self.streams.len();
            self.set_mode(ViewMode::Single(next));
        }
    }

    pub fn previous(&mut self) {
        if let ViewMode::Single(index) = self.mode {
            let len = self.streams.len();
            let previous = (index + len - 1) % len;
            self.set_mode(ViewMode::Single(previous));
        }
    }

    pub fn back_to_grid(&mut self) {
        self.set_mode(ViewMode::Grid);
    }

    /// Apply a user command. Returns `false` when the viewer should stop.
    pub fn apply(&mut self, command: ViewerCommand) -> bool {
        match command {
            ViewerCommand::ToggleMute(index) => {
                self.toggle_mute(index);
            }
            ViewerCommand::Select(index) => {
                self.select(index);
            }
            ViewerCommand::Next => self.next(),
            ViewerCommand::Previous => self.previous(),
            ViewerCommand::BackToGrid => self.back_to_grid(),
            ViewerCommand::Reload => {
                let streams = std::mem::take(&mut self.streams);
                self.load_streams(streams);
            }
            ViewerCommand::Quit => return false,
        }
        true
    }

    /**
        Drive the wall until `Quit` or `shutdown` fires, then tear down.

        `on_change` sees the viewer after every handled event or command. A
        closed command channel is not a reason to stop.
    */
    pub async fn run<F>(
        &mut self,
        mut commands: mpsc::Receiver<ViewerCommand>,
        mut shutdown: watch::Receiver<bool>,
        mut on_change: F,
    ) where
        F: FnMut(&Viewer),
    {
        let mut console_open = true;
        on_change(self);

        loop {
            tokio::select! {
                event = self.next_event() => self.handle_event(event),
                command = commands.recv(), if console_open => match command {
                    Some(command) => {
                        if !self.apply(command) {
                            break;
                        }
                    }
                    None => console_open = false,
                },
                _ = shutdown.changed() => break,
            }
            on_change(self);
        }

        self.teardown();
    }

    /// Wait for the next player or timer event.
    pub async fn next_event(&mut self) -> ViewerEvent {
        tokio::select! {
            Some(event) = self.session_rx.recv() => ViewerEvent::Session(event),
            Some(ticket) = self.retry_rx.recv() => ViewerEvent::RetryDue(ticket),
        }
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::Session(event) => self.handle_session_event(event),
            ViewerEvent::RetryDue(ticket) => self.handle_retry_due(ticket),
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        let accepted = self
            .sessions
            .get(event.key())
            .is_some_and(|s| s.accepts(&event));
        if !accepted {
            tracing::debug!(stream = %event.key(), "Dropping event from released player");
            return;
        }

        match event {
            SessionEvent::Ready { key, .. } => {
                tracing::info!(stream = %self.title(&key), "Stream is live");
            }
            SessionEvent::Error { key, reason, .. } => {
                tracing::warn!(stream = %self.title(&key), %reason, "Error loading stream");
                self.on_stream_error(&key);
            }
        }
    }

    fn handle_retry_due(&mut self, ticket: RetryTicket) {
        if !self.policy.on_retry_due(&ticket, &mut self.store) {
            return;
        }
        let generation = self.next_generation();
        let Some(session) = self.sessions.get_mut(&ticket.key) else {
            return;
        };

        tracing::info!(
            stream = %session.descriptor().title,
            attempt = ticket.attempt + 1,
            "Retrying stream"
        );
        if let Err(e) = session.load(generation) {
            tracing::warn!(stream = %ticket.key, error = %e, "Reload failed");
            self.on_stream_error(&ticket.key);
        }
    }

    fn on_stream_error(&mut self, key: &StreamKey) {
        let retry_tx = self.retry_tx.clone();
        let decision = self.policy.on_error(key, &mut self.store, move |ticket| {
            let _ = retry_tx.send(ticket);
        });

        match decision {
            RetryDecision::Scheduled { .. } => {
                // Nothing plays until the retry fires.
                if let Some(session) = self.sessions.get_mut(key) {
                    session.release();
                }
            }
            RetryDecision::Exhausted => {
                tracing::error!(stream = %self.title(key), "Failed to load stream");
                self.sessions.remove(key);
                if let Some(thumbnail) = self.thumbnails.get_mut(key) {
                    thumbnail.set_visible(false);
                }
            }
            RetryDecision::Pending | RetryDecision::Unknown => {}
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn set_mode(&mut self, mode: ViewMode) {
        if mode != self.mode {
            tracing::debug!(?mode, "View changed");
        }
        self.mode = mode;
        self.sync_mounts();
    }

    fn visible_indices(&self) -> Vec<usize> {
        match self.mode {
            ViewMode::Grid => (0..self.streams.len()).collect(),
            ViewMode::Single(index) => vec![index],
        }
    }

    /// Mount players for visible streams and unmount the rest.
    fn sync_mounts(&mut self) {
        let visible: Vec<StreamKey> = self
            .visible_indices()
            .into_iter()
            .filter_map(|i| self.streams.get(i))
            .map(StreamDescriptor::key)
            .filter(|key| !self.store.is_errored(key))
            .collect();

        let hidden: Vec<StreamKey> = self
            .sessions
            .keys()
            .filter(|key| !visible.contains(key))
            .cloned()
            .collect();
        for key in hidden {
            self.policy.cancel(&key);
            self.sessions.remove(&key);
        }

        let in_grid = self.mode == ViewMode::Grid;
        for (key, thumbnail) in self.thumbnails.iter_mut() {
            thumbnail.set_visible(in_grid && visible.contains(key));
        }

        for key in visible {
            if self.sessions.contains_key(&key) {
                continue;
            }
            let Some(descriptor) = self.streams.iter().find(|s| s.key() == key).cloned() else {
                continue;
            };
            let muted = self.store.get(&key).is_none_or(|s| s.muted);
            let mut session = PlaybackSession::new(
                descriptor,
                Arc::clone(&self.backend),
                self.session_tx.clone(),
                muted,
            );
            let result = session.load(self.next_generation());
            self.sessions.insert(key.clone(), session);
            if let Err(e) = result {
                tracing::warn!(stream = %key, error = %e, "Failed to start player");
                self.on_stream_error(&key);
            }
        }
    }

    fn title<'a>(&'a self, key: &'a StreamKey) -> &'a str {
        self.streams
            .iter()
            .find(|s| &s.key() == key)
            .map(|s| s.title.as_str())
            .unwrap_or(key.as_str())
    }

    pub fn tiles(&self) -> Vec<Tile> {
        self.streams
            .iter()
            .enumerate()
            .map(|(index, stream)| {
                let key = stream.key();
                Tile {
                    index,
                    title: stream.title.clone(),
                    muted: self.store.get(&key).is_none_or(|s| s.muted),
                    status: self
                        .policy
                        .status(&key, &self.store)
                        .unwrap_or(StreamStatus::Playing),
                    thumbnail: self.thumbnails.get(&key).map(ThumbnailSession::thumbnail),
                }
            })
            .collect()
    }

    /// Text rendering of the current view.
    pub fn render(&self) -> String {
        let tiles = self.tiles();
        let mut out = String::new();

        match self.mode {
            ViewMode::Grid => {
                let _ = writeln!(out, "== {} streams ==", tiles.len());
                let cols = self.layout.cols as usize;
                for row in tiles.chunks(cols) {
                    let cells: Vec<String> = row.iter().map(render_cell).collect();
                    let _ = writeln!(out, "{}", cells.join(" | "));
                }
            }
            ViewMode::Single(index) => {
                if let Some(tile) = tiles.get(index) {
                    let _ = writeln!(out, "== {}/{} ==", index + 1, tiles.len());
                    let _ = writeln!(out, "{}", render_cell(tile));
                }
            }
        }
        out
    }
}

fn render_cell(tile: &Tile) -> String {
    let title: String = tile.title.chars().take(TITLE_WIDTH).collect();
    let sound = if tile.muted { "muted" } else { "sound" };
    let status = match tile.status {
        StreamStatus::Playing => "live".to_string(),
        StreamStatus::Retrying { attempt } => format!("retry {attempt}"),
        StreamStatus::PermanentlyFailed => "failed to load".to_string(),
    };
    format!(
        "{:>2}. {:<width$} {:<5} {:<14}",
        tile.index + 1,
        title,
        sound,
        status,
        width = TITLE_WIDTH
    )
}
