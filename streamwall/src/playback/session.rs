use std::sync::Arc;

use tokio::sync::mpsc;

use crate::playlist::{StreamDescriptor, StreamKey};

/// Errors raised by a player.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlayerError {
    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Something a player reports back to the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Ready {
        key: StreamKey,
        generation: u64,
    },
    Error {
        key: StreamKey,
        generation: u64,
        reason: String,
    },
}

impl SessionEvent {
    pub fn key(&self) -> &StreamKey {
        match self {
            Self::Ready { key, .. } | Self::Error { key, .. } => key,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Self::Ready { generation, .. } | Self::Error { generation, .. } => *generation,
        }
    }
}

/// Channel a player uses to report events for one load.
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    key: StreamKey,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl PlayerEvents {
    pub fn new(key: StreamKey, generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            key,
            generation,
            tx,
        }
    }

    pub fn ready(&self) {
        let _ = self.tx.send(SessionEvent::Ready {
            key: self.key.clone(),
            generation: self.generation,
        });
    }

    pub fn error(&self, reason: impl Into<String>) {
        let _ = self.tx.send(SessionEvent::Error {
            key: self.key.clone(),
            generation: self.generation,
            reason: reason.into(),
        });
    }
}

/// An external player bound to one stream URL.
pub trait Player: Send {
    /// Start playing `url`. Later failures are reported through `events`.
    fn load(&mut self, url: &str, events: PlayerEvents) -> Result<(), PlayerError>;

    fn set_muted(&mut self, muted: bool);

    /// Stop playback and free network/decoder resources. Must be idempotent.
    fn release(&mut self);
}

/// Creates players for streams.
pub trait PlayerBackend: Send + Sync {
    fn create(&self, descriptor: &StreamDescriptor) -> Box<dyn Player>;
}

/// Owns an acquired player and releases it on drop.
struct PlayerGuard {
    player: Box<dyn Player>,
}

impl Drop for PlayerGuard {
    fn drop(&mut self) {
        self.player.release();
    }
}

/**
    Lifecycle of one stream's player.

    Every `load()` releases the previous player before acquiring a new one, and
    a player whose setup fails is released before the error is returned.
    Dropping the session releases whatever it holds.

    Generations are supplied by the caller and must never repeat for a key
    while events from an earlier player can still be queued.
*/
pub struct PlaybackSession {
    descriptor: StreamDescriptor,
    backend: Arc<dyn PlayerBackend>,
    events: mpsc::UnboundedSender<SessionEvent>,
    player: Option<PlayerGuard>,
    generation: u64,
    muted: bool,
}

impl PlaybackSession {
    pub fn new(
        descriptor: StreamDescriptor,
        backend: Arc<dyn PlayerBackend>,
        events: mpsc::UnboundedSender<SessionEvent>,
        muted: bool,
    ) -> Self {
        Self {
            descriptor,
            backend,
            events,
            player: None,
            generation: 0,
            muted,
        }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn key(&self) -> StreamKey {
        self.descriptor.key()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.player.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether an event belongs to the player currently held.
    pub fn accepts(&self, event: &SessionEvent) -> bool {
        self.player.is_some()
            && event.generation() == self.generation
            && event.key().as_str() == self.descriptor.proxied_url
    }

    /// (Re)load the stream as `generation`.
    pub fn load(&mut self, generation: u64) -> Result<(), PlayerError> {
        self.release();
        self.generation = generation;

        let mut guard = PlayerGuard {
            player: self.backend.create(&self.descriptor),
        };
        guard.player.set_muted(self.muted);

        let events = PlayerEvents::new(self.key(), self.generation, self.events.clone());
        guard.player.load(&self.descriptor.proxied_url, events)?;

        tracing::debug!(
            stream = %self.descriptor.title,
            generation = self.generation,
            "Player loaded"
        );
        self.player = Some(guard);
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(guard) = self.player.as_mut() {
            guard.player.set_muted(muted);
        }
    }

    pub fn release(&mut self) {
        if self.player.take().is_some() {
            tracing::debug!(stream = %self.descriptor.title, "Player released");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// What a fake player was asked to do, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Load(String),
        Muted(bool),
        Release,
    }

    /// Backend whose players log their calls and hand their event channel to
    /// the test.
    #[derive(Default)]
    pub struct FakeBackend {
        pub calls: Mutex<Vec<(StreamKey, Call)>>,
        pub events: Mutex<Vec<PlayerEvents>>,
        pub fail_loads: Mutex<Vec<StreamKey>>,
    }

    impl FakeBackend {
        pub fn calls_for(&self, key: &StreamKey) -> Vec<Call> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, c)| c.clone())
                .collect()
        }

        /// Event channel of the most recent load of `key`.
        pub fn latest_events(&self, key: &StreamKey) -> Option<PlayerEvents> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|e| &e.key == key)
                .cloned()
        }

        pub fn count(&self, key: &StreamKey, wanted: fn(&Call) -> bool) -> usize {
            self.calls_for(key).iter().filter(|c| wanted(c)).count()
        }
    }

    pub struct FakePlayer {
        key: StreamKey,
        backend: Arc<FakeBackend>,
        released: bool,
    }

    impl FakePlayer {
        fn record(&self, call: Call) {
            self.backend
                .calls
                .lock()
                .unwrap()
                .push((self.key.clone(), call));
        }
    }

    impl Player for FakePlayer {
        fn load(&mut self, url: &str, events: PlayerEvents) -> Result<(), PlayerError> {
            self.record(Call::Load(url.to_string()));
            if self.backend.fail_loads.lock().unwrap().contains(&self.key) {
                return Err(PlayerError::Load {
                    url: url.to_string(),
                    reason: "setup failed".to_string(),
                });
            }
            self.backend.events.lock().unwrap().push(events);
            Ok(())
        }

        fn set_muted(&mut self, muted: bool) {
            self.record(Call::Muted(muted));
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.record(Call::Release);
            }
        }
    }

    /// Shares one `FakeBackend` between the test and the session.
    pub struct SharedFake(pub Arc<FakeBackend>);

    impl PlayerBackend for SharedFake {
        fn create(&self, descriptor: &StreamDescriptor) -> Box<dyn Player> {
            Box::new(FakePlayer {
                key: descriptor.key(),
                backend: Arc::clone(&self.0),
                released: false,
            })
        }
    }
}
