use std::collections::HashMap;

use crate::playlist::StreamKey;

/// Per-stream playback flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub muted: bool,
    /// Set once retries are exhausted. Terminal until the list is reloaded.
    pub errored: bool,
    pub retry_count: u32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            muted: true,
            errored: false,
            retry_count: 0,
        }
    }
}

/**
    Playback state for the currently loaded stream list.

    Owned by the viewer and passed by reference to the retry policy, so the
    whole map is dropped together when the list is replaced.
*/
#[derive(Debug, Default)]
pub struct StateStore {
    states: HashMap<StreamKey, PlaybackState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all state and start fresh defaults for the given streams.
    pub fn reset<'a>(&mut self, keys: impl IntoIterator<Item = &'a StreamKey>) {
        self.states = keys
            .into_iter()
            .map(|key| (key.clone(), PlaybackState::default()))
            .collect();
    }

    pub fn get(&self, key: &StreamKey) -> Option<&PlaybackState> {
        self.states.get(key)
    }

    pub fn get_mut(&mut self, key: &StreamKey) -> Option<&mut PlaybackState> {
        self.states.get_mut(key)
    }

    /// Flip the muted flag. Returns the new value.
    pub fn toggle_mute(&mut self, key: &StreamKey) -> Option<bool> {
        let state = self.states.get_mut(key)?;
        state.muted = !state.muted;
        Some(state.muted)
    }

    pub fn is_errored(&self, key: &StreamKey) -> bool {
        self.states.get(key).is_some_and(|s| s.errored)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
