use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::playlist::StreamKey;

use super::scheduler::{Scheduler, TaskHandle};
use super::state::StateStore;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5000);

/// Backoff parameters for stream retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Optional ceiling on a single delay. Growth is otherwise bounded only by
    /// `max_retries`.
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-indexed), or `None` once the
    /// retry budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX);
        Some(match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        })
    }
}

/// Identifies one scheduled retry timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTicket {
    pub key: StreamKey,
    pub attempt: u32,
    id: u64,
}

/// Outcome of reporting a playback error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// A retry will fire after `delay`.
    Scheduled { attempt: u32, delay: Duration },
    /// A retry is already pending for this stream.
    Pending,
    /// Retries are used up; the stream is now permanently errored.
    Exhausted,
    /// The stream is not part of the current list.
    Unknown,
}

/// Where a stream sits in the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Playing,
    Retrying { attempt: u32 },
    PermanentlyFailed,
}

struct PendingRetry {
    ticket: RetryTicket,
    // Held for its drop: removing the entry cancels the timer.
    _handle: TaskHandle,
}

/**
    Decides whether and when a failed stream is retried.

    Each stream has at most one pending timer. The policy owns the timer
    handles; the playback flags live in the [`StateStore`] passed in by the
    caller.
*/
pub struct StreamRetryPolicy {
    config: RetryConfig,
    scheduler: Arc<dyn Scheduler>,
    pending: HashMap<StreamKey, PendingRetry>,
    next_ticket: u64,
}

impl StreamRetryPolicy {
    pub fn new(config: RetryConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            config,
            scheduler,
            pending: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /**
        Handle a playback error for `key`.

        If retries remain, `on_due` is scheduled with the ticket of the new
        timer; the caller hands that ticket back to [`Self::on_retry_due`]
        when it fires.
    */
    pub fn on_error<F>(
        &mut self,
        key: &StreamKey,
        store: &mut StateStore,
        on_due: F,
    ) -> RetryDecision
    where
        F: FnOnce(RetryTicket) + Send + 'static,
    {
        let Some(state) = store.get_mut(key) else {
            return RetryDecision::Unknown;
        };
        if state.errored {
            return RetryDecision::Exhausted;
        }
        if self.pending.contains_key(key) {
            return RetryDecision::Pending;
        }

        let attempt = state.retry_count;
        let Some(delay) = self.config.delay_for(attempt) else {
            state.errored = true;
            tracing::warn!(stream = %key, attempts = attempt, "Retries exhausted, giving up");
            return RetryDecision::Exhausted;
        };

        self.next_ticket += 1;
        let ticket = RetryTicket {
            key: key.clone(),
            attempt,
            id: self.next_ticket,
        };
        let fired = ticket.clone();
        let handle = self.scheduler.schedule(delay, Box::new(move || on_due(fired)));
        self.pending.insert(
            key.clone(),
            PendingRetry {
                ticket,
                _handle: handle,
            },
        );

        tracing::info!(
            stream = %key,
            attempt = attempt + 1,
            max = self.config.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        RetryDecision::Scheduled { attempt, delay }
    }

    /**
        Apply a fired retry. Returns `true` when the caller should reload the
        stream.

        Tickets that do not match the pending timer (cancelled, replaced, or
        from a previous list) are ignored.
    */
    pub fn on_retry_due(&mut self, ticket: &RetryTicket, store: &mut StateStore) -> bool {
        match self.pending.get(&ticket.key) {
            Some(pending) if pending.ticket == *ticket => {}
            _ => {
                tracing::debug!(stream = %ticket.key, "Ignoring stale retry");
                return false;
            }
        }
        self.pending.remove(&ticket.key);

        let Some(state) = store.get_mut(&ticket.key) else {
            return false;
        };
        if state.errored {
            return false;
        }
        state.retry_count = (ticket.attempt + 1).min(self.config.max_retries);
        state.errored = false;
        true
    }

    pub fn status(&self, key: &StreamKey, store: &StateStore) -> Option<StreamStatus> {
        let state = store.get(key)?;
        Some(if state.errored {
            StreamStatus::PermanentlyFailed
        } else if let Some(pending) = self.pending.get(key) {
            StreamStatus::Retrying {
                attempt: pending.ticket.attempt + 1,
            }
        } else {
            StreamStatus::Playing
        })
    }

    pub fn is_pending(&self, key: &StreamKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Cancel the pending retry for `key`. Returns whether one was pending.
    pub fn cancel(&mut self, key: &StreamKey) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "Cancelling pending retries");
        }
        self.pending.clear();
    }
}
