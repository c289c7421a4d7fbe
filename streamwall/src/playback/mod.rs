pub mod probe;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod thumbnail;

pub use probe::ManifestProbeBackend;
pub use retry::{RetryConfig, RetryDecision, RetryTicket, StreamRetryPolicy, StreamStatus};
pub use scheduler::{Scheduler, TokioScheduler};
pub use session::{PlaybackSession, PlayerBackend, SessionEvent};
pub use state::{PlaybackState, StateStore};
pub use thumbnail::{FrameGrabber, SegmentGrabber, Thumbnail, ThumbnailSession};
