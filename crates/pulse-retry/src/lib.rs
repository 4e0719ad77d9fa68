//! Bounded retry with exponential backoff and jitter.
//!
//! Errors are classified by message into transient failures worth retrying
//! (network, timeout, abort, 502/503/504) and fatal ones that surface
//! immediately. [`RetryExecutor`] drives the loop; [`ProgressTracker`]
//! turns it into a stream of [`UploadProgress`] snapshots for a UI.

pub mod backoff;
pub mod classify;
pub mod executor;
pub mod progress;

pub use backoff::{compute_delay_ms, Backoff};
pub use classify::is_retryable;
pub use executor::{RetryAttempt, RetryExecutor, RetryOptions};
pub use progress::{ProgressTracker, UploadProgress, UploadStatus};
