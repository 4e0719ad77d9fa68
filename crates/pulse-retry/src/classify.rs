//! Message-based classification of transient versus fatal failures.

use std::fmt::Display;

/// Substrings (lower-case) that mark an error as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "failed to fetch",
    "connection",
    "abort",
    "502",
    "503",
    "504",
];

/// Returns `true` when the rendered error message names a transient condition.
///
/// Matching is case-insensitive. Anything that does not match one of the
/// markers is fatal and must not be retried.
pub fn is_retryable<E: Display + ?Sized>(err: &E) -> bool {
    let message = err.to_string().to_lowercase();
    RETRYABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}
