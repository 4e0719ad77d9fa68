//! Upload progress snapshots for a UI progress indicator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Retrying,
    Success,
    Failed,
}

/// One point-in-time view of an upload, emitted to the caller's sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub status: UploadStatus,
    /// Percent complete, `0..=100`.
    pub progress: u8,
    pub attempt: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrying_in_ms: Option<u64>,
}

/// Stateful helper that turns upload lifecycle events into [`UploadProgress`]
/// snapshots.
///
/// The tracker remembers which attempt is current so that `uploading` calls
/// after a `retrying` report the right ordinal. It never keeps the snapshots
/// it emits.
pub struct ProgressTracker<S> {
    sink: S,
    max_attempts: u32,
    current_attempt: u32,
}

impl<S> ProgressTracker<S>
where
    S: FnMut(UploadProgress),
{
    pub fn new(max_attempts: u32, sink: S) -> Self {
        Self {
            sink,
            max_attempts,
            current_attempt: 1,
        }
    }

    #[must_use]
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn uploading(&mut self, progress: u8) {
        self.emit(UploadStatus::Uploading, progress.min(100), None, None);
    }

    /// Reports that `attempt` failed with `error` and the next one starts after `delay`.
    pub fn retrying(&mut self, attempt: u32, error: &str, delay: Duration) {
        self.current_attempt = attempt.saturating_add(1);
        let retrying_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.emit(
            UploadStatus::Retrying,
            0,
            Some(error.to_owned()),
            Some(retrying_in_ms),
        );
    }

    pub fn success(&mut self) {
        self.emit(UploadStatus::Success, 100, None, None);
    }

    pub fn failed(&mut self, error: &str) {
        self.emit(UploadStatus::Failed, 0, Some(error.to_owned()), None);
    }

    pub fn reset(&mut self) {
        self.current_attempt = 1;
        self.emit(UploadStatus::Idle, 0, None, None);
    }

    fn emit(
        &mut self,
        status: UploadStatus,
        progress: u8,
        error: Option<String>,
        retrying_in_ms: Option<u64>,
    ) {
        (self.sink)(UploadProgress {
            status,
            progress,
            attempt: self.current_attempt,
            max_attempts: self.max_attempts,
            error,
            retrying_in_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_tracker(
        max_attempts: u32,
        events: &mut Vec<UploadProgress>,
    ) -> ProgressTracker<impl FnMut(UploadProgress) + '_> {
        ProgressTracker::new(max_attempts, move |p| events.push(p))
    }

    #[test]
    fn uploading_reports_first_attempt() {
        let mut events = Vec::new();
        let mut tracker = collecting_tracker(4, &mut events);
        tracker.uploading(40);
        drop(tracker);

        assert_eq!(
            events,
            vec![UploadProgress {
                status: UploadStatus::Uploading,
                progress: 40,
                attempt: 1,
                max_attempts: 4,
                error: None,
                retrying_in_ms: None,
            }]
        );
    }

    #[test]
    fn progress_is_clamped_to_one_hundred() {
        let mut events = Vec::new();
        let mut tracker = collecting_tracker(1, &mut events);
        tracker.uploading(250);
        drop(tracker);
        assert_eq!(events[0].progress, 100);
    }

    #[test]
    fn retrying_advances_attempt_for_next_upload() {
        let mut events = Vec::new();
        let mut tracker = collecting_tracker(4, &mut events);
        tracker.uploading(10);
        tracker.retrying(1, "network timeout", Duration::from_millis(1_200));
        tracker.uploading(0);
        assert_eq!(tracker.current_attempt(), 2);
        drop(tracker);

        assert_eq!(events.len(), 3);
        assert_eq!(events[1].status, UploadStatus::Retrying);
        assert_eq!(events[1].attempt, 2);
        assert_eq!(events[1].error.as_deref(), Some("network timeout"));
        assert_eq!(events[1].retrying_in_ms, Some(1_200));
        assert_eq!(events[2].status, UploadStatus::Uploading);
        assert_eq!(events[2].attempt, 2);
    }

    #[test]
    fn terminal_states_and_reset() {
        let mut events = Vec::new();
        let mut tracker = collecting_tracker(2, &mut events);
        tracker.retrying(1, "503", Duration::from_millis(500));
        tracker.failed("503 Service Unavailable");
        tracker.reset();
        tracker.success();
        drop(tracker);

        let statuses: Vec<UploadStatus> = events.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                UploadStatus::Retrying,
                UploadStatus::Failed,
                UploadStatus::Idle,
                UploadStatus::Success,
            ]
        );
        assert_eq!(events[1].attempt, 2);
        assert_eq!(events[1].error.as_deref(), Some("503 Service Unavailable"));
        assert_eq!(events[2].attempt, 1);
        assert_eq!(events[3].progress, 100);
    }

    #[test]
    fn snapshot_serializes_lowercase_status_and_skips_empty_fields() {
        let snapshot = UploadProgress {
            status: UploadStatus::Uploading,
            progress: 5,
            attempt: 1,
            max_attempts: 4,
            error: None,
            retrying_in_ms: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "uploading",
                "progress": 5,
                "attempt": 1,
                "max_attempts": 4
            })
        );
    }
}
