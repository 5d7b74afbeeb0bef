// SPDX-License-Identifier: GPL-3.0-only

//! Scan session
//!
//! The consumer side of the pipeline. A session owns the dedup gate, the
//! overlay controller and the detection history, so none of them is shared
//! between tasks. Events come in over the pipeline's broadcast channel and
//! user-visible changes go out as [`SessionUpdate`]s.
//!
//! ```text
//! RecognitionEvent ─► DedupGate ─► DetectionHistory
//!                        │ New
//!                        ├─► OverlayController ─► OverlayShown / OverlayHidden
//!                        └─► AutoActions (copy, open URL)
//! ```

use super::actions::{ActionPolicy, AppliedActions, AutoActions};
use super::gate::{Classification, DedupGate};
use super::history::{DetectionHistory, HistoryMarker};
use super::orchestrator::RequestTracker;
use super::overlay::OverlayController;
use super::types::{RecognitionEvent, RecognitionResult, RequestId};
use crate::constants::{DEFAULT_COOLDOWN, DEFAULT_RECOGNITION_INTERVAL, clamp_recognition_interval};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Consumer settings, usually built by [`crate::Config::session_settings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub cooldown: Duration,
    pub recognition_interval: Duration,
    pub show_overlay: bool,
    pub actions: ActionPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            recognition_interval: DEFAULT_RECOGNITION_INTERVAL,
            show_overlay: true,
            actions: ActionPolicy::default(),
        }
    }
}

/// User-visible change produced by a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// A valid result arrived; duplicates are reported for the history view
    Detected {
        request_id: RequestId,
        result: RecognitionResult,
        classification: Classification,
        marker: HistoryMarker,
    },
    OverlayShown {
        text: String,
        dismiss_at: Instant,
    },
    OverlayHidden,
}

pub struct ScanSession {
    gate: DedupGate,
    overlay: OverlayController,
    history: DetectionHistory,
    actions: Arc<dyn AutoActions>,
    policy: ActionPolicy,
    tracker: RequestTracker,
    /// Texts of new detections whose auto-actions have not run yet
    pending_actions: Vec<String>,
    detections: u64,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("gate", &self.gate)
            .field("overlay", &self.overlay)
            .field("history_len", &self.history.len())
            .field("policy", &self.policy)
            .field("detections", &self.detections)
            .finish_non_exhaustive()
    }
}

impl ScanSession {
    pub fn new(settings: SessionSettings, actions: Arc<dyn AutoActions>) -> Self {
        Self {
            gate: DedupGate::new(settings.cooldown),
            overlay: OverlayController::new(
                settings.show_overlay,
                clamp_recognition_interval(settings.recognition_interval),
            ),
            history: DetectionHistory::new(),
            actions,
            policy: settings.actions,
            tracker: RequestTracker::new(),
            pending_actions: Vec::new(),
            detections: 0,
        }
    }

    /// Only accept the event for `request_id` until it arrives
    pub fn track(&mut self, request_id: RequestId) {
        self.tracker.track(request_id);
    }

    /// Feed one pipeline event through the gate
    pub fn handle_event(&mut self, event: &RecognitionEvent) -> Vec<SessionUpdate> {
        self.handle_event_at(event, Instant::now())
    }

    /// Like [`Self::handle_event`], running auto-actions on this thread
    pub fn handle_event_at(&mut self, event: &RecognitionEvent, now: Instant) -> Vec<SessionUpdate> {
        let updates = self.process_event(event, now);
        for text in std::mem::take(&mut self.pending_actions) {
            let applied = self.policy.apply(self.actions.as_ref(), &text);
            trace!(copied = applied.copied, opened = applied.opened, "Auto-actions applied");
        }
        updates
    }

    fn process_event(&mut self, event: &RecognitionEvent, now: Instant) -> Vec<SessionUpdate> {
        if self.tracker.outstanding().is_some() && !self.tracker.settle(event) {
            trace!(request_id = event.request_id(), "Ignoring untracked event");
            return Vec::new();
        }

        // Idle frames and failures are logged (throttled) by the pipeline
        match event {
            RecognitionEvent::Completed { result, request_id } if result.is_valid => {
                self.on_detection(*request_id, result, now)
            }
            _ => Vec::new(),
        }
    }

    fn on_detection(
        &mut self,
        request_id: RequestId,
        result: &RecognitionResult,
        now: Instant,
    ) -> Vec<SessionUpdate> {
        let classification = self.gate.classify_at(result, now);
        let marker = self
            .history
            .record(result, classification)
            .unwrap_or(HistoryMarker::Repeat);

        let mut updates = vec![SessionUpdate::Detected {
            request_id,
            result: result.clone(),
            classification,
            marker,
        }];

        if classification == Classification::Duplicate {
            return updates;
        }

        self.detections += 1;
        info!(
            request_id,
            format = %result.format,
            detections = self.detections,
            "New code detected"
        );

        if let Some(dismiss_at) = self.overlay.show_at(result, now) {
            updates.push(SessionUpdate::OverlayShown {
                text: result.text.clone(),
                dismiss_at,
            });
        }

        if self.policy.is_enabled() {
            self.pending_actions.push(result.text.clone());
        }

        updates
    }

    /// Dismiss the overlay if its deadline has passed
    pub fn poll_overlay_at(&mut self, now: Instant) -> Option<SessionUpdate> {
        self.overlay
            .poll_at(now)
            .then_some(SessionUpdate::OverlayHidden)
    }

    pub fn set_overlay_enabled(&mut self, enabled: bool) -> Option<SessionUpdate> {
        self.overlay
            .set_enabled(enabled)
            .then_some(SessionUpdate::OverlayHidden)
    }

    /// Change the recognition cadence (clamped to 100-2000ms)
    ///
    /// Takes effect for the next overlay shown.
    pub fn set_recognition_interval(&mut self, interval: Duration) {
        self.overlay
            .on_interval_changed(clamp_recognition_interval(interval));
    }

    pub fn history(&self) -> &DetectionHistory {
        &self.history
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    /// Number of new (non-duplicate) detections
    pub fn detection_count(&self) -> u64 {
        self.detections
    }

    /// Move queued auto-actions onto the blocking pool
    fn spawn_actions(&mut self, running: &mut JoinSet<AppliedActions>) {
        for text in self.pending_actions.drain(..) {
            let actions = Arc::clone(&self.actions);
            let policy = self.policy;
            running.spawn_blocking(move || policy.apply(actions.as_ref(), &text));
        }
    }

    /// Consume events until the channel closes or `updates` is dropped
    ///
    /// Auto-actions run on the blocking pool and are awaited before this
    /// returns. Returns the session so its history can be inspected
    /// afterwards.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<RecognitionEvent>,
        updates: mpsc::Sender<SessionUpdate>,
    ) -> Self {
        debug!("Scan session started");
        let mut running = JoinSet::new();

        'session: loop {
            let deadline = self.overlay.deadline();

            let produced = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let produced = self.process_event(&event, Instant::now());
                        self.spawn_actions(&mut running);
                        produced
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Scan session fell behind, events dropped");
                        Vec::new()
                    }
                    Err(RecvError::Closed) => break 'session,
                },
                _ = wait_until(deadline) => {
                    self.poll_overlay_at(Instant::now()).into_iter().collect()
                }
                Some(done) = running.join_next(), if !running.is_empty() => {
                    log_actions(done);
                    Vec::new()
                }
            };

            for update in produced {
                if updates.send(update).await.is_err() {
                    debug!("Session update receiver dropped");
                    break 'session;
                }
            }
        }

        if self.overlay.hide() {
            let _ = updates.send(SessionUpdate::OverlayHidden).await;
        }
        while let Some(done) = running.join_next().await {
            log_actions(done);
        }
        debug!(
            detections = self.detections,
            history = self.history.len(),
            "Scan session ended"
        );
        self
    }
}

fn log_actions(done: Result<AppliedActions, tokio::task::JoinError>) {
    match done {
        Ok(applied) => {
            trace!(copied = applied.copied, opened = applied.opened, "Auto-actions applied")
        }
        Err(e) => warn!(error = %e, "Auto-action task failed"),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::formats::BarcodeFormat;
    use crate::recognition::types::Quadrilateral;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        copied: Mutex<Vec<String>>,
    }

    impl AutoActions for Recorder {
        fn copy_text(&self, text: &str) -> Result<(), String> {
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn open_url(&self, _url: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn completed(request_id: RequestId, text: &str) -> RecognitionEvent {
        RecognitionEvent::Completed {
            result: RecognitionResult::new(text, BarcodeFormat::QrCode, Quadrilateral::default()),
            request_id,
        }
    }

    fn session(recorder: Arc<Recorder>) -> ScanSession {
        ScanSession::new(SessionSettings::default(), recorder)
    }

    #[test]
    fn test_new_detection_shows_overlay_and_copies() {
        let recorder = Arc::new(Recorder::default());
        let mut session = session(Arc::clone(&recorder));
        let now = Instant::now();

        let updates = session.handle_event_at(&completed(1, "hello"), now);
        assert_eq!(updates.len(), 2);
        assert!(matches!(
            updates[0],
            SessionUpdate::Detected {
                classification: Classification::New,
                marker: HistoryMarker::New,
                ..
            }
        ));
        assert_eq!(
            updates[1],
            SessionUpdate::OverlayShown {
                text: "hello".into(),
                dismiss_at: now + Duration::from_millis(2000),
            }
        );
        assert_eq!(*recorder.copied.lock().unwrap(), vec!["hello"]);
        assert_eq!(session.detection_count(), 1);
    }

    #[test]
    fn test_duplicate_only_reaches_history() {
        let recorder = Arc::new(Recorder::default());
        let mut session = session(Arc::clone(&recorder));
        let now = Instant::now();

        session.handle_event_at(&completed(1, "hello"), now);
        let updates =
            session.handle_event_at(&completed(2, "hello"), now + Duration::from_millis(500));

        assert_eq!(updates.len(), 1);
        assert!(matches!(
            updates[0],
            SessionUpdate::Detected {
                classification: Classification::Duplicate,
                marker: HistoryMarker::Repeat,
                ..
            }
        ));
        assert_eq!(recorder.copied.lock().unwrap().len(), 1);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().entries()[0].sightings, 2);
        assert_eq!(session.detection_count(), 1);
    }

    #[test]
    fn test_idle_and_failed_events_are_silent() {
        let mut session = session(Arc::new(Recorder::default()));
        let idle = RecognitionEvent::Completed {
            result: RecognitionResult::invalid(),
            request_id: 1,
        };
        let failed = RecognitionEvent::Failed {
            error: crate::errors::RecognitionError::Decode("x".into()),
            request_id: 2,
        };

        assert!(session.handle_event(&idle).is_empty());
        assert!(session.handle_event(&failed).is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_tracking_ignores_other_requests() {
        let mut session = session(Arc::new(Recorder::default()));
        session.track(7);

        assert!(session.handle_event(&completed(6, "stale")).is_empty());
        assert_eq!(session.handle_event(&completed(7, "mine")).len(), 2);
        // Settled, so later events flow again
        assert!(!session.handle_event(&completed(8, "next")).is_empty());
    }

    #[test]
    fn test_interval_change_applies_to_next_overlay() {
        let mut session = session(Arc::new(Recorder::default()));
        let now = Instant::now();

        session.handle_event_at(&completed(1, "a"), now);
        session.set_recognition_interval(Duration::from_millis(100));
        assert_eq!(
            session.overlay().deadline(),
            Some(now + Duration::from_millis(2000))
        );

        let later = now + Duration::from_millis(50);
        let updates = session.handle_event_at(&completed(2, "b"), later);
        assert_eq!(
            updates[1],
            SessionUpdate::OverlayShown {
                text: "b".into(),
                dismiss_at: later + Duration::from_millis(1200),
            }
        );

        assert_eq!(session.poll_overlay_at(later + Duration::from_millis(1199)), None);
        assert_eq!(
            session.poll_overlay_at(later + Duration::from_millis(1200)),
            Some(SessionUpdate::OverlayHidden)
        );
    }

    #[test]
    fn test_disabling_overlay_hides_it() {
        let mut session = session(Arc::new(Recorder::default()));
        session.handle_event(&completed(1, "a"));
        assert_eq!(
            session.set_overlay_enabled(false),
            Some(SessionUpdate::OverlayHidden)
        );
        assert_eq!(session.handle_event(&completed(2, "b")).len(), 1);
    }
}
