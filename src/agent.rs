//! The frame loop: provider → classifier → dispatcher.
//!
//! Nothing that goes wrong with a single frame or a single backend call
//! stops the loop. It ends when the stream ends or `running` is cleared.

use crate::activity::SharedActivityLog;
use crate::dispatch::{Decision, DispatchOutcome, Dispatcher, ExecutionReport};
use crate::gesture::{GestureClassifier, GestureError, GestureLabel, Recognition};
use crate::provider::{LandmarkSample, ProviderEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frame skipped; the landmarks were unusable
    Malformed(GestureError),
    Classified {
        recognition: Recognition,
        decision: Decision,
    },
}

impl FrameOutcome {
    pub fn label(&self) -> Option<GestureLabel> {
        match self {
            FrameOutcome::Malformed(_) => None,
            FrameOutcome::Classified { recognition, .. } => Some(recognition.label),
        }
    }

    pub fn fired(&self) -> bool {
        matches!(
            self,
            FrameOutcome::Classified {
                decision: Decision::Fired(_),
                ..
            }
        )
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    EndOfStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub fired: u64,
    pub stop_reason: StopReason,
}

/// Owns the classifier and dispatcher for one session.
pub struct Agent {
    classifier: GestureClassifier,
    dispatcher: Dispatcher,
    activity: SharedActivityLog,
    debug: bool,
    last_label: Option<GestureLabel>,
    frames: u64,
    fired: u64,
}

impl Agent {
    pub fn new(
        classifier: GestureClassifier,
        dispatcher: Dispatcher,
        activity: SharedActivityLog,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            activity,
            debug: false,
            last_label: None,
            frames: 0,
            fired: 0,
        }
    }

    /// Print every label change with its finger pattern.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn activity(&self) -> &SharedActivityLog {
        &self.activity
    }

    /// Classify one sample and feed the result to the dispatcher.
    pub fn process_sample(&mut self, sample: &LandmarkSample) -> FrameOutcome {
        self.frames += 1;
        self.activity.record_frame(sample.has_hand());

        let recognition = match self.classifier.recognize(sample.hand.as_ref()) {
            Ok(recognition) => recognition,
            Err(e) => {
                tracing::warn!("Skipping frame: {e}");
                self.activity.record_malformed();
                return FrameOutcome::Malformed(e);
            }
        };

        let label = recognition.label;
        if !label.is_none() {
            self.activity.record_recognized();
        }
        if self.last_label != Some(label) {
            self.show_label_change(&recognition);
            self.last_label = Some(label);
        }

        let decision = self.dispatcher.step(label, sample.timestamp);
        match &decision {
            Decision::NoGesture => {}
            Decision::Unconfigured(_) => self.activity.record_unconfigured(),
            Decision::Cooling { .. } => self.activity.record_cooldown_suppressed(),
            Decision::Fired(dispatched) => {
                self.fired += 1;
                let dry_run = dispatched.outcome == DispatchOutcome::DryRun;
                self.activity.record_fired(label, dry_run);
                if matches!(dispatched.outcome, DispatchOutcome::Failed(_)) {
                    self.activity.record_failure();
                }
            }
        }

        FrameOutcome::Classified {
            recognition,
            decision,
        }
    }

    fn show_label_change(&self, recognition: &Recognition) {
        let label = recognition.label;
        match &recognition.pose {
            Some(pose) => tracing::debug!(
                gesture = %label,
                fingers = %pose.fingers.pattern(),
                thumb_index = pose.thumb_index_distance,
                "Gesture changed"
            ),
            None => tracing::debug!(gesture = %label, "Gesture changed"),
        }

        if self.debug {
            let detail = recognition
                .pose
                .as_ref()
                .map(|pose| {
                    format!(
                        "  [{}] thumb-index {:.3}",
                        pose.fingers.pattern(),
                        pose.thumb_index_distance
                    )
                })
                .unwrap_or_else(|| "  (no hand)".to_string());
            println!("{} {}{}", label.emoji(), label.display_name(), detail);
        }
    }

    /// Account for finished executor calls. Returns how many were drained.
    pub fn collect_reports(&mut self) -> usize {
        let reports = self.dispatcher.drain_reports();
        self.record_reports(&reports);
        reports.len()
    }

    fn record_reports(&self, reports: &[ExecutionReport]) {
        for report in reports {
            if report.result.is_err() {
                self.activity.record_failure();
            }
        }
    }

    /// Handle one provider event.
    pub fn handle_event(&mut self, event: ProviderEvent) -> Option<FrameOutcome> {
        match event {
            ProviderEvent::Sample(sample) => Some(self.process_sample(&sample)),
            ProviderEvent::Error(message) => {
                tracing::warn!("Landmark provider: {message}");
                self.activity.record_provider_error();
                None
            }
        }
    }

    /// Pull events until the stream ends or `running` is cleared.
    pub fn run(&mut self, events: &Receiver<ProviderEvent>, running: &AtomicBool) -> RunSummary {
        let mut stop_reason = StopReason::Interrupted;

        while running.load(Ordering::SeqCst) {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    self.handle_event(event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Landmark stream ended");
                    stop_reason = StopReason::EndOfStream;
                    break;
                }
            }
            self.collect_reports();
        }

        RunSummary {
            frames: self.frames,
            fired: self.fired,
            stop_reason,
        }
    }

    /// Wait for in-flight backend calls and persist the activity log.
    pub fn shutdown(&mut self) -> std::io::Result<()> {
        let reports = self.dispatcher.shutdown();
        self.record_reports(&reports);
        self.activity.save()
    }
}
