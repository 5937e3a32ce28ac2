//! Per-frame dispatch decisions.

use crate::backend::{Backend, BackendError};
use crate::dispatch::cooldown::CooldownState;
use crate::dispatch::executor::{ActionExecutor, ExecutionReport};
use crate::dispatch::table::GestureTable;
use crate::gesture::GestureLabel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A fired gesture, as handed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEvent {
    pub id: Uuid,
    pub gesture: GestureLabel,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl ActionEvent {
    pub fn new(gesture: GestureLabel, action: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            gesture,
            action: action.into(),
            timestamp,
        }
    }
}

/// What happened to a fired event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Backend call completed successfully
    Sent,
    /// Dry run; no backend call
    DryRun,
    /// Handed to the executor; see its reports
    Queued,
    /// Backend call (or queueing) failed; the cooldown still applies
    Failed(BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub event: ActionEvent,
    pub outcome: DispatchOutcome,
}

/// Result of feeding one frame's label to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NoGesture,
    Unconfigured(GestureLabel),
    Cooling {
        gesture: GestureLabel,
        remaining: Duration,
    },
    Fired(Dispatched),
}

/// Dispatch state of one label at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureState {
    /// Not seen on the latest frame and not cooling
    Idle,
    /// Seen on the latest frame and eligible to fire
    Armed,
    /// Fired within its cooldown window
    Cooling,
}

/// How fired events reach the backend.
pub enum Delivery {
    /// Call the backend on the frame loop's thread.
    Inline(Arc<dyn Backend>),
    /// Hand events to per-label worker threads.
    Offloaded(ActionExecutor),
}

impl Delivery {
    pub fn backend_name(&self) -> &str {
        match self {
            Delivery::Inline(backend) => backend.name(),
            Delivery::Offloaded(executor) => executor.backend_name(),
        }
    }
}

/// Debounces labels into rate-limited backend calls.
///
/// Owns the only mutable state of the pipeline: when each label last fired.
/// Time is passed in by the caller.
pub struct Dispatcher {
    table: GestureTable,
    cooldowns: CooldownState,
    delivery: Delivery,
    dry_run: bool,
    last_observed: Option<GestureLabel>,
}

impl Dispatcher {
    /// Build a dispatcher around a fixed gesture table.
    pub fn configure(table: GestureTable, delivery: Delivery) -> Self {
        Self {
            table,
            cooldowns: CooldownState::default(),
            delivery,
            dry_run: false,
            last_observed: None,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        if dry_run {
            tracing::info!("DRY RUN mode: no commands will be sent to the backend");
        }
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn backend_name(&self) -> &str {
        self.delivery.backend_name()
    }

    /// Process one frame's label.
    pub fn step(&mut self, label: GestureLabel, now: DateTime<Utc>) -> Decision {
        self.last_observed = (!label.is_none()).then_some(label);
        if label.is_none() {
            return Decision::NoGesture;
        }

        let Some(entry) = self.table.get(label) else {
            tracing::debug!(gesture = %label, "No action configured for gesture");
            return Decision::Unconfigured(label);
        };

        if let Some(remaining) = self.cooldowns.remaining(label, entry.cooldown, now) {
            tracing::trace!(
                gesture = %label,
                remaining_ms = remaining.as_millis() as u64,
                "Gesture cooling down"
            );
            return Decision::Cooling {
                gesture: label,
                remaining,
            };
        }

        // Recorded before delivery so a failed or slow call still counts.
        self.cooldowns.record(label, now);
        let event = ActionEvent::new(label, entry.action.clone(), now);

        let outcome = if self.dry_run {
            tracing::info!(
                gesture = entry.display_name.as_str(),
                action = entry.action.as_str(),
                description = entry.description.as_str(),
                "[DRY RUN] would dispatch"
            );
            DispatchOutcome::DryRun
        } else {
            self.deliver(&event)
        };

        Decision::Fired(Dispatched { event, outcome })
    }

    /// [`step`](Self::step), keeping only fired events.
    pub fn on_frame(&mut self, label: GestureLabel, now: DateTime<Utc>) -> Option<Dispatched> {
        match self.step(label, now) {
            Decision::Fired(dispatched) => Some(dispatched),
            _ => None,
        }
    }

    fn deliver(&mut self, event: &ActionEvent) -> DispatchOutcome {
        match &mut self.delivery {
            Delivery::Inline(backend) => match backend.execute(&event.action) {
                Ok(()) => {
                    tracing::info!(
                        gesture = %event.gesture,
                        action = %event.action,
                        "Action -> OK"
                    );
                    DispatchOutcome::Sent
                }
                Err(e) => {
                    tracing::warn!(
                        gesture = %event.gesture,
                        action = %event.action,
                        "Action -> FAILED: {e}"
                    );
                    DispatchOutcome::Failed(e)
                }
            },
            Delivery::Offloaded(executor) => match executor.submit(event.clone()) {
                Ok(()) => {
                    tracing::debug!(
                        gesture = %event.gesture,
                        action = %event.action,
                        id = %event.id,
                        "Action queued"
                    );
                    DispatchOutcome::Queued
                }
                Err(e) => {
                    tracing::warn!(
                        gesture = %event.gesture,
                        action = %event.action,
                        "Action not queued: {e}"
                    );
                    DispatchOutcome::Failed(e)
                }
            },
        }
    }

    /// State of `label` as of `now`.
    pub fn state(&self, label: GestureLabel, now: DateTime<Utc>) -> GestureState {
        let cooling = self
            .table
            .get(label)
            .and_then(|entry| self.cooldowns.remaining(label, entry.cooldown, now))
            .is_some();

        if cooling {
            GestureState::Cooling
        } else if self.last_observed == Some(label) && self.table.get(label).is_some() {
            GestureState::Armed
        } else {
            GestureState::Idle
        }
    }

    /// When `label` last fired.
    pub fn last_fired(&self, label: GestureLabel) -> Option<DateTime<Utc>> {
        self.cooldowns.last_fired(label)
    }

    /// Executor reports completed since the last call.
    pub fn drain_reports(&self) -> Vec<ExecutionReport> {
        match &self.delivery {
            Delivery::Inline(_) => Vec::new(),
            Delivery::Offloaded(executor) => executor.drain(),
        }
    }

    /// Wait for queued calls and return their reports.
    pub fn shutdown(&mut self) -> Vec<ExecutionReport> {
        tracing::debug!(fired_labels = self.cooldowns.len(), "Dispatcher shutting down");
        match &mut self.delivery {
            Delivery::Inline(_) => Vec::new(),
            Delivery::Offloaded(executor) => executor.shutdown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::table::GestureAction;
    use crate::dispatch::testing::RecordingBackend;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn table(cooldown: f64) -> GestureTable {
        GestureTable::new()
            .with(
                GestureLabel::Heart,
                GestureAction::new("Heart", "lights_toggle", "Toggle lights", cooldown).unwrap(),
            )
            .with(
                GestureLabel::Fist,
                GestureAction::new("Fist", "ac_off", "AC off", cooldown).unwrap(),
            )
    }

    fn inline(backend: &Arc<RecordingBackend>, cooldown: f64) -> Dispatcher {
        Dispatcher::configure(table(cooldown), Delivery::Inline(backend.clone()))
    }

    #[test]
    fn test_sustained_gesture_fires_once_per_cooldown() {
        let backend = Arc::new(RecordingBackend::default());
        let mut dispatcher = inline(&backend, 2.5);

        let fired = (0..10)
            .filter_map(|i| dispatcher.on_frame(GestureLabel::Heart, at(i * 100)))
            .count();
        assert_eq!(fired, 1);

        let again = dispatcher.on_frame(GestureLabel::Heart, at(2600)).unwrap();
        assert_eq!(again.event.action, "lights_toggle");
        assert_eq!(again.event.timestamp, at(2600));
        assert_eq!(backend.calls(), vec!["lights_toggle", "lights_toggle"]);
    }

    #[test]
    fn test_dry_run_never_calls_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let mut dispatcher = inline(&backend, 1.0).with_dry_run(true);
        assert!(dispatcher.is_dry_run());

        let first = dispatcher.on_frame(GestureLabel::Fist, at(0)).unwrap();
        assert_eq!(first.outcome, DispatchOutcome::DryRun);
        assert_eq!(first.event.gesture, GestureLabel::Fist);

        let second = dispatcher.on_frame(GestureLabel::Fist, at(1500)).unwrap();
        assert_eq!(second.outcome, DispatchOutcome::DryRun);
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_failure_does_not_reset_cooldown() {
        let backend = Arc::new(RecordingBackend::failing());
        let mut dispatcher = inline(&backend, 2.0);

        let first = dispatcher.on_frame(GestureLabel::Heart, at(0)).unwrap();
        assert!(matches!(first.outcome, DispatchOutcome::Failed(_)));

        assert_eq!(
            dispatcher.step(GestureLabel::Heart, at(500)),
            Decision::Cooling {
                gesture: GestureLabel::Heart,
                remaining: Duration::from_millis(1500)
            }
        );
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn test_unconfigured_and_none_are_inert() {
        let backend = Arc::new(RecordingBackend::default());
        let mut dispatcher = inline(&backend, 2.0);

        assert_eq!(
            dispatcher.step(GestureLabel::Peace, at(0)),
            Decision::Unconfigured(GestureLabel::Peace)
        );
        assert_eq!(dispatcher.step(GestureLabel::None, at(0)), Decision::NoGesture);
        assert_eq!(backend.call_count(), 0);
        assert!(dispatcher.last_fired(GestureLabel::Peace).is_none());
    }

    #[test]
    fn test_cooldowns_are_per_label() {
        let backend = Arc::new(RecordingBackend::default());
        let mut dispatcher = inline(&backend, 2.0);

        assert!(dispatcher.on_frame(GestureLabel::Heart, at(0)).is_some());
        assert!(dispatcher.on_frame(GestureLabel::Fist, at(100)).is_some());
        assert!(dispatcher.on_frame(GestureLabel::Heart, at(200)).is_none());
        assert_eq!(backend.calls(), vec!["lights_toggle", "ac_off"]);
    }

    #[test]
    fn test_state_transitions() {
        let backend = Arc::new(RecordingBackend::default());
        let mut dispatcher = inline(&backend, 1.0);
        let heart = GestureLabel::Heart;

        assert_eq!(dispatcher.state(heart, at(0)), GestureState::Idle);

        dispatcher.step(heart, at(0));
        assert_eq!(dispatcher.state(heart, at(500)), GestureState::Cooling);
        // Still held when the window closes: will fire on the next frame.
        assert_eq!(dispatcher.state(heart, at(1000)), GestureState::Armed);

        dispatcher.step(GestureLabel::None, at(1100));
        assert_eq!(dispatcher.state(heart, at(1100)), GestureState::Idle);
        assert_eq!(dispatcher.state(GestureLabel::Peace, at(1100)), GestureState::Idle);
    }

    #[test]
    fn test_offloaded_delivery_reports_later() {
        let backend = Arc::new(RecordingBackend::default());
        let executor = ActionExecutor::new(backend.clone(), Duration::from_secs(5));
        let mut dispatcher = Dispatcher::configure(table(2.0), Delivery::Offloaded(executor));
        assert_eq!(dispatcher.backend_name(), "recording");

        let dispatched = dispatcher.on_frame(GestureLabel::Fist, at(0)).unwrap();
        assert_eq!(dispatched.outcome, DispatchOutcome::Queued);

        let reports = dispatcher.shutdown();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].event.id, dispatched.event.id);
        assert_eq!(backend.calls(), vec!["ac_off"]);
    }
}
