//! Session activity log.
//!
//! Counts what the agent saw and did. Counters are cumulative across runs
//! when the log is backed by a file.

use crate::gesture::GestureLabel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Activity counters for the agent.
#[derive(Debug)]
pub struct ActivityLog {
    /// Frames received from the provider
    frames: AtomicU64,
    /// Frames with a hand in them
    hands: AtomicU64,
    /// Frames rejected as malformed
    malformed: AtomicU64,
    /// Frames classified as a gesture other than None
    recognized: AtomicU64,
    /// Events handed to the backend
    dispatched: AtomicU64,
    /// Events computed in dry-run mode
    dry_run: AtomicU64,
    /// Failed or refused backend calls
    failures: AtomicU64,
    /// Frames suppressed by a cooldown
    cooldown_suppressed: AtomicU64,
    /// Frames with a gesture that has no action
    unconfigured: AtomicU64,
    /// Error lines from the provider
    provider_errors: AtomicU64,
    /// Fired events per gesture
    fired: Mutex<BTreeMap<GestureLabel, u64>>,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            hands: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            recognized: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            dry_run: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cooldown_suppressed: AtomicU64::new(0),
            unconfigured: AtomicU64::new(0),
            provider_errors: AtomicU64::new(0),
            fired: Mutex::new(BTreeMap::new()),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by `path`, starting from its saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous activity stats: {e}");
        }

        log
    }

    pub fn record_frame(&self, has_hand: bool) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        if has_hand {
            self.hands.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recognized(&self) {
        self.recognized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fired event, real or dry-run.
    pub fn record_fired(&self, gesture: GestureLabel, dry_run: bool) {
        if dry_run {
            self.dry_run.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
        }
        let mut fired = self.fired_counts();
        *fired.entry(gesture).or_insert(0) += 1;
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown_suppressed(&self) {
        self.cooldown_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unconfigured(&self) {
        self.unconfigured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_error(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn fired_counts(&self) -> std::sync::MutexGuard<'_, BTreeMap<GestureLabel, u64>> {
        self.fired.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            frames: self.frames.load(Ordering::Relaxed),
            hands: self.hands.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            recognized: self.recognized.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dry_run: self.dry_run.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cooldown_suppressed: self.cooldown_suppressed.load(Ordering::Relaxed),
            unconfigured: self.unconfigured.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            fired: self.fired_counts().clone(),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut text = format!(
            "Activity:\n\
             - Frames processed: {}\n\
             - Frames with a hand: {}\n\
             - Malformed frames skipped: {}\n\
             - Gestures recognized: {}\n\
             - Actions dispatched: {}\n\
             - Dry-run actions: {}\n\
             - Backend failures: {}\n\
             - Suppressed by cooldown: {}\n\
             - Unconfigured gestures: {}\n\
             - Provider errors: {}\n\
             - Session duration: {} seconds",
            stats.frames,
            stats.hands,
            stats.malformed,
            stats.recognized,
            stats.dispatched,
            stats.dry_run,
            stats.failures,
            stats.cooldown_suppressed,
            stats.unconfigured,
            stats.provider_errors,
            stats.session_duration_secs
        );

        if !stats.fired.is_empty() {
            text.push_str("\n\nFired by gesture:");
            for (gesture, count) in &stats.fired {
                text.push_str(&format!(
                    "\n - {} {}: {count}",
                    gesture.emoji(),
                    gesture.display_name()
                ));
            }
        }
        text
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedActivity {
                frames: stats.frames,
                hands: stats.hands,
                malformed: stats.malformed,
                recognized: stats.recognized,
                dispatched: stats.dispatched,
                dry_run: stats.dry_run,
                failures: stats.failures,
                cooldown_suppressed: stats.cooldown_suppressed,
                unconfigured: stats.unconfigured,
                provider_errors: stats.provider_errors,
                fired: stats.fired,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedActivity =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames.store(persisted.frames, Ordering::Relaxed);
                self.hands.store(persisted.hands, Ordering::Relaxed);
                self.malformed.store(persisted.malformed, Ordering::Relaxed);
                self.recognized.store(persisted.recognized, Ordering::Relaxed);
                self.dispatched.store(persisted.dispatched, Ordering::Relaxed);
                self.dry_run.store(persisted.dry_run, Ordering::Relaxed);
                self.failures.store(persisted.failures, Ordering::Relaxed);
                self.cooldown_suppressed
                    .store(persisted.cooldown_suppressed, Ordering::Relaxed);
                self.unconfigured
                    .store(persisted.unconfigured, Ordering::Relaxed);
                self.provider_errors
                    .store(persisted.provider_errors, Ordering::Relaxed);
                *self.fired_counts() = persisted.fired;
            }
        }
        Ok(())
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub frames: u64,
    pub hands: u64,
    pub malformed: u64,
    pub recognized: u64,
    pub dispatched: u64,
    pub dry_run: u64,
    pub failures: u64,
    pub cooldown_suppressed: u64,
    pub unconfigured: u64,
    pub provider_errors: u64,
    pub fired: BTreeMap<GestureLabel, u64>,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedActivity {
    frames: u64,
    hands: u64,
    malformed: u64,
    recognized: u64,
    dispatched: u64,
    dry_run: u64,
    failures: u64,
    cooldown_suppressed: u64,
    unconfigured: u64,
    #[serde(default)]
    provider_errors: u64,
    #[serde(default)]
    fired: BTreeMap<GestureLabel, u64>,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}
