//! Per-gesture cooldown bookkeeping.

use crate::gesture::GestureLabel;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Time of the last dispatch per label.
///
/// A label gets an entry only when it fires.
#[derive(Debug, Default)]
pub(crate) struct CooldownState {
    last_fired: HashMap<GestureLabel, DateTime<Utc>>,
}

impl CooldownState {
    /// Time left before `label` may fire again, or `None` if it is eligible.
    pub fn remaining(
        &self,
        label: GestureLabel,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = self.last_fired.get(&label)?;
        // A clock step backwards counts as no time elapsed.
        let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
        cooldown.checked_sub(elapsed).filter(|left| !left.is_zero())
    }

    pub fn record(&mut self, label: GestureLabel, now: DateTime<Utc>) {
        self.last_fired.insert(label, now);
    }

    pub fn last_fired(&self, label: GestureLabel) -> Option<DateTime<Utc>> {
        self.last_fired.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }
}
