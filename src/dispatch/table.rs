//! Gesture → action table, fixed at startup.

use crate::gesture::GestureLabel;
use std::collections::BTreeMap;
use std::time::Duration;

/// Cooldown used when a config entry omits one.
pub const DEFAULT_COOLDOWN_SECS: f64 = 2.0;

/// What a configured gesture does.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureAction {
    pub display_name: String,
    /// Backend action identifier, e.g. `lights_toggle`
    pub action: String,
    pub description: String,
    pub cooldown: Duration,
}

/// Rejected cooldown value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cooldown must be a positive number of seconds, got {0}")]
pub struct InvalidCooldown(pub f64);

impl GestureAction {
    pub fn new(
        display_name: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
        cooldown_secs: f64,
    ) -> Result<Self, InvalidCooldown> {
        if !cooldown_secs.is_finite() || cooldown_secs <= 0.0 {
            return Err(InvalidCooldown(cooldown_secs));
        }
        let cooldown = Duration::try_from_secs_f64(cooldown_secs)
            .map_err(|_| InvalidCooldown(cooldown_secs))?;

        Ok(Self {
            display_name: display_name.into(),
            action: action.into(),
            description: description.into(),
            cooldown,
        })
    }
}

/// Configured gestures. Labels without an entry never dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureTable {
    entries: BTreeMap<GestureLabel, GestureAction>,
}

impl GestureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry. `GestureLabel::None` is never stored.
    pub fn insert(&mut self, label: GestureLabel, action: GestureAction) -> bool {
        if label.is_none() {
            return false;
        }
        self.entries.insert(label, action);
        true
    }

    pub fn with(mut self, label: GestureLabel, action: GestureAction) -> Self {
        self.insert(label, action);
        self
    }

    pub fn get(&self, label: GestureLabel) -> Option<&GestureAction> {
        self.entries.get(&label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GestureLabel, &GestureAction)> {
        self.entries.iter().map(|(label, action)| (*label, action))
    }
}
