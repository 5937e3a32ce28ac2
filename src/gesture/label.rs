//! The closed set of gesture labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete outcome of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    Heart,
    OpenPalm,
    Fist,
    ThumbsUp,
    ThumbsDown,
    Peace,
    RockOn,
    OkSign,
    Point,
    /// No recognized gesture, including no hand in frame
    None,
}

impl GestureLabel {
    /// Every label that can trigger an action.
    pub const RECOGNIZED: [GestureLabel; 9] = [
        GestureLabel::Heart,
        GestureLabel::OpenPalm,
        GestureLabel::Fist,
        GestureLabel::ThumbsUp,
        GestureLabel::ThumbsDown,
        GestureLabel::Peace,
        GestureLabel::RockOn,
        GestureLabel::OkSign,
        GestureLabel::Point,
    ];

    /// Configuration key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::OpenPalm => "open_palm",
            Self::Fist => "fist",
            Self::ThumbsUp => "thumbs_up",
            Self::ThumbsDown => "thumbs_down",
            Self::Peace => "peace",
            Self::RockOn => "rock_on",
            Self::OkSign => "ok_sign",
            Self::Point => "point",
            Self::None => "none",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Heart => "Heart",
            Self::OpenPalm => "Open Palm",
            Self::Fist => "Fist",
            Self::ThumbsUp => "Thumbs Up",
            Self::ThumbsDown => "Thumbs Down",
            Self::Peace => "Peace",
            Self::RockOn => "Rock On",
            Self::OkSign => "OK",
            Self::Point => "Point",
            Self::None => "None",
        }
    }

    /// Terminal-friendly glyph for debug output.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Heart => "❤️",
            Self::OpenPalm => "🖐️",
            Self::Fist => "✊",
            Self::ThumbsUp => "👍",
            Self::ThumbsDown => "👎",
            Self::Peace => "✌️",
            Self::RockOn => "🤘",
            Self::OkSign => "👌",
            Self::Point => "☝️",
            Self::None => "·",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a configuration key names no known gesture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown gesture '{0}'")]
pub struct UnknownGesture(pub String);

impl FromStr for GestureLabel {
    type Err = UnknownGesture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "heart" => Ok(Self::Heart),
            "open_palm" | "palm" => Ok(Self::OpenPalm),
            "fist" => Ok(Self::Fist),
            "thumbs_up" => Ok(Self::ThumbsUp),
            "thumbs_down" => Ok(Self::ThumbsDown),
            "peace" => Ok(Self::Peace),
            "rock_on" | "rock" => Ok(Self::RockOn),
            "ok_sign" | "ok" => Ok(Self::OkSign),
            "point" => Ok(Self::Point),
            "none" => Ok(Self::None),
            _ => Err(UnknownGesture(s.to_string())),
        }
    }
}
