//! Indicator buttons and their colour compositions
//!
//! A bicolor button has independent red and green LEDs; a toggle button has a
//! single LED. Colours are just combinations of plain LED writes.

use serde::{Deserialize, Serialize};

use super::LedId;

/// Physical LED arrangement behind a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Bicolor { red: LedId, green: LedId },
    Toggle { id: LedId },
}

/// Colour requested for an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    Off,
    /// Toggle buttons only
    On,
    /// Bicolor buttons only
    Red,
    /// Bicolor buttons only
    Green,
    /// Bicolor buttons only
    Amber,
}

impl Indicator {
    /// LED writes that produce `color` on this indicator
    ///
    /// Returns an empty list when the colour does not apply to the
    /// arrangement (e.g. `On` for a bicolor button).
    pub fn writes(self, color: LedColor) -> Vec<(LedId, bool)> {
        match (self, color) {
            (Indicator::Bicolor { red, green }, LedColor::Green) => vec![(green, true), (red, false)],
            (Indicator::Bicolor { red, green }, LedColor::Red) => vec![(green, false), (red, true)],
            (Indicator::Bicolor { red, green }, LedColor::Amber) => vec![(red, true), (green, true)],
            (Indicator::Bicolor { red, green }, LedColor::Off) => vec![(red, false), (green, false)],
            (Indicator::Bicolor { .. }, LedColor::On) => Vec::new(),
            (Indicator::Toggle { id }, LedColor::On) => vec![(id, true)],
            (Indicator::Toggle { id }, LedColor::Off) => vec![(id, false)],
            (Indicator::Toggle { .. }, _) => Vec::new(),
        }
    }

    /// Every LED id this indicator drives
    pub fn leds(self) -> Vec<LedId> {
        match self {
            Indicator::Bicolor { red, green } => vec![red, green],
            Indicator::Toggle { id } => vec![id],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRE_A: Indicator = Indicator::Bicolor { red: 1, green: 2 };
    const THROTTLE: Indicator = Indicator::Toggle { id: 19 };

    #[test]
    fn test_bicolor_colors() {
        assert_eq!(FIRE_A.writes(LedColor::Green), vec![(2, true), (1, false)]);
        assert_eq!(FIRE_A.writes(LedColor::Red), vec![(2, false), (1, true)]);
        assert_eq!(FIRE_A.writes(LedColor::Amber), vec![(1, true), (2, true)]);
        assert_eq!(FIRE_A.writes(LedColor::Off), vec![(1, false), (2, false)]);
    }

    #[test]
    fn test_on_is_noop_for_bicolor() {
        assert!(FIRE_A.writes(LedColor::On).is_empty());
    }

    #[test]
    fn test_toggle_colors() {
        assert_eq!(THROTTLE.writes(LedColor::On), vec![(19, true)]);
        assert_eq!(THROTTLE.writes(LedColor::Off), vec![(19, false)]);
        for color in [LedColor::Red, LedColor::Green, LedColor::Amber] {
            assert!(THROTTLE.writes(color).is_empty(), "{color:?} should be ignored");
        }
    }

    #[test]
    fn test_color_deserializes_lowercase() {
        let color: LedColor = serde_yaml::from_str("amber").unwrap();
        assert_eq!(color, LedColor::Amber);
    }
}
