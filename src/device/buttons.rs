//! X52 Pro indicator button table
//!
//! LED ids follow the DirectOutput SDK numbering for the X52 Pro: bicolor
//! buttons take a (red, green) pair, the fire button and the throttle have a
//! single LED.

use serde::{Deserialize, Serialize};

use crate::page::{Indicator, LedId};

/// Buttons with LEDs on the X52 Pro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum X52Button {
    Fire,
    FireA,
    FireB,
    FireD,
    FireE,
    #[serde(alias = "Toggle1-2")]
    Toggle1_2,
    #[serde(alias = "Toggle3-4")]
    Toggle3_4,
    #[serde(alias = "Toggle5-6")]
    Toggle5_6,
    Pov2,
    Clutch,
    Throttle,
}

impl X52Button {
    pub const ALL: [X52Button; 11] = [
        X52Button::Fire,
        X52Button::FireA,
        X52Button::FireB,
        X52Button::FireD,
        X52Button::FireE,
        X52Button::Toggle1_2,
        X52Button::Toggle3_4,
        X52Button::Toggle5_6,
        X52Button::Pov2,
        X52Button::Clutch,
        X52Button::Throttle,
    ];

    pub const fn indicator(self) -> Indicator {
        match self {
            X52Button::Fire => Indicator::Toggle { id: 0 },
            X52Button::FireA => bicolor(1, 2),
            X52Button::FireB => bicolor(3, 4),
            X52Button::FireD => bicolor(5, 6),
            X52Button::FireE => bicolor(7, 8),
            X52Button::Toggle1_2 => bicolor(9, 10),
            X52Button::Toggle3_4 => bicolor(11, 12),
            X52Button::Toggle5_6 => bicolor(13, 14),
            X52Button::Pov2 => bicolor(15, 16),
            X52Button::Clutch => bicolor(17, 18),
            X52Button::Throttle => Indicator::Toggle { id: 19 },
        }
    }
}

const fn bicolor(red: LedId, green: LedId) -> Indicator {
    Indicator::Bicolor { red, green }
}

impl From<X52Button> for Indicator {
    fn from(button: X52Button) -> Self {
        button.indicator()
    }
}
