//! Indicator patterns for each phase and outcome of a scan cycle.

use std::time::Duration;

use rollcall_hardware::{Channel, Color, HardwareError, IndicatorLight, LightDriver};
use serde::Serialize;

/// On and off time of each blink of the student-not-found pattern.
pub const NOT_FOUND_BLINK: Duration = Duration::from_millis(250);

/// How long the professor-not-found and recorded patterns stay lit.
pub const RESULT_HOLD: Duration = Duration::from_millis(500);

/// On and off time of each blink of the fault pattern.
pub const FAULT_BLINK: Duration = Duration::from_millis(150);

/// Number of blinks in the fault pattern.
pub const FAULT_BLINKS: u32 = 3;

/// Something the indicator tells the person at the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Red steady: ready for a tag.
    Armed,
    /// Green steady: the tag is well-formed.
    Accepted,
    /// Green and blue steady: directory lookups in progress.
    LookingUp,
    /// Red switched off, nothing else.
    Invalid,
    /// Red double blink.
    StudentNotFound,
    /// Red and blue for half a second.
    ProfessorNotFound,
    /// Green and blue for half a second.
    Recorded,
    /// Red and green (amber) triple blink.
    Fault,
}

impl Signal {
    /// Drives `light` through this signal's pattern.
    ///
    /// Steady signals return immediately and leave the color showing; the
    /// timed patterns return once the indicator is dark again.
    pub async fn show<D: LightDriver>(
        self,
        light: &mut IndicatorLight<D>,
    ) -> Result<(), HardwareError> {
        match self {
            Self::Armed => light.set(Color::RED),
            Self::Accepted => light.set(Color::GREEN),
            Self::LookingUp => light.on(Channel::Blue),
            Self::Invalid => light.off(Channel::Red),
            Self::StudentNotFound => {
                light
                    .blink(Color::RED, 2, NOT_FOUND_BLINK, NOT_FOUND_BLINK)
                    .await
            }
            Self::ProfessorNotFound => light.flash(Color::RED_BLUE, RESULT_HOLD).await,
            Self::Recorded => light.flash(Color::GREEN_BLUE, RESULT_HOLD).await,
            Self::Fault => {
                light
                    .blink(Color::RED_GREEN, FAULT_BLINKS, FAULT_BLINK, FAULT_BLINK)
                    .await
            }
        }
    }
}
