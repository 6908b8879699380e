//! Rollcall Hardware
//!
//! Drivers for the two physical collaborators of the attendance station:
//! the tri-color indicator light and the RFID tag reader.
//!
//! Both are exposed behind small traits ([`LightDriver`], [`TagReader`]) so
//! the station can run against real GPIO lines, a line-oriented reader
//! device, or the in-process fakes used by the test suites.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "rpi")]
pub mod gpio;
pub mod indicator;
pub mod reader;

#[cfg(feature = "rpi")]
pub use gpio::GpioLight;
pub use indicator::{IndicatorLight, LightDriver, LogLight, RecordingLight};
pub use reader::{LineTagReader, RawTag, ScriptedReader, TagReader};

/// Errors that can occur while driving station hardware.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// The reader device could not be opened.
    #[error("failed to open reader device '{path}': {source}")]
    ReaderOpen {
        /// Path of the reader device.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Reading from the tag reader failed.
    #[error("tag read failed: {0}")]
    Read(#[from] std::io::Error),

    /// Writing the indicator output lines failed.
    #[error("indicator write failed: {0}")]
    Indicator(String),

    /// The indicator was used after it had been released.
    #[error("indicator already released")]
    Released,

    /// GPIO access failed.
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// One of the three output lines of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Red line.
    Red,
    /// Green line.
    Green,
    /// Blue line.
    Blue,
}

impl Channel {
    /// All channels in self-test order.
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Blue];
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

/// A color state of the indicator: each channel independently on or off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Color {
    /// Red line is driven high.
    pub red: bool,
    /// Green line is driven high.
    pub green: bool,
    /// Blue line is driven high.
    pub blue: bool,
}

impl Color {
    /// All channels off.
    pub const OFF: Self = Self::rgb(false, false, false);
    /// Red only.
    pub const RED: Self = Self::rgb(true, false, false);
    /// Green only.
    pub const GREEN: Self = Self::rgb(false, true, false);
    /// Blue only.
    pub const BLUE: Self = Self::rgb(false, false, true);
    /// Green and blue.
    pub const GREEN_BLUE: Self = Self::rgb(false, true, true);
    /// Red and blue.
    pub const RED_BLUE: Self = Self::rgb(true, false, true);
    /// Red and green.
    pub const RED_GREEN: Self = Self::rgb(true, true, false);
    /// All channels on.
    pub const WHITE: Self = Self::rgb(true, true, true);

    /// Builds a color from individual channel states.
    #[must_use]
    pub const fn rgb(red: bool, green: bool, blue: bool) -> Self {
        Self { red, green, blue }
    }

    /// Builds a color with only `channel` on.
    #[must_use]
    pub const fn only(channel: Channel) -> Self {
        Self::OFF.with(channel)
    }

    /// Returns this color with `channel` switched on.
    #[must_use]
    pub const fn with(self, channel: Channel) -> Self {
        match channel {
            Channel::Red => Self { red: true, ..self },
            Channel::Green => Self { green: true, ..self },
            Channel::Blue => Self { blue: true, ..self },
        }
    }

    /// Returns this color with `channel` switched off.
    #[must_use]
    pub const fn without(self, channel: Channel) -> Self {
        match channel {
            Channel::Red => Self { red: false, ..self },
            Channel::Green => Self { green: false, ..self },
            Channel::Blue => Self { blue: false, ..self },
        }
    }

    /// Returns whether `channel` is on.
    #[must_use]
    pub const fn is_on(&self, channel: Channel) -> bool {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }

    /// Returns whether every channel is off.
    #[must_use]
    pub const fn is_off(&self) -> bool {
        !self.red && !self.green && !self.blue
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_off() {
            return write!(f, "off");
        }
        let names: Vec<String> = Channel::ALL
            .iter()
            .filter(|channel| self.is_on(**channel))
            .map(ToString::to_string)
            .collect();
        write!(f, "{}", names.join("+"))
    }
}

/// BCM pin numbers of the three indicator lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightPins {
    /// Red line.
    pub red: u8,
    /// Green line.
    pub green: u8,
    /// Blue line.
    pub blue: u8,
}

impl Default for LightPins {
    fn default() -> Self {
        Self {
            red: 15,
            green: 18,
            blue: 17,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn color_default_is_off() {
        assert_eq!(Color::default(), Color::OFF);
        assert!(Color::OFF.is_off());
    }

    #[test]
    fn color_with_and_without_toggle_single_channel() {
        let color = Color::GREEN.with(Channel::Blue);
        assert_eq!(color, Color::GREEN_BLUE);

        let color = color.without(Channel::Green);
        assert_eq!(color, Color::BLUE);
        assert!(!color.is_on(Channel::Green));
    }

    #[test]
    fn color_only_matches_constants() {
        assert_eq!(Color::only(Channel::Red), Color::RED);
        assert_eq!(Color::only(Channel::Green), Color::GREEN);
        assert_eq!(Color::only(Channel::Blue), Color::BLUE);
    }

    #[test]
    fn color_display() {
        assert_eq!(Color::OFF.to_string(), "off");
        assert_eq!(Color::RED.to_string(), "red");
        assert_eq!(Color::RED_BLUE.to_string(), "red+blue");
        assert_eq!(Color::WHITE.to_string(), "red+green+blue");
    }

    #[test]
    fn channel_serializes_to_snake_case() {
        let json = serde_json::to_string(&Channel::Green).unwrap();
        assert_eq!(json, r#""green""#);
    }

    #[test]
    fn light_pins_default_to_station_wiring() {
        let pins = LightPins::default();
        assert_eq!((pins.red, pins.green, pins.blue), (15, 18, 17));
    }

    #[test]
    fn hardware_error_display() {
        let err = HardwareError::Indicator("line stuck".to_string());
        assert_eq!(err.to_string(), "indicator write failed: line stuck");
    }
}
