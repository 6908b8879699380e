//! Raspberry Pi GPIO backend for the indicator.

use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

use crate::indicator::LightDriver;
use crate::{Color, HardwareError, LightPins};

/// Indicator driven through three GPIO output pins.
///
/// The pins reset to their original mode when this value is dropped.
#[derive(Debug)]
pub struct GpioLight {
    red: OutputPin,
    green: OutputPin,
    blue: OutputPin,
}

impl GpioLight {
    /// Claims the three pins as low outputs.
    pub fn open(pins: LightPins) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        let red = gpio.get(pins.red)?.into_output_low();
        let green = gpio.get(pins.green)?.into_output_low();
        let blue = gpio.get(pins.blue)?.into_output_low();
        debug!(?pins, "GPIO indicator pins claimed");
        Ok(Self { red, green, blue })
    }
}

fn drive(pin: &mut OutputPin, high: bool) {
    if high {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

impl LightDriver for GpioLight {
    fn apply(&mut self, color: Color) -> Result<(), HardwareError> {
        drive(&mut self.red, color.red);
        drive(&mut self.green, color.green);
        drive(&mut self.blue, color.blue);
        Ok(())
    }
}
