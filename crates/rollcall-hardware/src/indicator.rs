//! Tri-color indicator light.
//!
//! [`LightDriver`] is the raw actuator: it drives the three output lines to
//! a [`Color`]. [`IndicatorLight`] owns a driver exclusively and layers the
//! timing primitives (flash, blink, self-test) on top of it. Dropping an
//! `IndicatorLight` forces every channel off, so the lines are reset on every
//! exit path of the station loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{Channel, Color, HardwareError};

/// How long each channel stays lit during the startup self-test.
pub const SELF_TEST_STEP: Duration = Duration::from_millis(500);

/// A device that can drive the three indicator lines.
pub trait LightDriver: Send {
    /// Drives every line to match `color`.
    fn apply(&mut self, color: Color) -> Result<(), HardwareError>;
}

impl<D: LightDriver + ?Sized> LightDriver for Box<D> {
    fn apply(&mut self, color: Color) -> Result<(), HardwareError> {
        (**self).apply(color)
    }
}

/// Exclusively-owned indicator with guaranteed release.
#[derive(Debug)]
pub struct IndicatorLight<D: LightDriver> {
    driver: Option<D>,
    current: Color,
}

impl<D: LightDriver> IndicatorLight<D> {
    /// Takes ownership of `driver` and forces all channels off.
    pub fn acquire(mut driver: D) -> Result<Self, HardwareError> {
        driver.apply(Color::OFF)?;
        debug!("Indicator acquired");
        Ok(Self {
            driver: Some(driver),
            current: Color::OFF,
        })
    }

    /// The color last written to the device.
    #[must_use]
    pub const fn current(&self) -> Color {
        self.current
    }

    /// Drives the indicator to `color`.
    pub fn set(&mut self, color: Color) -> Result<(), HardwareError> {
        let driver = self.driver.as_mut().ok_or(HardwareError::Released)?;
        driver.apply(color)?;
        self.current = color;
        Ok(())
    }

    /// Switches `channel` on, leaving the other channels as they are.
    pub fn on(&mut self, channel: Channel) -> Result<(), HardwareError> {
        self.set(self.current.with(channel))
    }

    /// Switches `channel` off, leaving the other channels as they are.
    pub fn off(&mut self, channel: Channel) -> Result<(), HardwareError> {
        self.set(self.current.without(channel))
    }

    /// Switches every channel off.
    pub fn clear(&mut self) -> Result<(), HardwareError> {
        self.set(Color::OFF)
    }

    /// Shows `color` for `duration`, then switches every channel off.
    pub async fn flash(&mut self, color: Color, duration: Duration) -> Result<(), HardwareError> {
        self.blink(color, 1, duration, Duration::ZERO).await
    }

    /// Blinks `color` `times` times: on for `on`, off, and a pause of `off`
    /// between consecutive blinks. Ends with every channel off.
    pub async fn blink(
        &mut self,
        color: Color,
        times: u32,
        on: Duration,
        off: Duration,
    ) -> Result<(), HardwareError> {
        for blink in 0..times {
            self.set(color)?;
            sleep(on).await;
            self.clear()?;
            if blink + 1 < times {
                sleep(off).await;
            }
        }
        Ok(())
    }

    /// Lights each channel individually for [`SELF_TEST_STEP`].
    pub async fn self_test(&mut self) -> Result<(), HardwareError> {
        info!("Running indicator self-test");
        self.clear()?;
        for channel in Channel::ALL {
            debug!(%channel, "Self-test channel");
            self.flash(Color::only(channel), SELF_TEST_STEP).await?;
        }
        Ok(())
    }

    /// Forces every channel off and hands the driver back.
    pub fn release(mut self) -> Result<D, HardwareError> {
        let mut driver = self.driver.take().ok_or(HardwareError::Released)?;
        driver.apply(Color::OFF)?;
        debug!("Indicator released");
        Ok(driver)
    }
}

impl<D: LightDriver> Drop for IndicatorLight<D> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            if let Err(e) = driver.apply(Color::OFF) {
                warn!(error = %e, "Failed to switch indicator off on drop");
            }
        }
    }
}

/// Indicator backend that only emits tracing events.
///
/// Used on a bench without the light attached.
#[derive(Debug, Default)]
pub struct LogLight {
    last: Color,
}

impl LogLight {
    /// Creates a new logging backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LightDriver for LogLight {
    fn apply(&mut self, color: Color) -> Result<(), HardwareError> {
        if color != self.last {
            info!(%color, "Indicator");
            self.last = color;
        }
        Ok(())
    }
}

/// Indicator backend that records every write.
///
/// Clones share the same history, so a test can keep one handle while the
/// station owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingLight {
    history: Arc<Mutex<Vec<Color>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingLight {
    /// Creates a new recording backend with an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every color written so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Color> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent color written, if any.
    #[must_use]
    pub fn last(&self) -> Option<Color> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    /// Forgets the recorded history.
    pub fn reset(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl LightDriver for RecordingLight {
    fn apply(&mut self, color: Color) -> Result<(), HardwareError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::Indicator("injected failure".to_string()));
        }
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(color);
        Ok(())
    }
}
