//! The station main loop.
//!
//! [`Station`] owns the indicator, the tag reader and the directory for the
//! life of the process. [`Station::run_until`] runs the self-test, then scan
//! cycles one at a time until the shutdown future resolves or the reader
//! closes, and releases the indicator on every exit path.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rollcall_directory::DirectoryService;
use rollcall_hardware::{HardwareError, IndicatorLight, LightDriver, RawTag, TagReader};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::course::CoursePicker;
use crate::cycle::{CycleOutcome, ScanCycle};
use crate::error::Result;
use crate::retry::RetryPolicy;

// ============================================================================
// SessionSummary
// ============================================================================

/// Outcome counts for one run of the station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Attendance records inserted.
    pub recorded: u32,
    /// Payloads rejected by validation.
    pub invalid: u32,
    /// Tags whose student was not found.
    pub student_not_found: u32,
    /// Cycles whose drawn course had no professor.
    pub professor_not_found: u32,
    /// Cycles abandoned on a directory failure.
    pub faults: u32,
}

impl SessionSummary {
    /// Counts `outcome`.
    pub fn record(&mut self, outcome: &CycleOutcome) {
        let counter = match outcome {
            CycleOutcome::Recorded { .. } => &mut self.recorded,
            CycleOutcome::Invalid { .. } => &mut self.invalid,
            CycleOutcome::StudentNotFound { .. } => &mut self.student_not_found,
            CycleOutcome::ProfessorNotFound { .. } => &mut self.professor_not_found,
            CycleOutcome::Fault { .. } => &mut self.faults,
        };
        *counter = counter.saturating_add(1);
    }

    /// Total number of tags processed.
    #[must_use]
    pub const fn scans(&self) -> u32 {
        self.recorded
            .saturating_add(self.invalid)
            .saturating_add(self.student_not_found)
            .saturating_add(self.professor_not_found)
            .saturating_add(self.faults)
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scans: {} recorded, {} invalid, {} unknown students, {} without professor, {} faults",
            self.scans(),
            self.recorded,
            self.invalid,
            self.student_not_found,
            self.professor_not_found,
            self.faults
        )
    }
}

// ============================================================================
// Station
// ============================================================================

/// The attendance station: one indicator, one reader, one directory.
pub struct Station<L: LightDriver, R: TagReader, D: DirectoryService> {
    light: IndicatorLight<L>,
    reader: R,
    directory: D,
    courses: CoursePicker,
    policy: RetryPolicy,
    armed_delay: Duration,
}

impl<L: LightDriver, R: TagReader, D: DirectoryService> Station<L, R, D> {
    /// Assembles a station from its parts and the loaded configuration.
    pub fn new(light: IndicatorLight<L>, reader: R, directory: D, config: &Config) -> Self {
        Self {
            light,
            reader,
            directory,
            courses: CoursePicker::new(config.courses.clone()),
            policy: config.retry_policy(),
            armed_delay: config.armed_delay(),
        }
    }

    /// Replaces the course picker, e.g. with a seeded one.
    #[must_use]
    pub fn with_course_picker(mut self, courses: CoursePicker) -> Self {
        self.courses = courses;
        self
    }

    /// The directory the station records into.
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    /// Processes a tag that has already been read, skipping the armed wait.
    pub async fn process(
        &mut self,
        tag: &RawTag,
    ) -> std::result::Result<CycleOutcome, HardwareError> {
        ScanCycle::new(
            &mut self.light,
            &self.directory,
            &mut self.courses,
            self.policy,
        )
        .process(tag)
        .await
    }

    /// Runs the scan loop until `shutdown` resolves or the reader closes.
    ///
    /// The self-test runs first. Shutdown interrupts the armed wait and the
    /// read; a tag already read is processed to the end. The indicator is
    /// switched off and released before this returns, including when the
    /// loop fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the indicator or the reader fails.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<SessionSummary>
    where
        F: Future<Output = ()>,
    {
        let mut summary = SessionSummary::default();
        let result = self.scan_loop(shutdown, &mut summary).await;

        let released = self.light.release();
        info!(%summary, "Station stopped");

        result?;
        released?;
        Ok(summary)
    }

    async fn scan_loop<F>(
        &mut self,
        shutdown: F,
        summary: &mut SessionSummary,
    ) -> std::result::Result<(), HardwareError>
    where
        F: Future<Output = ()>,
    {
        self.light.self_test().await?;
        info!(
            courses = self.courses.courses().len(),
            armed_delay_ms = u64::try_from(self.armed_delay.as_millis()).unwrap_or(u64::MAX),
            "Station ready"
        );

        tokio::pin!(shutdown);

        loop {
            let mut cycle = ScanCycle::new(
                &mut self.light,
                &self.directory,
                &mut self.courses,
                self.policy,
            );

            let tag = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                read = cycle.arm_and_read(&mut self.reader, self.armed_delay) => read?,
            };

            let Some(tag) = tag else {
                warn!("Tag reader closed");
                return Ok(());
            };

            let outcome = cycle.process(&tag).await?;
            summary.record(&outcome);
        }
    }
}
