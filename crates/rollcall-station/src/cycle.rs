//! One scan cycle: arm, read, validate, look up, record.
//!
//! A [`ScanCycle`] borrows the station's indicator, directory and course
//! picker for a single tag. Every per-tag failure (malformed payload, missing
//! record, directory fault) ends the cycle with a [`CycleOutcome`] and the
//! matching [`Signal`]. Only indicator or reader failures are returned as
//! errors.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rollcall_directory::{
    AttendanceRecord, DirectoryError, DirectoryOperation, DirectoryService, ServiceErrorKind,
};
use rollcall_hardware::{HardwareError, IndicatorLight, LightDriver, RawTag, TagReader};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::course::CoursePicker;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::signal::Signal;
use crate::tag::{StudentId, TagFormatError};

// ============================================================================
// ScanPhase
// ============================================================================

/// Where a scan cycle currently is.
///
/// A cycle moves `Idle` -> `Armed` -> `Reading` -> `Validating`, then on
/// through `LookupStudent` -> `LookupProfessor` -> `Recording` for as long as
/// each step succeeds, and returns to `Idle` when it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Between cycles.
    #[default]
    Idle,
    /// Indicator red, waiting out the armed delay.
    Armed,
    /// Waiting on the tag reader.
    Reading,
    /// Checking the payload format.
    Validating,
    /// Querying the student collection.
    LookupStudent,
    /// Querying the professor collection for the drawn course.
    LookupProfessor,
    /// Inserting the attendance record.
    Recording,
}

impl ScanPhase {
    /// Returns `true` while a directory call may be in flight.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollcall_station::ScanPhase;
    ///
    /// assert!(ScanPhase::Recording.is_directory_call());
    /// assert!(!ScanPhase::Reading.is_directory_call());
    /// ```
    #[must_use]
    pub const fn is_directory_call(&self) -> bool {
        matches!(
            self,
            Self::LookupStudent | Self::LookupProfessor | Self::Recording
        )
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Reading => "reading",
            Self::Validating => "validating",
            Self::LookupStudent => "lookup_student",
            Self::LookupProfessor => "lookup_professor",
            Self::Recording => "recording",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// CycleOutcome
// ============================================================================

/// How a scan cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The payload is not a student tag. No lookups were made.
    Invalid {
        /// Payload as read.
        payload: String,
        /// Rule the payload broke.
        reason: TagFormatError,
    },

    /// No student has this number.
    StudentNotFound {
        /// Number taken from the tag.
        student_id: String,
    },

    /// No professor teaches the drawn course. Nothing was recorded.
    ProfessorNotFound {
        /// Number taken from the tag.
        student_id: String,
        /// Course drawn for this cycle.
        course_id: String,
    },

    /// Attendance was recorded.
    Recorded {
        /// Record as inserted.
        record: AttendanceRecord,
        /// Identifier of the new document.
        document_id: String,
        /// Timestamp assigned by the store.
        timestamp: DateTime<Utc>,
    },

    /// A directory call failed after its retries.
    Fault {
        /// Call that failed.
        operation: DirectoryOperation,
        /// Failure category.
        kind: ServiceErrorKind,
        /// Error text.
        message: String,
    },
}

impl CycleOutcome {
    fn fault(operation: DirectoryOperation, error: &DirectoryError) -> Self {
        Self::Fault {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// The indicator pattern for this outcome.
    #[must_use]
    pub const fn signal(&self) -> Signal {
        match self {
            Self::Invalid { .. } => Signal::Invalid,
            Self::StudentNotFound { .. } => Signal::StudentNotFound,
            Self::ProfessorNotFound { .. } => Signal::ProfessorNotFound,
            Self::Recorded { .. } => Signal::Recorded,
            Self::Fault { .. } => Signal::Fault,
        }
    }

    /// Returns `true` if an attendance record was inserted.
    #[must_use]
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

// ============================================================================
// ScanCycle
// ============================================================================

/// A single pass of the scan loop.
pub struct ScanCycle<'a, L: LightDriver, D: DirectoryService + ?Sized> {
    light: &'a mut IndicatorLight<L>,
    directory: &'a D,
    courses: &'a mut CoursePicker,
    policy: RetryPolicy,
    phases: Vec<ScanPhase>,
}

impl<'a, L: LightDriver, D: DirectoryService + ?Sized> ScanCycle<'a, L, D> {
    /// Starts a cycle in [`ScanPhase::Idle`].
    pub fn new(
        light: &'a mut IndicatorLight<L>,
        directory: &'a D,
        courses: &'a mut CoursePicker,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            light,
            directory,
            courses,
            policy,
            phases: vec![ScanPhase::Idle],
        }
    }

    /// Phases visited so far, oldest first.
    #[must_use]
    pub fn phases(&self) -> &[ScanPhase] {
        &self.phases
    }

    /// The phase the cycle is in.
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.phases.last().copied().unwrap_or_default()
    }

    fn enter(&mut self, phase: ScanPhase) {
        debug!(from = %self.phase(), to = %phase, "Scan phase");
        self.phases.push(phase);
    }

    /// Shows red and waits out `delay`.
    pub async fn arm(&mut self, delay: Duration) -> Result<(), HardwareError> {
        self.enter(ScanPhase::Armed);
        Signal::Armed.show(self.light).await?;
        if !delay.is_zero() {
            sleep(delay).await;
        }
        Ok(())
    }

    /// Waits for the next tag. `None` means the reader has closed.
    pub async fn read<R: TagReader + ?Sized>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<RawTag>, HardwareError> {
        self.enter(ScanPhase::Reading);
        reader.read_tag().await
    }

    /// Arms the indicator, then reads the next tag.
    pub async fn arm_and_read<R: TagReader + ?Sized>(
        &mut self,
        reader: &mut R,
        delay: Duration,
    ) -> Result<Option<RawTag>, HardwareError> {
        self.arm(delay).await?;
        self.read(reader).await
    }

    /// Runs validation, lookups and recording for `tag`.
    ///
    /// The indicator has finished the outcome's pattern when this returns.
    pub async fn process(&mut self, tag: &RawTag) -> Result<CycleOutcome, HardwareError> {
        self.enter(ScanPhase::Validating);
        let student_id = match StudentId::from_payload(tag.as_str()) {
            Ok(id) => id,
            Err(reason) => {
                return self
                    .finish(CycleOutcome::Invalid {
                        payload: tag.as_str().to_string(),
                        reason,
                    })
                    .await;
            }
        };
        Signal::Accepted.show(self.light).await?;

        self.enter(ScanPhase::LookupStudent);
        Signal::LookingUp.show(self.light).await?;
        let directory = self.directory;
        let policy = self.policy;
        let id = student_id.as_str();
        let found = call_with_retry(
            &policy,
            DirectoryOperation::FindStudent,
            DirectoryError::is_transient,
            move || directory.find_student_by_id(id),
        )
        .await;
        let student = match found {
            Ok(Some(student)) => student,
            Ok(None) => {
                return self
                    .finish(CycleOutcome::StudentNotFound {
                        student_id: student_id.to_string(),
                    })
                    .await;
            }
            Err(e) => {
                return self
                    .finish(CycleOutcome::fault(DirectoryOperation::FindStudent, &e))
                    .await;
            }
        };

        self.enter(ScanPhase::LookupProfessor);
        let course_id = self.courses.pick();
        debug!(%student_id, %course_id, "Course drawn");
        let course = course_id.as_str();
        let found = call_with_retry(
            &policy,
            DirectoryOperation::FindProfessor,
            DirectoryError::is_transient,
            move || directory.find_professor_by_course(course),
        )
        .await;
        let professor = match found {
            Ok(Some(professor)) => professor,
            Ok(None) => {
                return self
                    .finish(CycleOutcome::ProfessorNotFound {
                        student_id: student_id.to_string(),
                        course_id,
                    })
                    .await;
            }
            Err(e) => {
                return self
                    .finish(CycleOutcome::fault(DirectoryOperation::FindProfessor, &e))
                    .await;
            }
        };

        self.enter(ScanPhase::Recording);
        let record = AttendanceRecord::compose(&student, &professor, &course_id);
        let pending = &record;
        let inserted = call_with_retry(
            &policy,
            DirectoryOperation::InsertAttendance,
            DirectoryError::is_safe_to_resend,
            move || directory.insert_attendance(pending),
        )
        .await;
        let outcome = match inserted {
            Ok(ack) => CycleOutcome::Recorded {
                record,
                document_id: ack.document_id,
                timestamp: ack.timestamp,
            },
            Err(e) => CycleOutcome::fault(DirectoryOperation::InsertAttendance, &e),
        };
        self.finish(outcome).await
    }

    async fn finish(&mut self, outcome: CycleOutcome) -> Result<CycleOutcome, HardwareError> {
        match &outcome {
            CycleOutcome::Invalid { payload, reason } => {
                info!(payload = %payload, reason = %reason, "Rejected tag");
            }
            CycleOutcome::StudentNotFound { student_id } => {
                info!(%student_id, "Student not found");
            }
            CycleOutcome::ProfessorNotFound {
                student_id,
                course_id,
            } => {
                info!(%student_id, %course_id, "No professor for course");
            }
            CycleOutcome::Recorded {
                record,
                document_id,
                timestamp,
            } => {
                info!(
                    student_id = %record.student_id,
                    student_name = %record.student_name,
                    course_id = %record.course_id,
                    professor_name = %record.professor_name,
                    %document_id,
                    %timestamp,
                    "Attendance recorded"
                );
            }
            CycleOutcome::Fault {
                operation,
                kind,
                message,
            } => {
                warn!(%operation, ?kind, %message, "Directory fault, cycle abandoned");
            }
        }

        outcome.signal().show(self.light).await?;
        self.enter(ScanPhase::Idle);
        Ok(outcome)
    }
}
