//! Rollcall Directory
//!
//! The remote document store holding the `Students`, `Professor` and
//! `Attendance` collections, behind the [`DirectoryService`] trait.
//!
//! Two implementations are provided:
//! - [`FirestoreDirectory`] talks to the Firestore REST API.
//! - [`InMemoryDirectory`] keeps everything in process, for tests and bench runs.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod credentials;
pub mod firestore;
pub mod memory;

pub use credentials::Credentials;
pub use firestore::FirestoreDirectory;
pub use memory::{AttendanceEntry, InMemoryDirectory};

/// Collection holding [`StudentRecord`] documents.
pub const STUDENTS_COLLECTION: &str = "Students";

/// Collection holding [`ProfessorRecord`] documents.
pub const PROFESSORS_COLLECTION: &str = "Professor";

/// Append-only collection receiving [`AttendanceRecord`] documents.
pub const ATTENDANCE_COLLECTION: &str = "Attendance";

// ============================================================================
// Records
// ============================================================================

/// A student, looked up by `student_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    /// Numeric student identifier, as stored on the tag.
    pub student_id: String,
    /// Display name.
    pub student_name: String,
    /// Contact email.
    pub student_email: String,
}

impl StudentRecord {
    /// Creates a new student record.
    #[must_use]
    pub fn new(
        student_id: impl Into<String>,
        student_name: impl Into<String>,
        student_email: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            student_name: student_name.into(),
            student_email: student_email.into(),
        }
    }
}

/// A professor, looked up by the course they teach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorRecord {
    /// Professor identifier.
    pub professor_id: String,
    /// Display name.
    pub professor_name: String,
    /// Course taught.
    pub course_id: String,
}

impl ProfessorRecord {
    /// Creates a new professor record.
    #[must_use]
    pub fn new(
        professor_id: impl Into<String>,
        professor_name: impl Into<String>,
        course_id: impl Into<String>,
    ) -> Self {
        Self {
            professor_id: professor_id.into(),
            professor_name: professor_name.into(),
            course_id: course_id.into(),
        }
    }
}

/// One attendance entry, composed from a student, a professor and a course.
///
/// The `timestamp` field is not part of this value: the store assigns it at
/// insert time and reports it back in [`RecordedAttendance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Course attended.
    pub course_id: String,
    /// Student identifier.
    pub student_id: String,
    /// Student display name.
    pub student_name: String,
    /// Student email.
    pub student_email: String,
    /// Professor identifier.
    pub professor_id: String,
    /// Professor display name.
    pub professor_name: String,
}

impl AttendanceRecord {
    /// Composes a record from both lookups and the drawn course.
    #[must_use]
    pub fn compose(
        student: &StudentRecord,
        professor: &ProfessorRecord,
        course_id: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            student_id: student.student_id.clone(),
            student_name: student.student_name.clone(),
            student_email: student.student_email.clone(),
            professor_id: professor.professor_id.clone(),
            professor_name: professor.professor_name.clone(),
        }
    }
}

/// Acknowledgement of a successful attendance insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAttendance {
    /// Identifier of the new document.
    pub document_id: String,
    /// Server-assigned insert time.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Errors
// ============================================================================

/// The three operations the directory offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryOperation {
    /// Student lookup by identifier.
    FindStudent,
    /// Professor lookup by course.
    FindProfessor,
    /// Attendance insert.
    InsertAttendance,
}

impl std::fmt::Display for DirectoryOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FindStudent => write!(f, "find_student"),
            Self::FindProfessor => write!(f, "find_professor"),
            Self::InsertAttendance => write!(f, "insert_attendance"),
        }
    }
}

/// Categories of directory failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// The store could not be reached or the connection dropped.
    Connectivity,
    /// The call did not complete in time.
    Timeout,
    /// Credentials were missing, invalid or lacked permission.
    Authentication,
    /// Rate limit or quota exceeded.
    Quota,
    /// The store failed internally (5xx responses).
    Server,
    /// The store refused the request.
    Rejected,
    /// The response could not be decoded.
    Malformed,
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Timeout => write!(f, "timeout"),
            Self::Authentication => write!(f, "authentication"),
            Self::Quota => write!(f, "quota"),
            Self::Server => write!(f, "server"),
            Self::Rejected => write!(f, "rejected"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

/// Errors returned by a [`DirectoryService`].
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// The connection could not be established; nothing was sent.
    #[error("directory unreachable: {0}")]
    Unreachable(String),

    /// The connection failed after the request may have been sent.
    #[error("directory connection failed: {0}")]
    Connectivity(String),

    /// The call did not complete within the allowed time.
    #[error("directory call timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that expired.
        timeout_ms: u64,
    },

    /// The store rejected the credentials.
    #[error("directory authentication failed: {0}")]
    Authentication(String),

    /// The store throttled the request.
    #[error("directory quota exceeded: {0}")]
    Quota(String),

    /// The store failed with a server error.
    #[error("directory server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error body returned by the store.
        message: String,
    },

    /// The store refused the request.
    #[error("directory rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error body returned by the store.
        message: String,
    },

    /// A response or stored document could not be decoded.
    #[error("malformed directory response: {0}")]
    Malformed(String),

    /// The credential file could not be loaded.
    #[error("invalid credentials file '{path}': {message}")]
    Credentials {
        /// Path to the credential file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },
}

impl DirectoryError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::Unreachable(_) | Self::Connectivity(_) => ServiceErrorKind::Connectivity,
            Self::Timeout { .. } => ServiceErrorKind::Timeout,
            Self::Authentication(_) | Self::Credentials { .. } => ServiceErrorKind::Authentication,
            Self::Quota(_) => ServiceErrorKind::Quota,
            Self::Server { .. } => ServiceErrorKind::Server,
            Self::Rejected { .. } => ServiceErrorKind::Rejected,
            Self::Malformed(_) => ServiceErrorKind::Malformed,
        }
    }

    /// Returns `true` if repeating the call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ServiceErrorKind::Connectivity
                | ServiceErrorKind::Timeout
                | ServiceErrorKind::Quota
                | ServiceErrorKind::Server
        )
    }

    /// Returns `true` if a write certainly did not reach the store, so
    /// sending it again cannot produce a second document.
    #[must_use]
    pub const fn is_safe_to_resend(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Quota(_))
    }
}

// ============================================================================
// Service trait
// ============================================================================

/// Keyed lookups and inserts against the remote store.
///
/// Lookups are exact-match and return the first match when several exist.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Finds the student whose `studentId` equals `student_id`.
    async fn find_student_by_id(
        &self,
        student_id: &str,
    ) -> Result<Option<StudentRecord>, DirectoryError>;

    /// Finds a professor whose `courseId` equals `course_id`.
    async fn find_professor_by_course(
        &self,
        course_id: &str,
    ) -> Result<Option<ProfessorRecord>, DirectoryError>;

    /// Appends `record` to the attendance collection. No deduplication is
    /// performed; the store assigns the timestamp.
    async fn insert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<RecordedAttendance, DirectoryError>;
}
