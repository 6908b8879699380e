//! In-process directory.
//!
//! Holds the three collections in memory. Clones share state, so a test can
//! hand one clone to the station and inspect another afterwards. Failures
//! can be queued per operation to exercise the station's error handling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    AttendanceRecord, DirectoryError, DirectoryOperation, DirectoryService, ProfessorRecord,
    RecordedAttendance, StudentRecord,
};

/// An attendance document as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEntry {
    /// Document identifier.
    pub document_id: String,
    /// Inserted record.
    pub record: AttendanceRecord,
    /// Timestamp assigned at insert.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Collections {
    students: Vec<StudentRecord>,
    professors: Vec<ProfessorRecord>,
    attendance: Vec<AttendanceEntry>,
    student_lookups: usize,
    professor_lookups: usize,
    insert_attempts: usize,
    failures: Vec<(DirectoryOperation, DirectoryError)>,
}

impl Collections {
    fn take_failure(&mut self, operation: DirectoryOperation) -> Option<DirectoryError> {
        let index = self.failures.iter().position(|(op, _)| *op == operation)?;
        Some(self.failures.remove(index).1)
    }
}

/// Directory kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    inner: Arc<Mutex<Collections>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a student document.
    #[must_use]
    pub fn with_student(self, student: StudentRecord) -> Self {
        self.lock().students.push(student);
        self
    }

    /// Adds a professor document.
    #[must_use]
    pub fn with_professor(self, professor: ProfessorRecord) -> Self {
        self.lock().professors.push(professor);
        self
    }

    /// Queues `error` to be returned by the next call to `operation`.
    ///
    /// Queued failures for the same operation are returned in order.
    pub fn fail_next(&self, operation: DirectoryOperation, error: DirectoryError) {
        self.lock().failures.push((operation, error));
    }

    /// All attendance documents, in insert order.
    #[must_use]
    pub fn attendance(&self) -> Vec<AttendanceEntry> {
        self.lock().attendance.clone()
    }

    /// Number of student lookups received, including failed ones.
    #[must_use]
    pub fn student_lookups(&self) -> usize {
        self.lock().student_lookups
    }

    /// Number of professor lookups received, including failed ones.
    #[must_use]
    pub fn professor_lookups(&self) -> usize {
        self.lock().professor_lookups
    }

    /// Number of insert calls received, including failed ones.
    #[must_use]
    pub fn insert_attempts(&self) -> usize {
        self.lock().insert_attempts
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn find_student_by_id(
        &self,
        student_id: &str,
    ) -> Result<Option<StudentRecord>, DirectoryError> {
        let mut collections = self.lock();
        collections.student_lookups += 1;
        if let Some(error) = collections.take_failure(DirectoryOperation::FindStudent) {
            return Err(error);
        }
        Ok(collections
            .students
            .iter()
            .find(|s| s.student_id == student_id)
            .cloned())
    }

    async fn find_professor_by_course(
        &self,
        course_id: &str,
    ) -> Result<Option<ProfessorRecord>, DirectoryError> {
        let mut collections = self.lock();
        collections.professor_lookups += 1;
        if let Some(error) = collections.take_failure(DirectoryOperation::FindProfessor) {
            return Err(error);
        }
        Ok(collections
            .professors
            .iter()
            .find(|p| p.course_id == course_id)
            .cloned())
    }

    async fn insert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<RecordedAttendance, DirectoryError> {
        let mut collections = self.lock();
        collections.insert_attempts += 1;
        if let Some(error) = collections.take_failure(DirectoryOperation::InsertAttendance) {
            return Err(error);
        }

        let document_id = format!("attendance-{}", collections.attendance.len() + 1);
        let timestamp = Utc::now();
        collections.attendance.push(AttendanceEntry {
            document_id: document_id.clone(),
            record: record.clone(),
            timestamp,
        });
        Ok(RecordedAttendance {
            document_id,
            timestamp,
        })
    }
}
