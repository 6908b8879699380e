//! Firestore REST backend for the directory.
//!
//! Lookups go through `documents:runQuery` with a single `EQUAL` field filter
//! and `limit: 1`. Inserts go through `documents:commit` with a
//! `REQUEST_TIME` field transform so the store stamps the record itself.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use crate::{
    AttendanceRecord, Credentials, DirectoryError, DirectoryService, ProfessorRecord,
    RecordedAttendance, StudentRecord, ATTENDANCE_COLLECTION, PROFESSORS_COLLECTION,
    STUDENTS_COLLECTION,
};

/// Public Firestore REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Length of generated document identifiers.
const DOCUMENT_ID_LEN: usize = 20;

/// Field receiving the server-assigned insert time.
const TIMESTAMP_FIELD: &str = "timestamp";

/// Directory backed by a Firestore database.
#[derive(Debug, Clone)]
pub struct FirestoreDirectory {
    client: Client,
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
}

impl FirestoreDirectory {
    /// Creates a client for the project named in `credentials`.
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Connectivity(e.to_string()))?;
        debug!(project = %credentials.project_id, "Firestore client created");
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
            timeout,
        })
    }

    /// Points the client at a different endpoint (emulator or test server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The database resource path, `projects/{project}/databases/{database}`.
    #[must_use]
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.credentials.project_id, self.credentials.database_id
        )
    }

    fn documents_url(&self, method: &str) -> String {
        format!("{}/{}/documents:{method}", self.base_url, self.database_path())
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let mut request = self.client.post(url);
        if let Some(key) = &self.credentials.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = &self.credentials.access_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DirectoryError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, self.timeout))?;
        check_status(response).await
    }

    /// Runs an exact-match query and returns the fields of the first hit.
    async fn query_first(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Map<String, Value>>, DirectoryError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": { "stringValue": value },
                    }
                },
                "limit": 1,
            }
        });

        let response = self
            .send(self.post(&self.documents_url("runQuery")).json(&body))
            .await?;
        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        Ok(items
            .into_iter()
            .find_map(|item| item.document)
            .map(|document| document.fields))
    }
}

#[async_trait]
impl DirectoryService for FirestoreDirectory {
    #[instrument(skip(self))]
    async fn find_student_by_id(
        &self,
        student_id: &str,
    ) -> Result<Option<StudentRecord>, DirectoryError> {
        let Some(fields) = self
            .query_first(STUDENTS_COLLECTION, "studentId", student_id)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(StudentRecord {
            student_id: student_id.to_string(),
            student_name: required_string(&fields, "studentName")?,
            student_email: required_string(&fields, "studentEmail")?,
        }))
    }

    #[instrument(skip(self))]
    async fn find_professor_by_course(
        &self,
        course_id: &str,
    ) -> Result<Option<ProfessorRecord>, DirectoryError> {
        let Some(fields) = self
            .query_first(PROFESSORS_COLLECTION, "courseId", course_id)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(ProfessorRecord {
            professor_id: required_string(&fields, "professorId")?,
            professor_name: required_string(&fields, "professorName")?,
            course_id: course_id.to_string(),
        }))
    }

    #[instrument(skip(self, record), fields(student_id = %record.student_id, course_id = %record.course_id))]
    async fn insert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<RecordedAttendance, DirectoryError> {
        let document_id = generate_document_id();
        let name = format!(
            "{}/documents/{ATTENDANCE_COLLECTION}/{document_id}",
            self.database_path()
        );
        let body = json!({
            "writes": [{
                "update": {
                    "name": name,
                    "fields": encode_attendance(record),
                },
                "updateTransforms": [{
                    "fieldPath": TIMESTAMP_FIELD,
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }]
        });

        let response = self
            .send(self.post(&self.documents_url("commit")).json(&body))
            .await?;
        let commit: CommitResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        let timestamp = commit.server_timestamp()?;
        info!(%document_id, %timestamp, "Attendance document written");
        Ok(RecordedAttendance {
            document_id,
            timestamp,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    write_results: Vec<WriteResult>,
    #[serde(default)]
    commit_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteResult {
    #[serde(default)]
    transform_results: Vec<Value>,
}

impl CommitResponse {
    /// The stamped `timestamp` value, falling back to the commit time.
    fn server_timestamp(&self) -> Result<DateTime<Utc>, DirectoryError> {
        let stamped = self
            .write_results
            .first()
            .and_then(|result| result.transform_results.first())
            .and_then(|value| value.get("timestampValue"))
            .and_then(Value::as_str);

        let raw = stamped
            .or(self.commit_time.as_deref())
            .ok_or_else(|| DirectoryError::Malformed("commit response has no time".into()))?;

        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DirectoryError::Malformed(format!("invalid timestamp '{raw}': {e}")))
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn encode_attendance(record: &AttendanceRecord) -> Value {
    json!({
        "courseId": string_value(&record.course_id),
        "studentId": string_value(&record.student_id),
        "studentName": string_value(&record.student_name),
        "studentEmail": string_value(&record.student_email),
        "professorId": string_value(&record.professor_id),
        "professorName": string_value(&record.professor_name),
    })
}

/// Reads a string-like field (`stringValue`, or `integerValue` which the
/// REST API also encodes as a string).
fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    let value = fields.get(name)?;
    value
        .get("stringValue")
        .or_else(|| value.get("integerValue"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn required_string(fields: &Map<String, Value>, name: &str) -> Result<String, DirectoryError> {
    string_field(fields, name)
        .ok_or_else(|| DirectoryError::Malformed(format!("document is missing field '{name}'")))
}

fn generate_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

fn transport_error(error: &reqwest::Error, timeout: Duration) -> DirectoryError {
    if error.is_timeout() {
        DirectoryError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if error.is_connect() {
        DirectoryError::Unreachable(error.to_string())
    } else {
        DirectoryError::Connectivity(error.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, DirectoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %message, "Directory request failed");
    Err(status_error(status, message))
}

fn status_error(status: StatusCode, message: String) -> DirectoryError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DirectoryError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => DirectoryError::Quota(message),
        s if s.is_server_error() => DirectoryError::Server {
            status: s.as_u16(),
            message,
        },
        s => DirectoryError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}
