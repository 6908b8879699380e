//! Integration tests for the Firestore directory using wiremock
//!
//! These tests check the REST requests the directory sends and how it reads
//! the responses, against a mock server standing in for Firestore.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use rollcall_directory::{
    AttendanceRecord, Credentials, DirectoryError, DirectoryService, FirestoreDirectory,
    ProfessorRecord, ServiceErrorKind, StudentRecord,
};
use rollcall_hardware::{Color, IndicatorLight, RecordingLight, ScriptedReader};
use rollcall_station::{Config, CoursePicker, Station};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RUN_QUERY: &str = r"/projects/attendance-test/databases/.+/documents:runQuery$";
const COMMIT: &str = r"/projects/attendance-test/databases/.+/documents:commit$";

fn credentials() -> Credentials {
    Credentials {
        project_id: "attendance-test".into(),
        database_id: "(default)".into(),
        api_key: Some("test-key".into()),
        access_token: None,
    }
}

fn directory(server: &MockServer) -> FirestoreDirectory {
    FirestoreDirectory::new(credentials(), Duration::from_secs(5))
        .expect("Failed to build client")
        .with_base_url(server.uri())
}

fn found(fields: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!([{
        "document": {
            "name": "projects/attendance-test/databases/(default)/documents/X/abc",
            "fields": fields,
        },
        "readTime": "2024-09-02T14:00:00Z",
    }]))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!([{ "readTime": "2024-09-02T14:00:00Z" }]))
}

fn record() -> AttendanceRecord {
    AttendanceRecord::compose(
        &StudentRecord::new("1234567", "Ana", "a@x.edu"),
        &ProfessorRecord::new("P1", "Dr. Lee", "CSCI300"),
        "CSCI300",
    )
}

/// Test student lookup sends an exact-match query on the Students collection
#[tokio::test]
async fn test_find_student_queries_students_collection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "Students" }],
                "where": { "fieldFilter": {
                    "field": { "fieldPath": "studentId" },
                    "op": "EQUAL",
                    "value": { "stringValue": "1234567" },
                }},
                "limit": 1,
            }
        })))
        .respond_with(found(json!({
            "studentId": { "stringValue": "1234567" },
            "studentName": { "stringValue": "Ana" },
            "studentEmail": { "stringValue": "a@x.edu" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let student = directory(&server)
        .find_student_by_id("1234567")
        .await
        .expect("Lookup failed");

    assert_eq!(
        student,
        Some(StudentRecord::new("1234567", "Ana", "a@x.edu"))
    );
}

/// Test an empty query result reads as not found
#[tokio::test]
async fn test_find_student_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let student = directory(&server)
        .find_student_by_id("0000000")
        .await
        .expect("Lookup failed");

    assert!(student.is_none());
}

/// Test professor lookup filters the Professor collection on courseId
#[tokio::test]
async fn test_find_professor_by_course() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "Professor" }],
                "where": { "fieldFilter": {
                    "field": { "fieldPath": "courseId" },
                    "value": { "stringValue": "CSCI300" },
                }},
            }
        })))
        .respond_with(found(json!({
            "professorId": { "integerValue": "17" },
            "professorName": { "stringValue": "Dr. Lee" },
            "courseId": { "stringValue": "CSCI300" },
        })))
        .mount(&server)
        .await;

    let professor = directory(&server)
        .find_professor_by_course("CSCI300")
        .await
        .expect("Lookup failed")
        .expect("Professor should be found");

    assert_eq!(professor.professor_id, "17");
    assert_eq!(professor.professor_name, "Dr. Lee");
    assert_eq!(professor.course_id, "CSCI300");
}

/// Test a document missing a required field is malformed
#[tokio::test]
async fn test_missing_field_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .respond_with(found(json!({
            "studentId": { "stringValue": "1234567" },
            "studentName": { "stringValue": "Ana" },
        })))
        .mount(&server)
        .await;

    let err = directory(&server)
        .find_student_by_id("1234567")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ServiceErrorKind::Malformed);
}

/// Test insert asks the store to stamp the record and returns its time
#[tokio::test]
async fn test_insert_uses_server_timestamp() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(COMMIT))
        .and(body_partial_json(json!({
            "writes": [{
                "update": { "fields": {
                    "courseId": { "stringValue": "CSCI300" },
                    "studentId": { "stringValue": "1234567" },
                    "studentName": { "stringValue": "Ana" },
                    "studentEmail": { "stringValue": "a@x.edu" },
                    "professorId": { "stringValue": "P1" },
                    "professorName": { "stringValue": "Dr. Lee" },
                }},
                "updateTransforms": [{
                    "fieldPath": "timestamp",
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{
                "updateTime": "2024-09-02T14:03:11.500Z",
                "transformResults": [{ "timestampValue": "2024-09-02T14:03:11.123Z" }],
            }],
            "commitTime": "2024-09-02T14:03:11.500Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = directory(&server)
        .insert_attendance(&record())
        .await
        .expect("Insert failed");

    assert_eq!(ack.document_id.len(), 20);
    assert!(ack.document_id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(
        ack.timestamp,
        Utc.with_ymd_and_hms(2024, 9, 2, 14, 3, 11).unwrap()
            + chrono::Duration::milliseconds(123)
    );
}

/// Test insert falls back to the commit time without transform results
#[tokio::test]
async fn test_insert_falls_back_to_commit_time() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(COMMIT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{}],
            "commitTime": "2024-09-02T14:03:12Z",
        })))
        .mount(&server)
        .await;

    let ack = directory(&server)
        .insert_attendance(&record())
        .await
        .expect("Insert failed");

    assert_eq!(
        ack.timestamp,
        Utc.with_ymd_and_hms(2024, 9, 2, 14, 3, 12).unwrap()
    );
}

/// Test access tokens are sent as bearer auth
#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(not_found())
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials {
        api_key: None,
        access_token: Some("secret-token".into()),
        ..credentials()
    };
    let directory = FirestoreDirectory::new(credentials, Duration::from_secs(5))
        .expect("Failed to build client")
        .with_base_url(server.uri());

    let student = directory
        .find_student_by_id("1234567")
        .await
        .expect("Lookup failed");
    assert!(student.is_none());
}

/// Test HTTP status codes map to error kinds
#[tokio::test]
async fn test_status_mapping() {
    let cases = [
        (401, ServiceErrorKind::Authentication),
        (403, ServiceErrorKind::Authentication),
        (429, ServiceErrorKind::Quota),
        (500, ServiceErrorKind::Server),
        (503, ServiceErrorKind::Server),
        (400, ServiceErrorKind::Rejected),
        (404, ServiceErrorKind::Rejected),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = directory(&server)
            .find_professor_by_course("CSCI300")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), expected, "status {status}: {err}");
    }
}

/// Test a slow store surfaces as a timeout carrying the client timeout
#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(not_found().set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let directory = FirestoreDirectory::new(credentials(), Duration::from_millis(50))
        .expect("Failed to build client")
        .with_base_url(server.uri());

    let err = directory.find_student_by_id("1234567").await.unwrap_err();

    assert!(matches!(err, DirectoryError::Timeout { timeout_ms: 50 }));
    assert!(err.is_transient());
}

/// Test quota errors are transient and safe to resend, server errors are
/// transient only
#[tokio::test]
async fn test_error_classification_from_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let directory = directory(&server);

    let quota = directory.insert_attendance(&record()).await.unwrap_err();
    assert!(matches!(quota, DirectoryError::Quota(_)));
    assert!(quota.is_transient());
    assert!(quota.is_safe_to_resend());

    let server_error = directory.insert_attendance(&record()).await.unwrap_err();
    assert!(server_error.is_transient());
    assert!(!server_error.is_safe_to_resend());
}

/// Test a full station cycle against the mock store
#[tokio::test]
async fn test_station_records_through_firestore() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .and(body_partial_json(
            json!({ "structuredQuery": { "from": [{ "collectionId": "Students" }] } }),
        ))
        .respond_with(found(json!({
            "studentName": { "stringValue": "Ana" },
            "studentEmail": { "stringValue": "a@x.edu" },
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(RUN_QUERY))
        .and(body_partial_json(
            json!({ "structuredQuery": { "from": [{ "collectionId": "Professor" }] } }),
        ))
        .respond_with(found(json!({
            "professorId": { "stringValue": "P1" },
            "professorName": { "stringValue": "Dr. Lee" },
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(COMMIT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{
                "transformResults": [{ "timestampValue": "2024-09-02T14:03:11Z" }],
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = RecordingLight::new();
    let light = IndicatorLight::acquire(recorder.clone()).expect("Failed to acquire indicator");
    let config = Config {
        armed_delay_ms: 0,
        ..Config::default()
    };
    let station = Station::new(
        light,
        ScriptedReader::new(["SID1234567"]),
        directory(&server),
        &config,
    )
    .with_course_picker(CoursePicker::seeded(vec!["CSCI300".into()], 1));

    let summary = station
        .run_until(std::future::pending::<()>())
        .await
        .expect("Station failed");

    assert_eq!(summary.recorded, 1);
    assert!(recorder.history().contains(&Color::GREEN_BLUE));
    assert_eq!(recorder.last(), Some(Color::OFF));
}
