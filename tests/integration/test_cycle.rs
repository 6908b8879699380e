//! End-to-end tests for the attendance station
//!
//! These tests drive whole scan cycles through the station with scripted
//! tags, a recording indicator, and the in-memory directory.

use std::io::Read;
use std::time::Duration;

use rollcall_directory::{
    AttendanceRecord, DirectoryError, DirectoryOperation, InMemoryDirectory, ProfessorRecord,
    StudentRecord,
};
use rollcall_hardware::{
    Color, IndicatorLight, LineTagReader, RawTag, RecordingLight, ScriptedReader,
};
use rollcall_station::{
    Config, CoursePicker, CycleOutcome, Station, TagFormatError, DEFAULT_COURSES,
};

/// Directory with one student and a professor for CSCI300 only.
fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_student(StudentRecord::new("1234567", "Ana", "a@x.edu"))
        .with_professor(ProfessorRecord::new("P1", "Dr. Lee", "CSCI300"))
}

fn config() -> Config {
    Config {
        armed_delay_ms: 0,
        ..Config::default()
    }
}

/// Builds a station whose course draw always yields `course`.
fn station_for_course(
    directory: &InMemoryDirectory,
    recorder: &RecordingLight,
    payloads: &[&str],
    course: &str,
) -> Station<RecordingLight, ScriptedReader, InMemoryDirectory> {
    let light = IndicatorLight::acquire(recorder.clone()).expect("Failed to acquire indicator");
    Station::new(
        light,
        ScriptedReader::new(payloads.iter().copied()),
        directory.clone(),
        &config(),
    )
    .with_course_picker(CoursePicker::seeded(vec![course.to_string()], 11))
}

/// A known student and a drawn course with a professor produce one
/// attendance record with a store-assigned timestamp.
#[tokio::test(start_paused = true)]
async fn test_known_student_is_recorded() {
    let directory = directory();
    let recorder = RecordingLight::new();
    let mut station = station_for_course(&directory, &recorder, &[], "CSCI300");
    recorder.reset();

    let outcome = station
        .process(&RawTag::new("  SID1234567 \n"))
        .await
        .expect("Cycle failed");

    let expected = AttendanceRecord {
        course_id: "CSCI300".into(),
        student_id: "1234567".into(),
        student_name: "Ana".into(),
        student_email: "a@x.edu".into(),
        professor_id: "P1".into(),
        professor_name: "Dr. Lee".into(),
    };

    match outcome {
        CycleOutcome::Recorded { record, .. } => assert_eq!(record, expected),
        other => panic!("Expected Recorded, got {other:?}"),
    }

    let stored = directory.attendance();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record, expected);

    assert_eq!(
        recorder.history(),
        vec![
            Color::GREEN,
            Color::GREEN_BLUE,
            Color::GREEN_BLUE,
            Color::OFF
        ]
    );
}

/// A payload without the prefix is rejected with no lookups.
#[tokio::test(start_paused = true)]
async fn test_malformed_tag_is_rejected_without_lookups() {
    let directory = directory();
    let recorder = RecordingLight::new();
    let mut station = station_for_course(&directory, &recorder, &[], "CSCI300");

    let outcome = station
        .process(&RawTag::new("XYZ999"))
        .await
        .expect("Cycle failed");

    assert_eq!(
        outcome,
        CycleOutcome::Invalid {
            payload: "XYZ999".into(),
            reason: TagFormatError::MissingPrefix,
        }
    );
    assert_eq!(directory.student_lookups(), 0);
    assert_eq!(directory.professor_lookups(), 0);
    assert_eq!(directory.insert_attempts(), 0);
}

/// An unknown student gets the double red blink and no professor lookup.
#[tokio::test(start_paused = true)]
async fn test_unknown_student_blinks_red_twice() {
    let directory = directory();
    let recorder = RecordingLight::new();
    let mut station = station_for_course(&directory, &recorder, &[], "CSCI300");
    recorder.reset();

    let outcome = station
        .process(&RawTag::new("SID0000000"))
        .await
        .expect("Cycle failed");

    assert_eq!(
        outcome,
        CycleOutcome::StudentNotFound {
            student_id: "0000000".into()
        }
    );
    assert_eq!(directory.student_lookups(), 1);
    assert_eq!(directory.professor_lookups(), 0);

    let history = recorder.history();
    assert_eq!(
        &history[history.len() - 4..],
        &[Color::RED, Color::OFF, Color::RED, Color::OFF]
    );
}

/// When the drawn course has no professor, nothing is inserted.
#[tokio::test(start_paused = true)]
async fn test_course_without_professor_records_nothing() {
    let directory = directory();
    let recorder = RecordingLight::new();
    let mut station = station_for_course(&directory, &recorder, &[], "MATH310");

    let outcome = station
        .process(&RawTag::new("SID1234567"))
        .await
        .expect("Cycle failed");

    assert_eq!(
        outcome,
        CycleOutcome::ProfessorNotFound {
            student_id: "1234567".into(),
            course_id: "MATH310".into(),
        }
    );
    assert_eq!(directory.insert_attempts(), 0);
    assert!(directory.attendance().is_empty());
    assert!(recorder.history().contains(&Color::RED_BLUE));
}

/// The same tag scanned twice is recorded twice.
#[tokio::test(start_paused = true)]
async fn test_repeated_scan_records_twice() {
    let directory = directory();
    let recorder = RecordingLight::new();
    let station = station_for_course(
        &directory,
        &recorder,
        &["SID1234567", "SID1234567"],
        "CSCI300",
    );

    let summary = station
        .run_until(std::future::pending::<()>())
        .await
        .expect("Station failed");

    assert_eq!(summary.recorded, 2);
    let stored = directory.attendance();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].record, stored[1].record);
    assert_ne!(stored[0].document_id, stored[1].document_id);
}

/// A directory outage is survived: the faulted cycle is abandoned and the
/// next tag is processed normally.
#[tokio::test(start_paused = true)]
async fn test_outage_does_not_stop_station() {
    let directory = directory();
    for _ in 0..3 {
        directory.fail_next(
            DirectoryOperation::FindStudent,
            DirectoryError::Unreachable("network down".into()),
        );
    }
    let recorder = RecordingLight::new();
    let station = station_for_course(
        &directory,
        &recorder,
        &["SID1234567", "SID1234567"],
        "CSCI300",
    );

    let summary = station
        .run_until(std::future::pending::<()>())
        .await
        .expect("Station failed");

    assert_eq!(summary.faults, 1);
    assert_eq!(summary.recorded, 1);
    assert!(recorder.history().contains(&Color::RED_GREEN));
    assert_eq!(recorder.last(), Some(Color::OFF));
}

/// A session over mixed tags draws only configured courses and counts
/// every outcome.
#[tokio::test(start_paused = true)]
async fn test_mixed_session_summary() {
    let directory = directory();
    let recorder = RecordingLight::new();
    let light = IndicatorLight::acquire(recorder.clone()).expect("Failed to acquire indicator");
    let station = Station::new(
        light,
        ScriptedReader::new(["SID1234567", "sid1234567", "SID", "SID0000000", "SID12A3"]),
        directory.clone(),
        &config(),
    )
    .with_course_picker(CoursePicker::seeded(
        DEFAULT_COURSES.iter().map(ToString::to_string).collect(),
        5,
    ));

    let summary = station
        .run_until(std::future::pending::<()>())
        .await
        .expect("Station failed");

    assert_eq!(summary.scans(), 5);
    assert_eq!(summary.invalid, 3);
    assert_eq!(summary.student_not_found, 1);
    assert_eq!(summary.recorded + summary.professor_not_found, 1);

    for entry in directory.attendance() {
        assert!(DEFAULT_COURSES.contains(&entry.record.course_id.as_str()));
    }
}

/// A reader device that stays silent until its sender is dropped.
struct SilentDevice(std::sync::mpsc::Receiver<()>);

impl Read for SilentDevice {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        let _ = self.0.recv();
        Ok(0)
    }
}

/// Shutdown while the reader device is silent stops the station, and the
/// runtime drops without waiting for another line.
#[test]
fn test_shutdown_with_silent_reader_device() {
    let (hold, device) = std::sync::mpsc::channel::<()>();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("Failed to build runtime");
    let directory = directory();
    let recorder = RecordingLight::new();

    let summary = runtime.block_on(async {
        let light =
            IndicatorLight::acquire(recorder.clone()).expect("Failed to acquire indicator");
        let reader = LineTagReader::spawn(SilentDevice(device)).expect("Failed to start reader");
        Station::new(light, reader, directory.clone(), &config())
            .run_until(tokio::time::sleep(Duration::from_secs(2)))
            .await
            .expect("Station failed")
    });

    let started = std::time::Instant::now();
    drop(runtime);
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(summary.scans(), 0);
    assert_eq!(recorder.last(), Some(Color::OFF));
    drop(hold);
}
