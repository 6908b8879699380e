//! Rollcall Station
//!
//! The scan-validate-lookup-record loop of the attendance station, its
//! indicator signals, and its configuration.

pub mod config;
pub mod course;
pub mod cycle;
pub mod error;
pub mod probe;
pub mod retry;
pub mod signal;
pub mod station;
pub mod tag;

pub use config::{Config, IndicatorBackend, ReaderConfig, RetrySettings, CONFIG_FILE};
pub use course::{CoursePicker, DEFAULT_COURSES};
pub use cycle::{CycleOutcome, ScanCycle, ScanPhase};
pub use error::{Result, StationError};
pub use probe::{probe_until, ProbeReading};
pub use retry::{call_with_retry, RetryPolicy};
pub use signal::Signal;
pub use station::{SessionSummary, Station};
pub use tag::{is_valid_payload, StudentId, TagFormatError, STUDENT_TAG_PREFIX};
