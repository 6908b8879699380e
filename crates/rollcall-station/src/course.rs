//! Course selection.
//!
//! The course for an attendance record is drawn uniformly at random from the
//! configured set on every cycle that found a student. It is not derived from
//! the tag or the student.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Course codes used when the configuration does not list any.
pub const DEFAULT_COURSES: [&str; 6] = [
    "CSCI300", "CSCI380", "MATH310", "CSCI235", "MATH320", "ICBS303",
];

/// Draws course codes uniformly from a fixed set.
#[derive(Debug, Clone)]
pub struct CoursePicker {
    courses: Vec<String>,
    rng: StdRng,
}

impl Default for CoursePicker {
    fn default() -> Self {
        Self::new(DEFAULT_COURSES.iter().map(ToString::to_string).collect())
    }
}

impl CoursePicker {
    /// Creates a picker seeded from the OS.
    ///
    /// An empty list falls back to [`DEFAULT_COURSES`]; configuration
    /// validation rejects empty lists before they get here.
    #[must_use]
    pub fn new(courses: Vec<String>) -> Self {
        Self::with_rng(courses, StdRng::from_entropy())
    }

    /// Creates a picker with a fixed seed, for reproducible draws.
    #[must_use]
    pub fn seeded(courses: Vec<String>, seed: u64) -> Self {
        Self::with_rng(courses, StdRng::seed_from_u64(seed))
    }

    fn with_rng(courses: Vec<String>, rng: StdRng) -> Self {
        let courses = if courses.is_empty() {
            DEFAULT_COURSES.iter().map(ToString::to_string).collect()
        } else {
            courses
        };
        Self { courses, rng }
    }

    /// Draws the next course code.
    pub fn pick(&mut self) -> String {
        let index = self.rng.gen_range(0..self.courses.len());
        self.courses[index].clone()
    }

    /// The set drawn from.
    #[must_use]
    pub fn courses(&self) -> &[String] {
        &self.courses
    }
}
