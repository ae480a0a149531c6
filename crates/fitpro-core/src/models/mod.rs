//! Data models for the fitness-course backend.
//!
//! - `Course`, `Workout`, `Exercise`: catalogue entries
//! - `UserData`: the signed-in user and the courses on their profile
//! - `CourseProgress`, `WorkoutProgress`: recorded repetitions, plus the
//!   clamping rules applied to user input

pub mod course;
pub mod progress;
pub mod user;

pub use course::{sort_by_order, Course, DailyDuration, Exercise, Workout};
pub use progress::{
    clamp_progress, clamp_repetitions, parse_repetitions, CourseProgress, WorkoutProgress,
};
pub use user::UserData;
