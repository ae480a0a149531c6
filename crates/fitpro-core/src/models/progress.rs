use serde::{Deserialize, Serialize};

use super::course::{Exercise, Workout};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutProgress {
    pub workout_id: String,
    #[serde(default)]
    pub workout_completed: bool,
    /// Completed repetitions, one entry per exercise
    #[serde(default)]
    pub progress_data: Vec<i64>,
}

impl WorkoutProgress {
    /// Progress sized to the workout's exercises, each value clamped to
    /// `[0, quantity]`
    pub fn clamped_to(&self, workout: &Workout) -> Vec<u32> {
        clamp_progress(&workout.exercises, &self.progress_data)
    }

    /// Share of target repetitions done, from 0.0 to 1.0
    pub fn completion_ratio(&self, workout: &Workout) -> f64 {
        let target: u64 = workout.exercises.iter().map(|e| u64::from(e.quantity)).sum();
        if target == 0 {
            return if self.workout_completed { 1.0 } else { 0.0 };
        }
        let done: u64 = self.clamped_to(workout).iter().map(|&v| u64::from(v)).sum();
        done as f64 / target as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    #[serde(default)]
    pub course_completed: bool,
    #[serde(default)]
    pub workouts_progress: Vec<WorkoutProgress>,
}

impl CourseProgress {
    pub fn workout(&self, workout_id: &str) -> Option<&WorkoutProgress> {
        self.workouts_progress.iter().find(|w| w.workout_id == workout_id)
    }

    pub fn completed_workouts(&self) -> usize {
        self.workouts_progress.iter().filter(|w| w.workout_completed).count()
    }
}

/// Parse a repetition count typed by the user.
///
/// Blank or non-numeric input counts as 0. Fractions are truncated.
pub fn parse_repetitions(input: &str) -> i64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

pub fn clamp_repetitions(value: i64, quantity: u32) -> u32 {
    value.clamp(0, i64::from(quantity)) as u32
}

/// One clamped value per exercise; exercises without a value get 0 and
/// surplus values are dropped.
pub fn clamp_progress(exercises: &[Exercise], values: &[i64]) -> Vec<u32> {
    exercises
        .iter()
        .enumerate()
        .map(|(i, exercise)| clamp_repetitions(values.get(i).copied().unwrap_or(0), exercise.quantity))
        .collect()
}
