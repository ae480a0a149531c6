use serde::{Deserialize, Serialize};

use crate::video;

/// Recommended daily training time, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DailyDuration {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nameRU", default)]
    pub name_ru: String,
    #[serde(rename = "nameEN", default)]
    pub name_en: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub directions: Vec<String>,
    #[serde(default)]
    pub fitting: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub duration_in_days: Option<u32>,
    #[serde(default)]
    pub daily_duration_in_minutes: Option<DailyDuration>,
    /// Workout ids, in course order
    #[serde(default)]
    pub workouts: Vec<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl Course {
    /// Display name, preferring the Russian title the catalogue is written in
    pub fn display_name(&self) -> &str {
        if !self.name_ru.is_empty() {
            &self.name_ru
        } else if !self.name_en.is_empty() {
            &self.name_en
        } else {
            &self.id
        }
    }

    pub fn duration_display(&self) -> Option<String> {
        let d = self.daily_duration_in_minutes?;
        Some(if d.from == d.to {
            format!("{} min/day", d.from)
        } else {
            format!("{}-{} min/day", d.from, d.to)
        })
    }
}

/// Sort courses by their catalogue `order`, unordered courses last
pub fn sort_by_order(courses: &mut [Course]) {
    courses.sort_by_key(|c| (c.order.is_none(), c.order.unwrap_or_default()));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Target repetitions
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub video: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Workout {
    /// Canonical embeddable URL for the workout video
    pub fn embed_url(&self) -> Option<String> {
        video::embed_url(&self.video)
    }

    /// Workouts without exercises are tracked as a single done/not-done flag
    pub fn has_exercises(&self) -> bool {
        !self.exercises.is_empty()
    }
}
