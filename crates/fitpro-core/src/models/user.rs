use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The signed-in user as reported by `GET /users/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub email: String,
    #[serde(default)]
    pub selected_courses: BTreeSet<String>,
}

impl UserData {
    pub fn has_course(&self, course_id: &str) -> bool {
        self.selected_courses.contains(course_id)
    }
}

/// `/users/me` answers either `{"user": {...}}` or the bare user object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CurrentUserResponse {
    Wrapped { user: UserData },
    Bare(UserData),
}

impl CurrentUserResponse {
    pub(crate) fn into_user(self) -> UserData {
        match self {
            CurrentUserResponse::Wrapped { user } | CurrentUserResponse::Bare(user) => user,
        }
    }
}
