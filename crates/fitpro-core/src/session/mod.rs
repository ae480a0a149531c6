//! Client-side session: who is signed in, and the background refresh that
//! keeps the profile current.

pub mod controller;
pub mod state;

pub use controller::{
    AddCourseOutcome, RefreshOutcome, SessionController, SkipReason, REFRESH_DEBOUNCE,
};
pub use state::{SessionState, SessionStatus};
