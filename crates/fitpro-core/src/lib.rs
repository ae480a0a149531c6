//! Client library for the fitness-course backend.
//!
//! - `api`: HTTP transport, auth and course endpoints, error taxonomy
//! - `session`: the authentication state machine and background refresh
//! - `storage`: key-value stores for the token and the pending-course queue
//! - `video`: YouTube link normalization

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod pending;
pub mod session;
pub mod storage;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiContext, ApiError, AuthApi, CourseApi, ReqwestTransport};
pub use config::{Config, TokenBackend};
pub use pending::PendingCourses;
pub use session::{SessionController, SessionState};
