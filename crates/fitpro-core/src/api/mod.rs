//! REST API clients for the fitness-course backend.
//!
//! - `AuthApi`: registration, login and the current user (`/auth`, `/users/me`)
//! - `CourseApi`: catalogue, profile courses and workout progress
//!
//! Both clients talk through an `ApiContext`, which owns the transport, the
//! base URL and the request timeout. Authenticated calls send the stored JWT
//! as a bearer token.

pub mod auth;
pub mod courses;
pub mod error;
pub mod single_flight;
pub mod transport;

pub use auth::AuthApi;
pub use courses::CourseApi;
pub use error::ApiError;
pub use transport::{
    ApiContext, HttpRequest, HttpResponse, HttpTransport, Payload, ReqwestTransport,
    TransportError,
};
