//! Authentication state kept on the client.
//!
//! This module provides:
//! - `TokenStore`: the bearer token persisted in a durable store
//! - `jwt`: payload decoding and expiry checks for stored tokens

pub mod jwt;
pub mod token;

pub use jwt::{Claims, TokenError};
pub use token::TokenStore;
