//! Registration, login and current-user lookup.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{jwt, TokenStore};
use crate::models::user::CurrentUserResponse;
use crate::models::UserData;

use super::single_flight::SingleFlight;
use super::transport::{ApiContext, HttpRequest};
use super::ApiError;

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Client for the `/auth` endpoints and `/users/me`.
///
/// Owns the single-flight state for current-user lookups, so independent
/// clients never share in-flight requests.
pub struct AuthApi {
    ctx: ApiContext,
    tokens: TokenStore,
    current_user: SingleFlight<Result<UserData, ApiError>>,
}

impl AuthApi {
    pub fn new(ctx: ApiContext, tokens: TokenStore) -> Self {
        Self {
            ctx,
            tokens,
            current_user: SingleFlight::new("users/me"),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
        if email.trim().is_empty() || password.trim().is_empty() {
            return Err(ApiError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(&self, email: &str, password: &str) -> Result<String, ApiError> {
        Self::validate_credentials(email, password)?;

        let request = HttpRequest::post(self.ctx.url("/auth/register"))
            .json_text(&Credentials { email, password })?;
        let response = self.ctx.fetch(request).await?;

        if !response.is_success() {
            let err = ApiError::from_status(response.status, &response.body);
            warn!(status = response.status, error = %err, "Registration rejected");
            return Err(err);
        }

        info!("Registration successful");
        Ok(response.payload().message())
    }

    /// Log in and persist the returned token. Returns the token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        Self::validate_credentials(email, password)?;

        let request = HttpRequest::post(self.ctx.url("/auth/login"))
            .json_text(&Credentials { email, password })?;
        let response = self.ctx.fetch(request).await?;

        if !response.is_success() {
            let err = ApiError::from_status(response.status, &response.body);
            warn!(status = response.status, error = %err, "Login rejected");
            return Err(err);
        }

        // An OK answer without a readable token breaks the backend contract
        let token = response
            .payload()
            .json::<LoginResponse>()
            .ok()
            .and_then(|body| body.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Server {
                status: response.status,
                message: "Login response did not include a token".to_string(),
            })?;

        self.tokens.save(&token);
        // A lookup started with the previous token must not satisfy callers
        // asking on behalf of the new one
        self.current_user.reset();
        info!("Login successful");
        Ok(token)
    }

    /// Fetch the signed-in user.
    ///
    /// Concurrent callers share one request. The stored token is checked
    /// locally first; a missing, malformed or expired token is removed and
    /// reported as a 401 without touching the network.
    pub async fn get_current_user(&self) -> Result<UserData, ApiError> {
        let ctx = self.ctx.clone();
        let tokens = self.tokens.clone();
        self.current_user
            .run(move || fetch_current_user(ctx, tokens))
            .await
    }

    /// Whether a current-user lookup is in flight
    pub fn is_fetching_user(&self) -> bool {
        self.current_user.is_in_flight()
    }

    /// Stop sharing the in-flight lookup with new callers, e.g. after logout
    pub fn forget_current_user(&self) {
        self.current_user.reset();
    }
}

async fn fetch_current_user(ctx: ApiContext, tokens: TokenStore) -> Result<UserData, ApiError> {
    let Some(token) = tokens.get() else {
        return Err(ApiError::unauthorized("No token"));
    };

    if let Err(e) = jwt::validate(&token, Utc::now()) {
        warn!(error = %e, "Discarding unusable token");
        tokens.remove_if(&token);
        return Err(ApiError::unauthorized(e.to_string()));
    }

    let request = HttpRequest::get(ctx.url("/users/me")).bearer(&token);
    let response = ctx.fetch(request).await?;

    // The backend answers 201 here as well; both count as success
    if !matches!(response.status, 200 | 201) {
        if matches!(response.status, 400 | 401) {
            debug!(status = response.status, "Token rejected by server");
            tokens.remove_if(&token);
        }
        return Err(ApiError::from_status(response.status, &response.body));
    }

    let user = response.payload().json::<CurrentUserResponse>()?.into_user();
    debug!(email = %user.email, courses = user.selected_courses.len(), "Current user loaded");
    Ok(user)
}
