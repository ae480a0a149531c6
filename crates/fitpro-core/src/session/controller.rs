use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiContext, ApiError, AuthApi, CourseApi};
use crate::auth::TokenStore;
use crate::models::UserData;
use crate::pending::PendingCourses;

use super::state::SessionState;

/// Minimum spacing between two background refresh starts
pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Why a refresh did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another refresh is running
    InFlight,
    /// The previous refresh started less than [`REFRESH_DEBOUNCE`] ago
    Debounced,
    /// A full user-data load is running and will publish fresh data itself
    LoadInProgress,
    /// No token is stored
    NotAuthenticated,
    /// The user logged out while the refresh was running
    SessionChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(UserData),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddCourseOutcome {
    /// The server added the course right away
    Added,
    /// The server queued the add; the course is tracked as pending
    Queued,
}

/// Clears an in-flight flag when dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the authentication state and drives the API clients.
///
/// State changes are published through a watch channel; UI code holds a
/// receiver from [`SessionController::subscribe`] and re-renders on change.
pub struct SessionController {
    auth: AuthApi,
    courses: CourseApi,
    tokens: TokenStore,
    pending: PendingCourses,
    state: watch::Sender<SessionState>,
    // Held for the duration of a user-data load
    load_lock: AsyncMutex<()>,
    refreshing: AtomicBool,
    last_refresh: Mutex<Option<Instant>>,
    // Bumped on login and logout; loads that straddle a bump drop their result
    epoch: AtomicU64,
}

impl SessionController {
    pub fn new(ctx: ApiContext, tokens: TokenStore, pending: PendingCourses) -> Self {
        let auth = AuthApi::new(ctx.clone(), tokens.clone());
        let courses = CourseApi::new(ctx, tokens.clone(), pending.clone());
        let (state, _) = watch::channel(SessionState::default());

        Self {
            auth,
            courses,
            tokens,
            pending,
            state,
            load_lock: AsyncMutex::new(()),
            refreshing: AtomicBool::new(false),
            last_refresh: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn courses(&self) -> &CourseApi {
        &self.courses
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn pending(&self) -> &PendingCourses {
        &self.pending
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.is_loading != loading;
            s.is_loading = loading;
            changed
        });
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Load the signed-in user if a token was kept from an earlier run.
    /// Returns whether the session ended up authenticated.
    pub async fn restore(&self) -> Result<bool, ApiError> {
        if !self.tokens.is_authenticated() {
            debug!("No stored token, starting unauthenticated");
            return Ok(false);
        }
        self.load_user_data().await?;
        Ok(self.is_authenticated())
    }

    /// Fetch the current user and publish the result.
    ///
    /// Only one load runs at a time; a call made while another is running
    /// returns immediately. Any failure leaves the session unauthenticated.
    /// Auth failures also drop the stored token, connectivity failures keep
    /// it.
    pub async fn load_user_data(&self) -> Result<(), ApiError> {
        let Ok(_guard) = self.load_lock.try_lock() else {
            debug!("User data load already in progress");
            return Ok(());
        };
        self.load_exclusive().await
    }

    fn is_load_in_progress(&self) -> bool {
        self.load_lock.try_lock().is_err()
    }

    /// Start a new session epoch, then load once any running load has
    /// settled. The running load sees the new epoch and drops its result.
    async fn load_for_new_token(&self) -> Result<(), ApiError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _guard = self.load_lock.lock().await;
        self.load_exclusive().await
    }

    /// Body of a load; callers hold `load_lock`
    async fn load_exclusive(&self) -> Result<(), ApiError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.set_loading(true);

        let result = self.auth.get_current_user().await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Session changed during user data load, discarding result");
            return result.map(drop);
        }

        match result {
            Ok(user) => {
                self.pending.prune(&user.selected_courses);
                info!(email = %user.email, "Session authenticated");
                self.state.send_replace(SessionState::authenticated(user));
                Ok(())
            }
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(error = %e, "Authentication failed, clearing token");
                    self.tokens.remove();
                } else {
                    warn!(error = %e, "Failed to load user data");
                }
                self.state.send_replace(SessionState::default());
                Err(e)
            }
        }
    }

    /// Log in, then load the user with the new token.
    ///
    /// A load still running for the previous token is superseded: its
    /// result is dropped and it cannot clear the new token. A rejected
    /// login clears the loading flag and leaves the authentication state as
    /// it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        self.set_loading(true);
        if let Err(e) = self.auth.login(email, password).await {
            warn!(error = %e, "Login failed");
            self.set_loading(false);
            return Err(e);
        }
        self.load_for_new_token().await
    }

    /// Create an account, sign in with the same credentials, then load the
    /// user. Any failure leaves the session unauthenticated.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        self.set_loading(true);

        let signed_in = async {
            self.auth.register(email, password).await?;
            self.auth.login(email, password).await
        }
        .await;

        if let Err(e) = signed_in {
            warn!(error = %e, "Registration failed");
            self.state.send_replace(SessionState::default());
            return Err(e);
        }
        self.load_for_new_token().await
    }

    /// Drop the token and reset the session. Makes no network calls.
    pub fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.tokens.remove();
        self.auth.forget_current_user();
        self.state.send_replace(SessionState::default());
        info!("Logged out");
    }

    /// Re-fetch the user in the background without entering the loading
    /// state.
    ///
    /// Skips when another refresh is running, when the last one started less
    /// than [`REFRESH_DEBOUNCE`] ago, or while a full load is running. A
    /// failed refresh is logged and returned but never changes the
    /// authentication state.
    pub async fn refresh_user_data(&self) -> Result<RefreshOutcome, ApiError> {
        let Some(_guard) = InFlight::acquire(&self.refreshing) else {
            return Ok(RefreshOutcome::Skipped(SkipReason::InFlight));
        };

        {
            let mut last = self.last_refresh.lock().unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|started| started.elapsed() < REFRESH_DEBOUNCE) {
                return Ok(RefreshOutcome::Skipped(SkipReason::Debounced));
            }
            if self.is_load_in_progress() {
                return Ok(RefreshOutcome::Skipped(SkipReason::LoadInProgress));
            }
            if !self.tokens.is_authenticated() {
                return Ok(RefreshOutcome::Skipped(SkipReason::NotAuthenticated));
            }
            *last = Some(Instant::now());
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        match self.auth.get_current_user().await {
            Ok(user) => {
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    return Ok(RefreshOutcome::Skipped(SkipReason::SessionChanged));
                }
                self.pending.prune(&user.selected_courses);
                debug!(courses = user.selected_courses.len(), "User data refreshed");
                self.state.send_replace(SessionState::authenticated(user.clone()));
                Ok(RefreshOutcome::Refreshed(user))
            }
            Err(e) => {
                warn!(error = %e, "Background refresh failed");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Profile courses
    // =========================================================================

    /// Add a course to the profile. A queued add counts as success.
    ///
    /// The course is shown as selected right away and the user is refreshed
    /// afterwards to pick up the server's view.
    pub async fn add_course(&self, course_id: &str) -> Result<AddCourseOutcome, ApiError> {
        let outcome = match self.courses.add_user_course(course_id).await {
            Ok(_) => {
                self.update_selected(|courses| {
                    courses.insert(course_id.to_string());
                });
                AddCourseOutcome::Added
            }
            Err(e) if e.is_pending() => AddCourseOutcome::Queued,
            Err(e) => return Err(e),
        };
        self.refresh_quietly().await;
        Ok(outcome)
    }

    pub async fn remove_course(&self, course_id: &str) -> Result<(), ApiError> {
        self.courses.delete_user_course(course_id).await?;
        self.update_selected(|courses| {
            courses.remove(course_id);
        });
        self.refresh_quietly().await;
        Ok(())
    }

    /// Whether the course is on the profile, confirmed or still pending
    pub fn is_course_selected(&self, course_id: &str) -> bool {
        let confirmed = self
            .state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|u| u.has_course(course_id));
        confirmed || self.pending.contains(course_id)
    }

    fn update_selected(&self, f: impl FnOnce(&mut std::collections::BTreeSet<String>)) {
        self.state.send_if_modified(|s| match s.user.as_mut() {
            Some(user) => {
                f(&mut user.selected_courses);
                true
            }
            None => false,
        });
    }

    async fn refresh_quietly(&self) {
        match self.refresh_user_data().await {
            Ok(RefreshOutcome::Skipped(reason)) => debug!(?reason, "Refresh after change skipped"),
            Ok(RefreshOutcome::Refreshed(_)) | Err(_) => {}
        }
    }
}
