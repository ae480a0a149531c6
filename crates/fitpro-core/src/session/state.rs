use crate::models::UserData;

/// Authentication state published by the session controller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub user: Option<UserData>,
    pub is_loading: bool,
}

/// Coarse view of [`SessionState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus<'a> {
    Unauthenticated,
    Loading,
    Authenticated(&'a UserData),
}

impl SessionState {
    pub fn authenticated(user: UserData) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
            is_loading: false,
        }
    }

    pub fn status(&self) -> SessionStatus<'_> {
        if self.is_loading {
            return SessionStatus::Loading;
        }
        match (&self.user, self.is_authenticated) {
            (Some(user), true) => SessionStatus::Authenticated(user),
            _ => SessionStatus::Unauthenticated,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }
}
