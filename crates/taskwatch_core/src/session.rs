use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated {
        token: String,
        user: Option<UserProfile>,
    },
}

/// Explicit credential holder handed to whatever issues outbound requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let mut session = Self::default();
        session.login(token, None);
        session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn login(&mut self, token: impl Into<String>, user: Option<UserProfile>) {
        self.state = SessionState::Authenticated {
            token: token.into(),
            user,
        };
    }

    /// Attaches a profile to an authenticated session. No-op when anonymous.
    pub fn set_user(&mut self, profile: UserProfile) {
        if let SessionState::Authenticated { user, .. } = &mut self.state {
            *user = Some(profile);
        }
    }

    pub fn logout(&mut self) {
        self.state = SessionState::Anonymous;
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { token, .. } => Some(token),
            SessionState::Anonymous => None,
        }
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match &self.state {
            SessionState::Authenticated { user, .. } => user.as_ref(),
            SessionState::Anonymous => None,
        }
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {token}"))
    }
}
