//! Token claims and the requesting identity.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Permissions, Role, User};

/// What a token may be used for. Verification always names the purpose it
/// expects, so a refresh token can never pass as an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    Confirm,
    ResetPassword,
    ChangeEmail,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Confirm => "confirm",
            TokenPurpose::ResetPassword => "reset_password",
            TokenPurpose::ChangeEmail => "change_email",
        }
    }
}

/// The payload a token carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: i64,
    pub purpose: TokenPurpose,
    /// Millisecond precision; compared against `User::token_issued_at`.
    pub issued_at: DateTime<Utc>,
    /// Only set for `ChangeEmail` tokens.
    pub new_email: Option<String>,
}

impl TokenClaims {
    pub fn new(subject: i64, purpose: TokenPurpose) -> Self {
        Self::at(subject, purpose, Utc::now())
    }

    pub fn at(subject: i64, purpose: TokenPurpose, issued_at: DateTime<Utc>) -> Self {
        Self { subject, purpose, issued_at: truncate_millis(issued_at), new_email: None }
    }

    pub fn with_new_email(mut self, email: impl Into<String>) -> Self {
        self.new_email = Some(email.into());
        self
    }

    pub fn issued_at_millis(&self) -> i64 {
        self.issued_at.timestamp_millis()
    }
}

/// Drops sub-millisecond precision so round trips compare equal.
pub fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(at.timestamp_millis())
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// An authenticated user as seen by permission checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub permissions: Permissions,
    pub confirmed: bool,
}

impl Identity {
    pub fn new(user: &User, role: &Role) -> Self {
        Self { user_id: user.id, permissions: role.permissions, confirmed: user.confirmed }
    }
}

/// Whoever issued the current call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(Identity),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(identity) => Some(identity.user_id),
        }
    }

    /// Anonymous viewers can do nothing.
    pub fn can(&self, perm: Permissions) -> bool {
        match self {
            Viewer::Anonymous => false,
            Viewer::User(identity) => identity.permissions.contains(perm),
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permissions::ADMIN)
    }

    /// True for the owner of a resource or an administrator.
    pub fn owns_or_admin(&self, owner_id: i64) -> bool {
        self.user_id() == Some(owner_id) || self.is_administrator()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(perms: Permissions) -> Viewer {
        Viewer::User(Identity { user_id: 7, permissions: perms, confirmed: true })
    }

    #[test]
    fn anonymous_can_nothing() {
        let viewer = Viewer::Anonymous;
        assert!(!viewer.can(Permissions::NONE));
        assert!(!viewer.can(Permissions::FOLLOW));
        assert!(!viewer.is_administrator());
        assert_eq!(viewer.user_id(), None);
    }

    #[test]
    fn ownership_or_admin() {
        let writer = identity(Permissions::WRITE);
        assert!(writer.owns_or_admin(7));
        assert!(!writer.owns_or_admin(8));
        assert!(identity(Permissions::ADMIN).owns_or_admin(8));
    }

    #[test]
    fn claims_drop_sub_millisecond_precision() {
        let now = Utc::now();
        let claims = TokenClaims::at(1, TokenPurpose::Access, now);
        assert_eq!(from_millis(claims.issued_at_millis()), claims.issued_at);
        assert_eq!(claims.issued_at.timestamp_millis(), now.timestamp_millis());
    }
}
