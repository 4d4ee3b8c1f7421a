//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the service layer.

use async_trait::async_trait;
use chrono::Duration;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::auth::{TokenClaims, TokenPurpose};
use crate::error::Result;

/// One-way credential hashing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PasswordVault: Send + Sync {
    /// Salted slow hash of the plaintext.
    fn hash(&self, plaintext: &SecretString) -> Result<String>;

    /// False for a wrong password and for a digest that does not parse.
    fn verify(&self, plaintext: &SecretString, digest: &str) -> bool;
}

/// Signs and verifies self-contained, expiring, purpose-bound tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenCodec: Send + Sync {
    fn issue(&self, claims: &TokenClaims, ttl: Duration) -> Result<String>;

    /// Every failure is the same `Unauthorized("invalid token")`.
    fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<TokenClaims>;
}

/// An outgoing email, rendered later by whoever delivers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: String,
    pub sender: String,
    pub subject: String,
    pub template: String,
    pub params: serde_json::Value,
}

/// Fire-and-forget work. Every variant must be safe to run twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    SendEmail(MailMessage),
    DeleteAccount { user_id: i64 },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::SendEmail(_) => "send_email",
            Task::DeleteAccount { .. } => "delete_account",
        }
    }
}

/// Hands tasks to a background runner without waiting for them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: Task) -> Result<()>;
}

/// Executes one task on behalf of a background runner.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<()>;
}

/// Delivers a rendered message. Mail delivery proper lives outside the core.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &MailMessage) -> Result<()>;
}
