//! # ff-service
//!
//! The orchestration layer for Firefly. Every public operation resolves
//! what the viewer may do, opens one unit of work, calls the store and
//! commits once. Anything that must not block the caller (mail, deferred
//! account deletion) is handed to the [`TaskQueue`].

pub mod accounts;
pub mod content;
pub mod mail;
pub mod social;
pub mod tasks;

use chrono::Duration;
use ff_auth_simple::{Argon2Vault, JwtTokenCodec};
use ff_config::Settings;
use ff_core::auth::{TokenClaims, TokenPurpose, Viewer};
use ff_core::error::{AppError, Result};
use ff_core::models::Permissions;
use ff_core::traits::{PasswordVault, Task, TaskQueue, TokenCodec};
use ff_db_sqlite::Database;
use secrecy::SecretString;

pub use tasks::TaskRunner;

/// State shared by every caller of the core.
pub struct AppState {
    pub db: Database,
    pub vault: Box<dyn PasswordVault>,
    pub tokens: Box<dyn TokenCodec>,
    pub tasks: Box<dyn TaskQueue>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(
        db: Database,
        vault: Box<dyn PasswordVault>,
        tokens: Box<dyn TokenCodec>,
        tasks: Box<dyn TaskQueue>,
        settings: Settings,
    ) -> Self {
        Self { db, vault, tokens, tasks, settings }
    }

    /// Argon2 passwords and HS256 tokens signed with `auth.secret_key`.
    pub fn with_default_plugins(db: Database, tasks: Box<dyn TaskQueue>, settings: Settings) -> Self {
        let tokens = JwtTokenCodec::new(&settings.auth.secret_key);
        Self::new(db, Box::new(Argon2Vault::default()), Box::new(tokens), tasks, settings)
    }

    /// Page size for every listing. Callers only pick the page number.
    pub fn per_page(&self) -> u32 {
        self.settings.pagination.per_page
    }

    pub fn issue_token(&self, claims: &TokenClaims, ttl: Duration) -> Result<String> {
        self.tokens.issue(claims, ttl)
    }

    pub fn verify_token(&self, token: &str, purpose: TokenPurpose) -> Result<TokenClaims> {
        self.tokens.verify(token, purpose)
    }

    pub fn hash_password(&self, plaintext: &SecretString) -> Result<String> {
        self.vault.hash(plaintext)
    }

    pub fn verify_password(&self, plaintext: &SecretString, digest: &str) -> bool {
        self.vault.verify(plaintext, digest)
    }

    /// Enqueues background work. The caller's operation has already
    /// committed, so a full queue is logged rather than reported.
    fn dispatch(&self, task: Task) {
        let name = task.name();
        if let Err(err) = self.tasks.enqueue(task) {
            tracing::warn!(task = name, error = %err, "could not enqueue task");
        }
    }
}

/// The authenticated user id, or a refusal for anonymous viewers.
pub(crate) fn signed_in(viewer: &Viewer) -> Result<i64> {
    viewer.user_id().ok_or_else(|| AppError::denied("sign in first"))
}

pub(crate) fn require_permission(viewer: &Viewer, perm: Permissions) -> Result<i64> {
    let user_id = signed_in(viewer)?;
    if !viewer.can(perm) {
        return Err(AppError::denied("insufficient permissions"));
    }
    Ok(user_id)
}

pub(crate) fn require_owner_or_admin(viewer: &Viewer, owner_id: i64) -> Result<()> {
    signed_in(viewer)?;
    if !viewer.owns_or_admin(owner_id) {
        return Err(AppError::denied("only the owner or an administrator may do this"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use ff_core::auth::Identity;
    use ff_core::models::{NewUser, User};
    use ff_db_sqlite::roles;
    use ff_tasks_local::{ChannelQueue, TaskReceiver};

    use super::*;

    pub const SECRET: &str = "test-secret";

    pub struct Harness {
        pub app: AppState,
        pub outbox: TaskReceiver,
    }

    impl Harness {
        pub async fn new() -> Self {
            let mut settings = Settings::with_secret(SECRET);
            settings.mail.admin = Some("root@example.com".into());
            settings.pagination.per_page = 3;
            let db = Database::in_memory().await.unwrap();
            let mut tx = db.begin().await.unwrap();
            roles::insert_roles(&mut tx).await.unwrap();
            ff_db_sqlite::commit(tx).await.unwrap();

            let (queue, outbox) = ChannelQueue::new();
            let app = AppState::new(
                db,
                Box::new(Argon2Vault::with_params(1024, 1, 1).unwrap()),
                Box::new(JwtTokenCodec::new(&settings.auth.secret_key)),
                Box::new(queue),
                settings,
            );
            Self { app, outbox }
        }

        pub async fn register(&self, name: &str) -> User {
            self.app
                .register(NewUser::new(format!("{name}@example.com"), name, "pw"))
                .await
                .unwrap()
        }

        pub async fn viewer(&self, user: &User) -> Viewer {
            let mut tx = self.app.db.begin().await.unwrap();
            let role = roles::get(&mut tx, user.role_id).await.unwrap();
            Viewer::User(Identity::new(user, &role))
        }

        /// Every task enqueued so far.
        pub fn drain(&mut self) -> Vec<Task> {
            std::iter::from_fn(|| self.outbox.try_recv()).collect()
        }

        /// The `token` parameter of the most recent mail.
        pub fn last_mail_token(&mut self) -> String {
            self.drain()
                .into_iter()
                .rev()
                .find_map(|task| match task {
                    Task::SendEmail(message) => message.params["token"].as_str().map(str::to_string),
                    _ => None,
                })
                .expect("no mail with a token was sent")
        }
    }
}
