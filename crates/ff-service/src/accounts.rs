//! Accounts: registration, token pairs, the email/password flows and
//! profile maintenance.
//!
//! Access and refresh tokens are issued in pairs. With `auth.single_session`
//! on, the pair's issue time (millis) is stored on the user and both tokens
//! are only honoured while it matches, so issuing a new pair or logging
//! out revokes the previous one.

use chrono::Utc;
use ff_auth_simple::avatar_hash;
use ff_core::auth::{from_millis, Identity, TokenClaims, TokenPair, TokenPurpose, Viewer};
use ff_core::error::{AppError, Result};
use ff_core::models::{NewUser, User, UserPatch, ADMIN_ROLE};
use ff_core::pagination::Page;
use ff_core::traits::Task;
use ff_core::views::UserView;
use ff_db_sqlite::{commit, roles, users, views, SqliteConnection};
use secrecy::SecretString;

use crate::{mail, require_owner_or_admin, signed_in, AppState};

fn bad_credentials() -> AppError {
    AppError::Unauthorized("invalid credentials".into())
}

impl AppState {
    /// Creates the account with its self-follow and mails a confirmation
    /// token. The configured admin address gets the Administrator role.
    pub async fn register(&self, new: NewUser) -> Result<User> {
        new.validate()?;
        let digest = self.hash_password(&new.password)?;
        let is_admin = self
            .settings
            .mail
            .admin
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(new.email.trim()));

        let mut tx = self.db.begin().await?;
        let role = if is_admin {
            roles::by_name(&mut tx, ADMIN_ROLE)
                .await?
                .ok_or_else(|| AppError::Internal("administrator role missing; run insert_roles".into()))?
        } else {
            roles::default_role(&mut tx).await?
        };
        let user = users::create(&mut tx, &new, &digest, &avatar_hash(&new.email), role.id, Utc::now()).await?;
        commit(tx).await?;

        self.send_confirmation(&user)?;
        Ok(user)
    }

    pub fn generate_confirmation_token(&self, user_id: i64) -> Result<String> {
        let claims = TokenClaims::new(user_id, TokenPurpose::Confirm);
        self.issue_token(&claims, self.settings.auth.email_token_ttl())
    }

    fn send_confirmation(&self, user: &User) -> Result<()> {
        let token = self.generate_confirmation_token(user.id)?;
        self.dispatch(Task::SendEmail(mail::confirm_account(&self.settings.mail, user, &token)));
        Ok(())
    }

    /// Exchanges credentials for a token pair.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<TokenPair> {
        let mut tx = self.db.begin().await?;
        let Some(user) = users::find_by_email(&mut tx, email.trim()).await? else {
            tracing::debug!("login for unknown email");
            return Err(bad_credentials());
        };
        if !self.verify_password(password, &user.password_hash) {
            tracing::debug!(user_id = user.id, "login with wrong password");
            return Err(bad_credentials());
        }
        users::touch_last_seen(&mut tx, user.id, Utc::now()).await?;
        let pair = self.issue_pair(&mut tx, &user).await?;
        commit(tx).await?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(pair)
    }

    /// Redeems a refresh token for a new pair, revoking the old one.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.verify_token(refresh_token, TokenPurpose::Refresh)?;
        let mut tx = self.db.begin().await?;
        let user = self.session_user(&mut tx, &claims).await?;
        let pair = self.issue_pair(&mut tx, &user).await?;
        commit(tx).await?;
        Ok(pair)
    }

    /// Revokes the viewer's current pair.
    pub async fn logout(&self, viewer: &Viewer) -> Result<()> {
        let user_id = signed_in(viewer)?;
        let mut tx = self.db.begin().await?;
        users::set_token_issued_at(&mut tx, user_id, None).await?;
        commit(tx).await?;
        tracing::info!(user_id, "user logged out");
        Ok(())
    }

    /// Resolves an access token into the viewer it speaks for.
    pub async fn authenticate(&self, access_token: &str) -> Result<Viewer> {
        let claims = self.verify_token(access_token, TokenPurpose::Access)?;
        let mut tx = self.db.begin().await?;
        let user = self.session_user(&mut tx, &claims).await?;
        let role = roles::get(&mut tx, user.role_id).await?;
        commit(tx).await?;
        Ok(Viewer::User(Identity::new(&user, &role)))
    }

    async fn issue_pair(&self, conn: &mut SqliteConnection, user: &User) -> Result<TokenPair> {
        // Strictly after the previous pair so a re-issue always revokes it.
        let mut issued = Utc::now().timestamp_millis();
        if let Some(previous) = user.token_issued_at {
            issued = issued.max(previous + 1);
        }
        let issued_at = from_millis(issued);
        let auth = &self.settings.auth;
        let access = TokenClaims::at(user.id, TokenPurpose::Access, issued_at);
        let refresh = TokenClaims::at(user.id, TokenPurpose::Refresh, issued_at);
        let pair = TokenPair {
            access_token: self.issue_token(&access, auth.access_ttl())?,
            refresh_token: self.issue_token(&refresh, auth.refresh_ttl())?,
            token_type: "Bearer",
            expires_in: auth.access_ttl_secs,
        };
        if auth.single_session {
            users::set_token_issued_at(conn, user.id, Some(issued)).await?;
        }
        Ok(pair)
    }

    /// The token's subject, if the token still belongs to its live pair.
    async fn session_user(&self, conn: &mut SqliteConnection, claims: &TokenClaims) -> Result<User> {
        let Some(user) = users::get(conn, claims.subject).await? else {
            tracing::debug!(user_id = claims.subject, "token for a deleted user");
            return Err(AppError::invalid_token());
        };
        if self.settings.auth.single_session && user.token_issued_at != Some(claims.issued_at_millis()) {
            tracing::debug!(user_id = user.id, "token from a revoked pair");
            return Err(AppError::invalid_token());
        }
        Ok(user)
    }

    /// Marks the viewer's account confirmed. Returns false when it already was.
    pub async fn confirm(&self, viewer: &Viewer, token: &str) -> Result<bool> {
        let user_id = signed_in(viewer)?;
        let claims = self.verify_token(token, TokenPurpose::Confirm)?;
        if claims.subject != user_id {
            tracing::debug!(user_id, subject = claims.subject, "confirmation token for another user");
            return Err(AppError::invalid_token());
        }
        let mut tx = self.db.begin().await?;
        let user = users::require(&mut tx, user_id).await?;
        if user.confirmed {
            return Ok(false);
        }
        users::set_confirmed(&mut tx, user_id).await?;
        commit(tx).await?;
        tracing::info!(user_id, "account confirmed");
        Ok(true)
    }

    pub async fn resend_confirmation(&self, viewer: &Viewer) -> Result<()> {
        let user = self.current_user(viewer).await?;
        if user.confirmed {
            return Err(AppError::validation("account already confirmed"));
        }
        self.send_confirmation(&user)
    }

    /// Mails a reset token. Unknown addresses are accepted silently.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let user = users::find_by_email(&mut tx, email.trim()).await?;
        drop(tx);
        let Some(user) = user else {
            tracing::debug!("password reset for unknown email");
            return Ok(());
        };
        let claims = TokenClaims::new(user.id, TokenPurpose::ResetPassword);
        let token = self.issue_token(&claims, self.settings.auth.email_token_ttl())?;
        self.dispatch(Task::SendEmail(mail::reset_password(&self.settings.mail, &user, &token)));
        Ok(())
    }

    /// Sets a new password from a reset token and revokes the current pair.
    pub async fn reset_password(&self, token: &str, new_password: &SecretString) -> Result<()> {
        let claims = self.verify_token(token, TokenPurpose::ResetPassword)?;
        let digest = self.hash_password(new_password)?;
        let mut tx = self.db.begin().await?;
        if users::get(&mut tx, claims.subject).await?.is_none() {
            return Err(AppError::invalid_token());
        }
        users::set_password_hash(&mut tx, claims.subject, &digest).await?;
        users::set_token_issued_at(&mut tx, claims.subject, None).await?;
        commit(tx).await?;
        tracing::info!(user_id = claims.subject, "password reset");
        Ok(())
    }

    pub async fn change_password(
        &self,
        viewer: &Viewer,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<()> {
        let user = self.current_user(viewer).await?;
        if !self.verify_password(old_password, &user.password_hash) {
            return Err(bad_credentials());
        }
        let digest = self.hash_password(new_password)?;
        let mut tx = self.db.begin().await?;
        users::set_password_hash(&mut tx, user.id, &digest).await?;
        users::set_token_issued_at(&mut tx, user.id, None).await?;
        commit(tx).await?;
        tracing::info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Mails a change-email token to the new address.
    pub async fn request_email_change(&self, viewer: &Viewer, new_email: &str, password: &SecretString) -> Result<()> {
        let user = self.current_user(viewer).await?;
        if !self.verify_password(password, &user.password_hash) {
            return Err(bad_credentials());
        }
        let new_email = new_email.trim();
        if !new_email.contains('@') {
            return Err(AppError::validation("a valid email is required"));
        }
        self.ensure_email_free(new_email).await?;
        let claims = TokenClaims::new(user.id, TokenPurpose::ChangeEmail).with_new_email(new_email);
        let token = self.issue_token(&claims, self.settings.auth.email_token_ttl())?;
        self.dispatch(Task::SendEmail(mail::change_email(&self.settings.mail, &user, new_email, &token)));
        Ok(())
    }

    /// Redeems a change-email token; the avatar hash follows the address.
    pub async fn change_email(&self, viewer: &Viewer, token: &str) -> Result<User> {
        let user_id = signed_in(viewer)?;
        let claims = self.verify_token(token, TokenPurpose::ChangeEmail)?;
        let new_email = match (&claims.new_email, claims.subject == user_id) {
            (Some(email), true) => email.clone(),
            _ => return Err(AppError::invalid_token()),
        };
        self.ensure_email_free(&new_email).await?;
        let mut tx = self.db.begin().await?;
        users::set_email(&mut tx, user_id, &new_email, &avatar_hash(&new_email)).await?;
        let user = users::require(&mut tx, user_id).await?;
        commit(tx).await?;
        tracing::info!(user_id, "email changed");
        Ok(user)
    }

    async fn ensure_email_free(&self, email: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        match users::find_by_email(&mut tx, email).await? {
            Some(_) => Err(AppError::Conflict("email already registered".into())),
            None => Ok(()),
        }
    }

    pub async fn current_user(&self, viewer: &Viewer) -> Result<User> {
        let user_id = signed_in(viewer)?;
        self.get_user(user_id).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, id).await
    }

    pub async fn dump_user(&self, viewer: &Viewer, id: i64) -> Result<UserView> {
        let mut tx = self.db.begin().await?;
        let user = users::require(&mut tx, id).await?;
        views::dump_user(&mut tx, &user, viewer, Utc::now()).await
    }

    /// Profile patch. Only the user or an administrator may edit.
    pub async fn update_user(&self, viewer: &Viewer, id: i64, patch: &UserPatch) -> Result<User> {
        require_owner_or_admin(viewer, id)?;
        let mut tx = self.db.begin().await?;
        let user = users::update_profile(&mut tx, id, patch).await?;
        commit(tx).await?;
        Ok(user)
    }

    /// Records activity for `last_seen`.
    pub async fn ping(&self, viewer: &Viewer) -> Result<()> {
        let user_id = signed_in(viewer)?;
        let mut tx = self.db.begin().await?;
        users::touch_last_seen(&mut tx, user_id, Utc::now()).await?;
        commit(tx).await
    }

    /// Deletes the account and everything it owns, right away.
    pub async fn delete_user(&self, viewer: &Viewer, id: i64) -> Result<()> {
        require_owner_or_admin(viewer, id)?;
        let mut tx = self.db.begin().await?;
        if !users::delete(&mut tx, id).await? {
            return Err(AppError::not_found("User", id));
        }
        commit(tx).await
    }

    /// Defers the deletion to the task runner.
    pub async fn request_account_deletion(&self, viewer: &Viewer, id: i64) -> Result<()> {
        require_owner_or_admin(viewer, id)?;
        self.get_user(id).await?;
        self.dispatch(Task::DeleteAccount { user_id: id });
        tracing::info!(user_id = id, "account deletion queued");
        Ok(())
    }

    pub async fn followers(&self, viewer: &Viewer, id: i64, page: u32) -> Result<Page<UserView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, id).await?;
        let found = users::followers(&mut tx, id, page, self.per_page()).await?;
        self.dump_users(&mut tx, found, viewer).await
    }

    pub async fn following(&self, viewer: &Viewer, id: i64, page: u32) -> Result<Page<UserView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, id).await?;
        let found = users::following(&mut tx, id, page, self.per_page()).await?;
        self.dump_users(&mut tx, found, viewer).await
    }

    async fn dump_users(&self, conn: &mut SqliteConnection, found: Page<User>, viewer: &Viewer) -> Result<Page<UserView>> {
        let now = Utc::now();
        let mut dumped = Vec::with_capacity(found.items.len());
        for user in &found.items {
            dumped.push(views::dump_user(conn, user, viewer, now).await?);
        }
        Ok(found.with_items(dumped))
    }
}
