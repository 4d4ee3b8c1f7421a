//! Shared fixtures for the cross-crate scenario tests.

use ff_auth_simple::{Argon2Vault, JwtTokenCodec};
use ff_config::Settings;
use ff_core::auth::{Identity, Viewer};
use ff_core::models::{NewUser, User};
use ff_core::traits::{Task, TaskQueue};
use ff_db_sqlite::{roles, Database};
use ff_service::AppState;
use ff_tasks_local::{ChannelQueue, TaskReceiver};

pub const SECRET: &str = "integration-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Test settings: fixed secret, an admin address, small pages.
pub fn settings(per_page: u32) -> Settings {
    let mut settings = Settings::with_secret(SECRET);
    settings.mail.admin = Some(ADMIN_EMAIL.to_string());
    settings.pagination.per_page = per_page;
    settings
}

/// A fresh in-memory database with the role presets.
pub async fn database() -> Database {
    let db = Database::in_memory().await.expect("in-memory database");
    let mut tx = db.begin().await.expect("begin");
    roles::insert_roles(&mut tx).await.expect("seed roles");
    ff_db_sqlite::commit(tx).await.expect("commit");
    db
}

/// Service wired with cheap Argon2 parameters and a given queue.
pub fn app(db: Database, settings: Settings, queue: Box<dyn TaskQueue>) -> AppState {
    let tokens = JwtTokenCodec::new(&settings.auth.secret_key);
    let vault = Argon2Vault::with_params(1024, 1, 1).expect("argon2 params");
    AppState::new(db, Box::new(vault), Box::new(tokens), queue, settings)
}

pub struct World {
    pub app: AppState,
    pub outbox: TaskReceiver,
}

impl World {
    pub async fn new() -> Self {
        Self::with_page_size(10).await
    }

    pub async fn with_page_size(per_page: u32) -> Self {
        let (queue, outbox) = ChannelQueue::new();
        let app = app(database().await, settings(per_page), Box::new(queue));
        Self { app, outbox }
    }

    pub async fn register(&self, name: &str) -> User {
        self.app
            .register(NewUser::new(format!("{name}@example.com"), name, "password"))
            .await
            .expect("register")
    }

    /// The viewer a valid access token for `user` resolves to.
    pub async fn viewer(&self, user: &User) -> Viewer {
        let mut tx = self.app.db.begin().await.expect("begin");
        let role = roles::get(&mut tx, user.role_id).await.expect("role");
        Viewer::User(Identity::new(user, &role))
    }

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
