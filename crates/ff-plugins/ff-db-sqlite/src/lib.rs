//! # ff-db-sqlite Implementation
//!
//! This crate implements the data mapping between the SQLite relational model
//! and the `ff-core` domain models.
//!
//! Every repository function takes an explicit `&mut SqliteConnection`, which
//! callers obtain from [`Database::begin`]. Nothing in here commits: the caller
//! owns the unit of work and decides when it ends.

use std::str::FromStr;

use ff_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

pub mod comments;
pub mod ledger;
pub mod posts;
pub mod roles;
pub mod tweets;
pub mod users;
pub mod views;

mod rows;

pub use sqlx::SqliteConnection;

/// One unit of work. Dropping it without [`commit`] rolls back.
pub type Tx = Transaction<'static, Sqlite>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Shared connection pool over one SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the database at `url` with foreign keys on.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(AppError::internal)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(AppError::internal)?;
        tracing::info!(url, "database connected");
        Ok(Self { pool })
    }

    /// A private in-memory database, already migrated. One connection, kept
    /// alive for the lifetime of the pool so the data does not vanish.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(AppError::internal)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(AppError::internal)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.map_err(AppError::internal)?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a unit of work. Dropping it without commit rolls back.
    pub async fn begin(&self) -> Result<Tx> {
        self.pool.begin().await.map_err(AppError::internal)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Ends a unit of work, making every write in it visible at once.
pub async fn commit(tx: Tx) -> Result<()> {
    tx.commit().await.map_err(db_err)
}

/// Maps storage failures onto the domain taxonomy.
///
/// Identity-column conflicts are translated by the callers that know which
/// column they touched; this only handles the generic cases.
pub(crate) fn db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return AppError::not_found("referenced row", db.message());
        }
        if db.is_check_violation() {
            return AppError::validation(db.message());
        }
    }
    AppError::internal(err)
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use ff_core::models::{NewPost, NewTweet, NewUser, Post, Tweet, User};

    use super::*;

    pub async fn db() -> Database {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        roles::insert_roles(&mut conn).await.unwrap();
        db
    }

    pub async fn user(conn: &mut SqliteConnection, name: &str) -> User {
        let role = roles::default_role(conn).await.unwrap();
        let new = NewUser::new(format!("{name}@example.com"), name, "pw");
        users::create(conn, &new, "digest", "avatar", role.id, Utc::now()).await.unwrap()
    }

    pub async fn post(conn: &mut SqliteConnection, author: &User, title: &str) -> Post {
        let draft = NewPost { title: title.to_string(), body: format!("{title} body") };
        posts::create(conn, author.id, &draft, Utc::now()).await.unwrap()
    }

    pub async fn tweet(conn: &mut SqliteConnection, author: &User, body: &str) -> Tweet {
        let draft = NewTweet { body: body.to_string() };
        tweets::create(conn, author.id, &draft, Utc::now()).await.unwrap()
    }
}
