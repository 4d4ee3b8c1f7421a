//! User persistence, follower lists and per-user counts.

use chrono::{DateTime, Utc};
use ff_core::error::{AppError, Result};
use ff_core::models::{NewUser, Relation, User, UserPatch};
use ff_core::pagination::{page_offset, Page};
use ff_core::views::UserStats;
use sqlx::SqliteConnection;

use crate::{db_err, ledger, rows};

/// Translates a uniqueness failure on users into a caller-facing conflict.
fn identity_conflict(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let msg = db.message();
            if msg.contains("users.email") {
                return AppError::Conflict("email already registered".into());
            }
            if msg.contains("users.username") {
                return AppError::Conflict("username already in use".into());
            }
        }
    }
    db_err(err)
}

/// Inserts the account and its self-follow edge.
pub async fn create(
    conn: &mut SqliteConnection,
    new: &NewUser,
    password_hash: &str,
    avatar_hash: &str,
    role_id: i64,
    now: DateTime<Utc>,
) -> Result<User> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, username, password_hash, confirmed, member_since,
                            last_seen, avatar_hash, role_id)
         VALUES (?1, ?2, ?3, 0, ?4, ?4, ?5, ?6)
         RETURNING id",
    )
    .bind(new.email.trim())
    .bind(new.username.trim())
    .bind(password_hash)
    .bind(now)
    .bind(avatar_hash)
    .bind(role_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(identity_conflict)?;

    ledger::add(&mut *conn, Relation::Follow, id, id).await?;
    tracing::info!(user_id = id, "user created");
    require(conn, id).await
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(rows::user).transpose()
}

/// Like [`get`], but a missing row is `NotFound`.
pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<User> {
    get(conn, id).await?.ok_or_else(|| AppError::not_found("User", id))
}

pub async fn find_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
        .bind(email.trim())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(rows::user).transpose()
}

/// Writes the supplied profile fields only.
pub async fn update_profile(conn: &mut SqliteConnection, id: i64, patch: &UserPatch) -> Result<User> {
    let mut user = require(conn, id).await?;
    if patch.is_empty() {
        return Ok(user);
    }
    if let Some(name) = &patch.name {
        user.name = Some(name.clone());
    }
    if let Some(location) = &patch.location {
        user.location = Some(location.clone());
    }
    if let Some(about_me) = &patch.about_me {
        user.about_me = Some(about_me.clone());
    }
    sqlx::query("UPDATE users SET name = ?1, location = ?2, about_me = ?3 WHERE id = ?4")
        .bind(&user.name)
        .bind(&user.location)
        .bind(&user.about_me)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(user)
}

fn expect_one(result: sqlx::sqlite::SqliteQueryResult, id: i64) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User", id));
    }
    Ok(())
}

pub async fn set_password_hash(conn: &mut SqliteConnection, id: i64, hash: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(hash)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    expect_one(result, id)
}

pub async fn set_confirmed(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE users SET confirmed = 1 WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    expect_one(result, id)
}

/// Changes the email and the avatar hash derived from it.
pub async fn set_email(conn: &mut SqliteConnection, id: i64, email: &str, avatar_hash: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET email = ?1, avatar_hash = ?2 WHERE id = ?3")
        .bind(email.trim())
        .bind(avatar_hash)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(identity_conflict)?;
    expect_one(result, id)
}

pub async fn touch_last_seen(conn: &mut SqliteConnection, id: i64, now: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE users SET last_seen = ?1 WHERE id = ?2")
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    expect_one(result, id)
}

/// Stores (or clears) the issue time of the only honoured token pair.
pub async fn set_token_issued_at(conn: &mut SqliteConnection, id: i64, millis: Option<i64>) -> Result<()> {
    let result = sqlx::query("UPDATE users SET token_issued_at = ?1 WHERE id = ?2")
        .bind(millis)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    expect_one(result, id)
}

/// Deletes the account. Posts, tweets, comments, every edge owned by or
/// pointing at the user, and the self-follow go with it. Returns `false`
/// when there was nothing to delete.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!(user_id = id, "user deleted");
    }
    Ok(deleted)
}

/// Follower/following counts exclude the self-follow edge.
pub async fn stats(conn: &mut SqliteConnection, id: i64) -> Result<UserStats> {
    let (followers, following, posts, tweets): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
            (SELECT COUNT(*) FROM follows WHERE followee_id = ?1 AND follower_id <> ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followee_id <> ?1),
            (SELECT COUNT(*) FROM posts WHERE author_id = ?1),
            (SELECT COUNT(*) FROM tweets WHERE author_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(UserStats { followers, following, posts, tweets })
}

/// Users following `id`, newest edge first, self excluded.
pub async fn followers(conn: &mut SqliteConnection, id: i64, page: u32, per_page: u32) -> Result<Page<User>> {
    follow_page(conn, id, page, per_page, "followee_id", "follower_id").await
}

/// Users `id` follows, newest edge first, self excluded.
pub async fn following(conn: &mut SqliteConnection, id: i64, page: u32, per_page: u32) -> Result<Page<User>> {
    follow_page(conn, id, page, per_page, "follower_id", "followee_id").await
}

async fn follow_page(
    conn: &mut SqliteConnection,
    id: i64,
    page: u32,
    per_page: u32,
    anchor: &str,
    other: &str,
) -> Result<Page<User>> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM follows WHERE {anchor} = ?1 AND {other} <> ?1"
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    let found = sqlx::query(&format!(
        "SELECT u.* FROM follows f JOIN users u ON u.id = f.{other}
         WHERE f.{anchor} = ?1 AND f.{other} <> ?1
         ORDER BY f.rowid DESC
         LIMIT ?2 OFFSET ?3"
    ))
    .bind(id)
    .bind(i64::from(per_page))
    .bind(page_offset(page, per_page))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::user)?, page, per_page, total as u64))
}
