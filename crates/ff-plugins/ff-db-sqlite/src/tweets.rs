//! Tweet lifecycle and listings. Same shape as posts, body only.

use chrono::{DateTime, Utc};
use ff_core::error::{AppError, Result};
use ff_core::models::{validate_body, BodyPatch, NewTweet, Tweet};
use ff_core::pagination::{page_offset, CursorPage, Page};
use ff_core::text::make_abstract;
use sqlx::SqliteConnection;

use crate::{db_err, rows};

pub async fn create(conn: &mut SqliteConnection, author_id: i64, new: &NewTweet, now: DateTime<Utc>) -> Result<Tweet> {
    new.validate()?;
    let row = sqlx::query(
        "INSERT INTO tweets (body, summary, author_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         RETURNING *",
    )
    .bind(&new.body)
    .bind(make_abstract(&new.body))
    .bind(author_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    let tweet = rows::tweet(&row)?;
    tracing::info!(tweet_id = tweet.id, author_id, "tweet created");
    Ok(tweet)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Tweet>> {
    let row = sqlx::query("SELECT * FROM tweets WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(rows::tweet).transpose()
}

pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<Tweet> {
    get(conn, id).await?.ok_or_else(|| AppError::not_found("Tweet", id))
}

pub async fn update(conn: &mut SqliteConnection, id: i64, patch: &BodyPatch, now: DateTime<Utc>) -> Result<Tweet> {
    let mut tweet = require(conn, id).await?;
    let Some(body) = &patch.body else {
        return Ok(tweet);
    };
    validate_body(body, "tweet")?;
    tweet.body = body.clone();
    tweet.summary = make_abstract(body);
    tweet.updated_at = now;
    sqlx::query("UPDATE tweets SET body = ?1, summary = ?2, updated_at = ?3 WHERE id = ?4")
        .bind(&tweet.body)
        .bind(&tweet.summary)
        .bind(tweet.updated_at)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(tweet)
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tweets WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!(tweet_id = id, "tweet deleted");
    }
    Ok(deleted)
}

/// Id-cursor listing: tweets with `id < max_id`, newest first.
pub async fn before(conn: &mut SqliteConnection, max_id: Option<i64>, limit: u32) -> Result<CursorPage<Tweet>> {
    let found = sqlx::query(
        "SELECT * FROM tweets WHERE (?1 IS NULL OR id < ?1) ORDER BY id DESC LIMIT ?2",
    )
    .bind(max_id)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(CursorPage::from_batch(rows::all(&found, rows::tweet)?, |t| t.id))
}

pub async fn page(conn: &mut SqliteConnection, page: u32, per_page: u32) -> Result<Page<Tweet>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets")
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query("SELECT * FROM tweets ORDER BY id DESC LIMIT ?1 OFFSET ?2")
        .bind(i64::from(per_page))
        .bind(page_offset(page, per_page))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::tweet)?, page, per_page, total as u64))
}

pub async fn by_author(conn: &mut SqliteConnection, author_id: i64, page: u32, per_page: u32) -> Result<Page<Tweet>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets WHERE author_id = ?1")
        .bind(author_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query("SELECT * FROM tweets WHERE author_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3")
        .bind(author_id)
        .bind(i64::from(per_page))
        .bind(page_offset(page, per_page))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::tweet)?, page, per_page, total as u64))
}

/// Tweets by everyone `user_id` follows, own tweets included.
pub async fn followed_before(
    conn: &mut SqliteConnection,
    user_id: i64,
    max_id: Option<i64>,
    limit: u32,
) -> Result<CursorPage<Tweet>> {
    let found = sqlx::query(
        "SELECT t.* FROM tweets t JOIN follows f ON f.followee_id = t.author_id
         WHERE f.follower_id = ?1 AND (?2 IS NULL OR t.id < ?2)
         ORDER BY t.id DESC LIMIT ?3",
    )
    .bind(user_id)
    .bind(max_id)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(CursorPage::from_batch(rows::all(&found, rows::tweet)?, |t| t.id))
}

pub async fn liked_by(conn: &mut SqliteConnection, user_id: i64, page: u32, per_page: u32) -> Result<Page<Tweet>> {
    edge_page(conn, "user_like_tweet", user_id, page, per_page).await
}

pub async fn collected_by(conn: &mut SqliteConnection, user_id: i64, page: u32, per_page: u32) -> Result<Page<Tweet>> {
    edge_page(conn, "user_collect_tweet", user_id, page, per_page).await
}

async fn edge_page(
    conn: &mut SqliteConnection,
    table: &str,
    user_id: i64,
    page: u32,
    per_page: u32,
) -> Result<Page<Tweet>> {
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?1"))
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query(&format!(
        "SELECT t.* FROM {table} e JOIN tweets t ON t.id = e.tweet_id
         WHERE e.user_id = ?1 ORDER BY e.rowid DESC LIMIT ?2 OFFSET ?3"
    ))
    .bind(user_id)
    .bind(i64::from(per_page))
    .bind(page_offset(page, per_page))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::tweet)?, page, per_page, total as u64))
}
