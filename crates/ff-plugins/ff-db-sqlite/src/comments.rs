//! Comments on posts and tweets, with optional one-level reply links.

use chrono::{DateTime, Utc};
use ff_core::error::{AppError, Result};
use ff_core::models::{validate_body, BodyPatch, Comment, CommentParent, NewComment};
use ff_core::pagination::{page_offset, Page};
use sqlx::SqliteConnection;

use crate::{db_err, posts, rows, tweets};

fn parent_columns(parent: CommentParent) -> (Option<i64>, Option<i64>) {
    match parent {
        CommentParent::Post(id) => (Some(id), None),
        CommentParent::Tweet(id) => (None, Some(id)),
    }
}

/// Creates a comment. The parent must exist, and a reply must point at a
/// comment under the same parent.
pub async fn create(
    conn: &mut SqliteConnection,
    author_id: i64,
    new: &NewComment,
    now: DateTime<Utc>,
) -> Result<Comment> {
    new.validate()?;
    match new.parent {
        CommentParent::Post(id) => {
            posts::require(conn, id).await?;
        }
        CommentParent::Tweet(id) => {
            tweets::require(conn, id).await?;
        }
    }
    if let Some(reply_to) = new.reply_to {
        let target = require(conn, reply_to).await?;
        if target.parent != new.parent {
            return Err(AppError::validation("a reply must stay under the same post or tweet"));
        }
    }
    let (post_id, tweet_id) = parent_columns(new.parent);
    let row = sqlx::query(
        "INSERT INTO comments (body, post_id, tweet_id, reply_to, author_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         RETURNING *",
    )
    .bind(&new.body)
    .bind(post_id)
    .bind(tweet_id)
    .bind(new.reply_to)
    .bind(author_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    let comment = rows::comment(&row)?;
    tracing::info!(comment_id = comment.id, author_id, parent = ?comment.parent, "comment created");
    Ok(comment)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query("SELECT * FROM comments WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(rows::comment).transpose()
}

pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<Comment> {
    get(conn, id).await?.ok_or_else(|| AppError::not_found("Comment", id))
}

pub async fn update(conn: &mut SqliteConnection, id: i64, patch: &BodyPatch, now: DateTime<Utc>) -> Result<Comment> {
    let mut comment = require(conn, id).await?;
    let Some(body) = &patch.body else {
        return Ok(comment);
    };
    validate_body(body, "comment")?;
    comment.body = body.clone();
    comment.updated_at = now;
    sqlx::query("UPDATE comments SET body = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(&comment.body)
        .bind(comment.updated_at)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(comment)
}

/// Deletes the comment, its replies and their likes.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!(comment_id = id, "comment deleted");
    }
    Ok(deleted)
}

/// Comments under one post or tweet, newest first.
pub async fn for_parent(
    conn: &mut SqliteConnection,
    parent: CommentParent,
    page: u32,
    per_page: u32,
) -> Result<Page<Comment>> {
    let column = match parent {
        CommentParent::Post(_) => "post_id",
        CommentParent::Tweet(_) => "tweet_id",
    };
    let id = match parent {
        CommentParent::Post(id) | CommentParent::Tweet(id) => id,
    };
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comments WHERE {column} = ?1"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query(&format!(
        "SELECT * FROM comments WHERE {column} = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3"
    ))
    .bind(id)
    .bind(i64::from(per_page))
    .bind(page_offset(page, per_page))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::comment)?, page, per_page, total as u64))
}

/// Direct replies to a comment, oldest first.
pub async fn replies(conn: &mut SqliteConnection, id: i64) -> Result<Vec<Comment>> {
    let found = sqlx::query("SELECT * FROM comments WHERE reply_to = ?1 ORDER BY id ASC")
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    rows::all(&found, rows::comment)
}

pub async fn count_for(conn: &mut SqliteConnection, parent: CommentParent) -> Result<i64> {
    let (post_id, tweet_id) = parent_columns(parent);
    sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id IS ?1 AND tweet_id IS ?2")
        .bind(post_id)
        .bind(tweet_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)
}

pub async fn count_replies(conn: &mut SqliteConnection, id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE reply_to = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)
}
