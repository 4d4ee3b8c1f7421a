//! Row to model mapping.

use ff_core::error::{AppError, Result};
use ff_core::models::{Comment, CommentParent, Permissions, Post, Role, Tweet, User};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::db_err;

pub(crate) fn user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id").map_err(db_err)?,
        email: row.try_get("email").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        password_hash: row.try_get("password_hash").map_err(db_err)?,
        confirmed: row.try_get("confirmed").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        location: row.try_get("location").map_err(db_err)?,
        about_me: row.try_get("about_me").map_err(db_err)?,
        member_since: row.try_get("member_since").map_err(db_err)?,
        last_seen: row.try_get("last_seen").map_err(db_err)?,
        avatar_hash: row.try_get("avatar_hash").map_err(db_err)?,
        role_id: row.try_get("role_id").map_err(db_err)?,
        token_issued_at: row.try_get("token_issued_at").map_err(db_err)?,
    })
}

pub(crate) fn role(row: &SqliteRow) -> Result<Role> {
    let bits: i64 = row.try_get("permissions").map_err(db_err)?;
    Ok(Role {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        is_default: row.try_get("is_default").map_err(db_err)?,
        permissions: Permissions::from_bits(bits as u32),
    })
}

pub(crate) fn post(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        body: row.try_get("body").map_err(db_err)?,
        summary: row.try_get("summary").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

pub(crate) fn tweet(row: &SqliteRow) -> Result<Tweet> {
    Ok(Tweet {
        id: row.try_get("id").map_err(db_err)?,
        body: row.try_get("body").map_err(db_err)?,
        summary: row.try_get("summary").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

pub(crate) fn comment(row: &SqliteRow) -> Result<Comment> {
    let post_id: Option<i64> = row.try_get("post_id").map_err(db_err)?;
    let tweet_id: Option<i64> = row.try_get("tweet_id").map_err(db_err)?;
    let id: i64 = row.try_get("id").map_err(db_err)?;
    let parent = match (post_id, tweet_id) {
        (Some(post), None) => CommentParent::Post(post),
        (None, Some(tweet)) => CommentParent::Tweet(tweet),
        _ => return Err(AppError::Internal(format!("comment {id} has no single parent"))),
    };
    Ok(Comment {
        id,
        body: row.try_get("body").map_err(db_err)?,
        parent,
        reply_to: row.try_get("reply_to").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

/// Maps every row, stopping at the first failure.
pub(crate) fn all<T>(rows: &[SqliteRow], map: fn(&SqliteRow) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(map).collect()
}
