//! Post lifecycle and listings.
//!
//! The abstract is recomputed explicitly whenever a body is written.

use chrono::{DateTime, Utc};
use ff_core::error::{AppError, Result};
use ff_core::models::{NewPost, Post, PostPatch};
use ff_core::pagination::{page_offset, CursorPage, Page};
use ff_core::text::make_abstract;
use sqlx::SqliteConnection;

use crate::{db_err, rows};

pub async fn create(conn: &mut SqliteConnection, author_id: i64, new: &NewPost, now: DateTime<Utc>) -> Result<Post> {
    new.validate()?;
    let row = sqlx::query(
        "INSERT INTO posts (title, body, summary, author_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         RETURNING *",
    )
    .bind(&new.title)
    .bind(&new.body)
    .bind(make_abstract(&new.body))
    .bind(author_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    let post = rows::post(&row)?;
    tracing::info!(post_id = post.id, author_id, "post created");
    Ok(post)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query("SELECT * FROM posts WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(rows::post).transpose()
}

pub async fn require(conn: &mut SqliteConnection, id: i64) -> Result<Post> {
    get(conn, id).await?.ok_or_else(|| AppError::not_found("Post", id))
}

/// Applies a patch. Nothing is written, and `updated_at` stays, when the
/// patch supplies no field.
pub async fn update(conn: &mut SqliteConnection, id: i64, patch: &PostPatch, now: DateTime<Utc>) -> Result<Post> {
    let mut post = require(conn, id).await?;
    if patch.title.is_none() && patch.body.is_none() {
        return Ok(post);
    }
    if patch.apply(&mut post)? {
        post.summary = make_abstract(&post.body);
    }
    post.updated_at = now;
    sqlx::query("UPDATE posts SET title = ?1, body = ?2, summary = ?3, updated_at = ?4 WHERE id = ?5")
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.summary)
        .bind(post.updated_at)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(post)
}

/// Deletes the post with its comments (and their likes) and every like or
/// collect edge on it.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!(post_id = id, "post deleted");
    }
    Ok(deleted)
}

/// Id-cursor listing: posts with `id < max_id`, newest first.
pub async fn before(conn: &mut SqliteConnection, max_id: Option<i64>, limit: u32) -> Result<CursorPage<Post>> {
    let found = sqlx::query(
        "SELECT * FROM posts WHERE (?1 IS NULL OR id < ?1) ORDER BY id DESC LIMIT ?2",
    )
    .bind(max_id)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(CursorPage::from_batch(rows::all(&found, rows::post)?, |p| p.id))
}

/// Offset listing of every post, newest first.
pub async fn page(conn: &mut SqliteConnection, page: u32, per_page: u32) -> Result<Page<Post>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query("SELECT * FROM posts ORDER BY id DESC LIMIT ?1 OFFSET ?2")
        .bind(i64::from(per_page))
        .bind(page_offset(page, per_page))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::post)?, page, per_page, total as u64))
}

/// Offset listing of one author's posts.
pub async fn by_author(conn: &mut SqliteConnection, author_id: i64, page: u32, per_page: u32) -> Result<Page<Post>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?1")
        .bind(author_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query("SELECT * FROM posts WHERE author_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3")
        .bind(author_id)
        .bind(i64::from(per_page))
        .bind(page_offset(page, per_page))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::post)?, page, per_page, total as u64))
}

/// Feed of everyone `user_id` follows, which includes their own posts.
pub async fn followed_before(
    conn: &mut SqliteConnection,
    user_id: i64,
    max_id: Option<i64>,
    limit: u32,
) -> Result<CursorPage<Post>> {
    let found = sqlx::query(
        "SELECT p.* FROM posts p JOIN follows f ON f.followee_id = p.author_id
         WHERE f.follower_id = ?1 AND (?2 IS NULL OR p.id < ?2)
         ORDER BY p.id DESC LIMIT ?3",
    )
    .bind(user_id)
    .bind(max_id)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(CursorPage::from_batch(rows::all(&found, rows::post)?, |p| p.id))
}

/// Posts `user_id` liked, most recent like first.
pub async fn liked_by(conn: &mut SqliteConnection, user_id: i64, page: u32, per_page: u32) -> Result<Page<Post>> {
    edge_page(conn, "user_like_post", user_id, page, per_page).await
}

/// Posts `user_id` collected, most recent first.
pub async fn collected_by(conn: &mut SqliteConnection, user_id: i64, page: u32, per_page: u32) -> Result<Page<Post>> {
    edge_page(conn, "user_collect_post", user_id, page, per_page).await
}

async fn edge_page(
    conn: &mut SqliteConnection,
    table: &str,
    user_id: i64,
    page: u32,
    per_page: u32,
) -> Result<Page<Post>> {
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?1"))
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let found = sqlx::query(&format!(
        "SELECT p.* FROM {table} e JOIN posts p ON p.id = e.post_id
         WHERE e.user_id = ?1 ORDER BY e.rowid DESC LIMIT ?2 OFFSET ?3"
    ))
    .bind(user_id)
    .bind(i64::from(per_page))
    .bind(page_offset(page, per_page))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(Page::new(rows::all(&found, rows::post)?, page, per_page, total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger, testing};
    use ff_core::models::{CommentParent, NewComment, Relation};
    use ff_core::text::ABSTRACT_LEN;

    #[tokio::test]
    async fn create_derives_abstract() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let draft = NewPost { title: "T".into(), body: format!("**{}**", "x".repeat(500)) };

        let post = create(&mut conn, ann.id, &draft, Utc::now()).await.unwrap();
        assert_eq!(post.summary.chars().count(), ABSTRACT_LEN + 1);
        assert!(!post.summary.contains('*'));
    }

    #[tokio::test]
    async fn create_rejects_empty_post() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let err = create(&mut conn, ann.id, &NewPost::default(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn update_recomputes_abstract_and_timestamp() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let post = testing::post(&mut conn, &ann, "first").await;
        let later = post.updated_at + chrono::Duration::minutes(5);

        let patch = PostPatch { title: None, body: Some("# new _body_".into()) };
        let updated = update(&mut conn, post.id, &patch, later).await.unwrap();
        assert_eq!(updated.title, "first");
        assert_eq!(updated.summary, "new body");
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, post.created_at);

        let stored = require(&mut conn, post.id).await.unwrap();
        assert_eq!(stored.summary, "new body");

        let untouched = update(&mut conn, post.id, &PostPatch::default(), later + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(untouched.updated_at, later);
    }

    #[tokio::test]
    async fn delete_cascades_to_comments_and_edges() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let bob = testing::user(&mut conn, "bob").await;
        let post = testing::post(&mut conn, &ann, "doomed").await;
        let keep = testing::post(&mut conn, &ann, "kept").await;

        let comment = crate::comments::create(
            &mut conn,
            bob.id,
            &NewComment::new("nice", CommentParent::Post(post.id)),
            Utc::now(),
        )
        .await
        .unwrap();
        ledger::add(&mut conn, Relation::LikeComment, ann.id, &comment).await.unwrap();
        ledger::add(&mut conn, Relation::LikePost, bob.id, &post).await.unwrap();
        ledger::add(&mut conn, Relation::CollectPost, bob.id, &post).await.unwrap();
        ledger::add(&mut conn, Relation::LikePost, bob.id, &keep).await.unwrap();

        assert!(delete(&mut conn, post.id).await.unwrap());
        assert!(get(&mut conn, post.id).await.unwrap().is_none());
        assert!(crate::comments::get(&mut conn, comment.id).await.unwrap().is_none());
        assert_eq!(ledger::count(&mut conn, Relation::LikeComment, &comment).await.unwrap(), 0);
        assert_eq!(ledger::count(&mut conn, Relation::LikePost, post.id).await.unwrap(), 0);
        assert_eq!(ledger::count(&mut conn, Relation::CollectPost, post.id).await.unwrap(), 0);
        assert_eq!(ledger::count(&mut conn, Relation::LikePost, &keep).await.unwrap(), 1);
        assert!(!delete(&mut conn, post.id).await.unwrap());
    }

    #[tokio::test]
    async fn followed_feed_includes_own_posts() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let bob = testing::user(&mut conn, "bob").await;
        let cat = testing::user(&mut conn, "cat").await;
        let own = testing::post(&mut conn, &ann, "mine").await;
        let followed = testing::post(&mut conn, &bob, "bob's").await;
        testing::post(&mut conn, &cat, "cat's").await;
        ledger::add(&mut conn, Relation::Follow, ann.id, &bob).await.unwrap();

        let feed = followed_before(&mut conn, ann.id, None, 10).await.unwrap();
        let ids: Vec<i64> = feed.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![followed.id, own.id]);
        assert_eq!(feed.next_cursor, Some(own.id));
    }

    #[tokio::test]
    async fn liked_and_collected_listings() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let first = testing::post(&mut conn, &ann, "one").await;
        let second = testing::post(&mut conn, &ann, "two").await;
        ledger::add(&mut conn, Relation::LikePost, ann.id, &second).await.unwrap();
        ledger::add(&mut conn, Relation::LikePost, ann.id, &first).await.unwrap();
        ledger::add(&mut conn, Relation::CollectPost, ann.id, &second).await.unwrap();

        let liked = liked_by(&mut conn, ann.id, 1, 10).await.unwrap();
        assert_eq!(liked.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(collected_by(&mut conn, ann.id, 1, 10).await.unwrap().total, 1);
        assert!(by_author(&mut conn, ann.id, 1, 1).await.unwrap().has_next);
    }
}
