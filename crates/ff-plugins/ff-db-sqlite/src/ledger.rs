//! # Relationship Ledger
//!
//! Idempotent edge operations for every [`Relation`]. The composite primary
//! key of each edge table is what guarantees at most one edge per
//! (actor, target); inserts use `ON CONFLICT DO NOTHING`, so a concurrent
//! duplicate `add` is absorbed by the store instead of surfacing an error.

use chrono::Utc;
use ff_core::error::Result;
use ff_core::models::{Persisted, Relation};
use sqlx::SqliteConnection;

use crate::db_err;

/// Table layout of one relation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeTable {
    pub table: &'static str,
    pub actor: &'static str,
    pub target: &'static str,
}

pub(crate) fn edge_table(relation: Relation) -> EdgeTable {
    let (table, actor, target) = match relation {
        Relation::Follow => ("follows", "follower_id", "followee_id"),
        Relation::LikePost => ("user_like_post", "user_id", "post_id"),
        Relation::LikeComment => ("user_like_comment", "user_id", "comment_id"),
        Relation::LikeTweet => ("user_like_tweet", "user_id", "tweet_id"),
        Relation::CollectPost => ("user_collect_post", "user_id", "post_id"),
        Relation::CollectTweet => ("user_collect_tweet", "user_id", "tweet_id"),
    };
    EdgeTable { table, actor, target }
}

/// Records `actor -> target`. Returns `true` when a new edge was written.
///
/// An unsaved target writes nothing. A target id with no row behind it is
/// a `NotFound` error.
pub async fn add(
    conn: &mut SqliteConnection,
    relation: Relation,
    actor: i64,
    target: impl Persisted,
) -> Result<bool> {
    let Some(target) = target.persisted_id() else {
        tracing::debug!(?relation, actor, "ignoring edge to unsaved target");
        return Ok(false);
    };
    let t = edge_table(relation);
    let sql = format!(
        "INSERT INTO {} ({}, {}, created_at) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
        t.table, t.actor, t.target
    );
    let result = sqlx::query(&sql)
        .bind(actor)
        .bind(target)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected() == 1)
}

/// Deletes `actor -> target`. Returns `true` when an edge was removed.
pub async fn remove(
    conn: &mut SqliteConnection,
    relation: Relation,
    actor: i64,
    target: impl Persisted,
) -> Result<bool> {
    let Some(target) = target.persisted_id() else {
        return Ok(false);
    };
    let t = edge_table(relation);
    let sql = format!("DELETE FROM {} WHERE {} = ?1 AND {} = ?2", t.table, t.actor, t.target);
    let result = sqlx::query(&sql)
        .bind(actor)
        .bind(target)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected() > 0)
}

pub async fn exists(
    conn: &mut SqliteConnection,
    relation: Relation,
    actor: i64,
    target: impl Persisted,
) -> Result<bool> {
    let Some(target) = target.persisted_id() else {
        return Ok(false);
    };
    let t = edge_table(relation);
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2)",
        t.table, t.actor, t.target
    );
    sqlx::query_scalar::<_, bool>(&sql)
        .bind(actor)
        .bind(target)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)
}

/// Number of actors related to `target` (for follows: followers, self included).
pub async fn count(conn: &mut SqliteConnection, relation: Relation, target: impl Persisted) -> Result<i64> {
    let Some(target) = target.persisted_id() else {
        return Ok(0);
    };
    let t = edge_table(relation);
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", t.table, t.target);
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(target)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)
}

/// `Some(exists)` for an authenticated viewer, `None` for anonymous ones.
pub async fn viewer_flag(
    conn: &mut SqliteConnection,
    relation: Relation,
    viewer: Option<i64>,
    target: impl Persisted,
) -> Result<Option<bool>> {
    match viewer {
        Some(actor) => Ok(Some(exists(conn, relation, actor, target).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use ff_core::error::AppError;
    use ff_core::models::{CommentParent, NewComment, NewPost};

    #[tokio::test]
    async fn add_twice_leaves_one_edge() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let bob = testing::user(&mut conn, "bob").await;
        let post = testing::post(&mut conn, &bob, "hello").await;

        assert!(add(&mut conn, Relation::LikePost, ann.id, &post).await.unwrap());
        assert!(!add(&mut conn, Relation::LikePost, ann.id, &post).await.unwrap());
        assert_eq!(count(&mut conn, Relation::LikePost, &post).await.unwrap(), 1);
        assert!(exists(&mut conn, Relation::LikePost, ann.id, &post).await.unwrap());
        assert!(!exists(&mut conn, Relation::LikePost, bob.id, &post).await.unwrap());
    }

    #[tokio::test]
    async fn every_relation_is_idempotent() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let bob = testing::user(&mut conn, "bob").await;
        let post = testing::post(&mut conn, &bob, "hello").await;
        let tweet = testing::tweet(&mut conn, &bob, "hi").await;
        let comment = crate::comments::create(
            &mut conn,
            bob.id,
            &NewComment::new("nice", CommentParent::Post(post.id)),
            Utc::now(),
        )
        .await
        .unwrap();

        for relation in Relation::ALL {
            let target = match relation {
                Relation::Follow => bob.id,
                Relation::LikePost | Relation::CollectPost => post.id,
                Relation::LikeComment => comment.id,
                Relation::LikeTweet | Relation::CollectTweet => tweet.id,
            };
            let before = count(&mut conn, relation, target).await.unwrap();

            assert!(add(&mut conn, relation, ann.id, target).await.unwrap(), "{relation:?}");
            assert!(!add(&mut conn, relation, ann.id, target).await.unwrap(), "{relation:?}");
            assert_eq!(count(&mut conn, relation, target).await.unwrap(), before + 1, "{relation:?}");
            assert!(remove(&mut conn, relation, ann.id, target).await.unwrap(), "{relation:?}");
            assert!(!remove(&mut conn, relation, ann.id, target).await.unwrap(), "{relation:?}");
            assert_eq!(count(&mut conn, relation, target).await.unwrap(), before, "{relation:?}");
        }
    }

    #[tokio::test]
    async fn remove_missing_edge_is_a_noop() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let tweet = testing::tweet(&mut conn, &ann, "hi").await;

        assert!(!remove(&mut conn, Relation::CollectTweet, ann.id, &tweet).await.unwrap());
        assert_eq!(count(&mut conn, Relation::CollectTweet, &tweet).await.unwrap(), 0);

        add(&mut conn, Relation::CollectTweet, ann.id, &tweet).await.unwrap();
        assert!(remove(&mut conn, Relation::CollectTweet, ann.id, &tweet).await.unwrap());
        assert!(!remove(&mut conn, Relation::CollectTweet, ann.id, &tweet).await.unwrap());
    }

    #[tokio::test]
    async fn unsaved_target_does_not_exist() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let draft = NewPost { title: "draft".into(), body: String::new() };

        assert!(!add(&mut conn, Relation::LikePost, ann.id, &draft).await.unwrap());
        assert!(!exists(&mut conn, Relation::LikePost, ann.id, &draft).await.unwrap());
        assert!(!remove(&mut conn, Relation::LikePost, ann.id, &draft).await.unwrap());
        assert_eq!(count(&mut conn, Relation::LikePost, &draft).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dangling_target_is_not_found() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;

        let err = add(&mut conn, Relation::LikeComment, ann.id, 999_i64).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn follow_counts_include_self_edge() {
        let db = testing::db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let ann = testing::user(&mut conn, "ann").await;
        let bob = testing::user(&mut conn, "bob").await;

        add(&mut conn, Relation::Follow, ann.id, &bob).await.unwrap();
        assert_eq!(count(&mut conn, Relation::Follow, &bob).await.unwrap(), 2);
        assert_eq!(viewer_flag(&mut conn, Relation::Follow, None, &bob).await.unwrap(), None);
        assert_eq!(
            viewer_flag(&mut conn, Relation::Follow, Some(ann.id), &bob).await.unwrap(),
            Some(true)
        );
    }
}
