//! Follows, likes and collections on behalf of a viewer.

use ff_core::auth::Viewer;
use ff_core::error::{AppError, Result};
use ff_core::models::{Permissions, Relation};
use ff_db_sqlite::{comments, commit, ledger, posts, tweets, users, SqliteConnection};

use crate::{require_permission, signed_in, AppState};

/// Fails with `NotFound` unless the relation's target row exists.
async fn require_target(conn: &mut SqliteConnection, relation: Relation, target: i64) -> Result<()> {
    match relation {
        Relation::Follow => users::require(conn, target).await.map(drop),
        Relation::LikePost | Relation::CollectPost => posts::require(conn, target).await.map(drop),
        Relation::LikeTweet | Relation::CollectTweet => tweets::require(conn, target).await.map(drop),
        Relation::LikeComment => comments::require(conn, target).await.map(drop),
    }
}

/// Following needs FOLLOW; everything else only a signed-in viewer.
fn actor_for(viewer: &Viewer, relation: Relation) -> Result<i64> {
    match relation {
        Relation::Follow => require_permission(viewer, Permissions::FOLLOW),
        _ => signed_in(viewer),
    }
}

impl AppState {
    /// Adds `viewer -> target`. Returns whether a new edge was written.
    pub async fn relate(&self, viewer: &Viewer, relation: Relation, target: i64) -> Result<bool> {
        let actor = actor_for(viewer, relation)?;
        let mut tx = self.db.begin().await?;
        require_target(&mut tx, relation, target).await?;
        let added = ledger::add(&mut tx, relation, actor, target).await?;
        commit(tx).await?;
        if added {
            tracing::info!(?relation, actor, target, "edge added");
        }
        Ok(added)
    }

    /// Removes `viewer -> target`. Returns whether an edge was removed.
    /// The self-follow cannot be removed.
    pub async fn unrelate(&self, viewer: &Viewer, relation: Relation, target: i64) -> Result<bool> {
        let actor = actor_for(viewer, relation)?;
        if relation == Relation::Follow && actor == target {
            return Err(AppError::validation("you cannot unfollow yourself"));
        }
        let mut tx = self.db.begin().await?;
        require_target(&mut tx, relation, target).await?;
        let removed = ledger::remove(&mut tx, relation, actor, target).await?;
        commit(tx).await?;
        if removed {
            tracing::info!(?relation, actor, target, "edge removed");
        }
        Ok(removed)
    }

    /// Whether `viewer -> target` exists; always false for anonymous viewers.
    pub async fn is_related(&self, viewer: &Viewer, relation: Relation, target: i64) -> Result<bool> {
        let Some(actor) = viewer.user_id() else {
            return Ok(false);
        };
        let mut tx = self.db.begin().await?;
        ledger::exists(&mut tx, relation, actor, target).await
    }

    /// Number of actors related to `target`.
    pub async fn relation_count(&self, relation: Relation, target: i64) -> Result<i64> {
        let mut tx = self.db.begin().await?;
        require_target(&mut tx, relation, target).await?;
        ledger::count(&mut tx, relation, target).await
    }

    pub async fn follow(&self, viewer: &Viewer, user_id: i64) -> Result<bool> {
        self.relate(viewer, Relation::Follow, user_id).await
    }

    pub async fn unfollow(&self, viewer: &Viewer, user_id: i64) -> Result<bool> {
        self.unrelate(viewer, Relation::Follow, user_id).await
    }
}
