//! Viewer-relative projections: counts and flags gathered from the store,
//! assembled by the `ff_core::views` builders.

use chrono::{DateTime, Utc};
use ff_core::auth::Viewer;
use ff_core::error::Result;
use ff_core::models::{Comment, CommentParent, Post, Relation, Tweet, User};
use ff_core::views::{AuthorView, CommentView, Engagement, PostView, TweetView, UserView};
use sqlx::SqliteConnection;

use crate::{comments, ledger, users};

pub async fn dump_user(conn: &mut SqliteConnection, user: &User, viewer: &Viewer, now: DateTime<Utc>) -> Result<UserView> {
    let stats = users::stats(conn, user.id).await?;
    let is_followed = ledger::viewer_flag(conn, Relation::Follow, viewer.user_id(), user).await?;
    Ok(UserView::build(user, stats, viewer.user_id(), is_followed, now))
}

pub async fn dump_post(conn: &mut SqliteConnection, post: &Post, viewer: &Viewer, now: DateTime<Utc>) -> Result<PostView> {
    let author = users::require(conn, post.author_id).await?;
    let engagement = Engagement {
        likes: ledger::count(conn, Relation::LikePost, post).await?,
        collects: ledger::count(conn, Relation::CollectPost, post).await?,
        comments: comments::count_for(conn, CommentParent::Post(post.id)).await?,
        is_liked: ledger::viewer_flag(conn, Relation::LikePost, viewer.user_id(), post).await?,
        is_collected: ledger::viewer_flag(conn, Relation::CollectPost, viewer.user_id(), post).await?,
    };
    Ok(PostView::build(post, AuthorView::from(&author), engagement, now))
}

pub async fn dump_tweet(conn: &mut SqliteConnection, tweet: &Tweet, viewer: &Viewer, now: DateTime<Utc>) -> Result<TweetView> {
    let author = users::require(conn, tweet.author_id).await?;
    let engagement = Engagement {
        likes: ledger::count(conn, Relation::LikeTweet, tweet).await?,
        collects: ledger::count(conn, Relation::CollectTweet, tweet).await?,
        comments: comments::count_for(conn, CommentParent::Tweet(tweet.id)).await?,
        is_liked: ledger::viewer_flag(conn, Relation::LikeTweet, viewer.user_id(), tweet).await?,
        is_collected: ledger::viewer_flag(conn, Relation::CollectTweet, viewer.user_id(), tweet).await?,
    };
    Ok(TweetView::build(tweet, AuthorView::from(&author), engagement, now))
}

pub async fn dump_comment(
    conn: &mut SqliteConnection,
    comment: &Comment,
    viewer: &Viewer,
    now: DateTime<Utc>,
) -> Result<CommentView> {
    let author = users::require(conn, comment.author_id).await?;
    let likes = ledger::count(conn, Relation::LikeComment, comment).await?;
    let replies = comments::count_replies(conn, comment.id).await?;
    let is_liked = ledger::viewer_flag(conn, Relation::LikeComment, viewer.user_id(), comment).await?;
    Ok(CommentView::build(comment, AuthorView::from(&author), likes, replies, is_liked, now))
}
