//! Public projections (`dump`) of the domain models.
//!
//! Counts are computed on demand by the store. Viewer-relative flags are
//! `None` for anonymous viewers and are then left out of the output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Comment, CommentParent, Post, Tweet, User};
use crate::text::humanize;

/// Minimal author block embedded in content views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorView {
    pub id: i64,
    pub username: String,
    pub avatar_hash: String,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self { id: user.id, username: user.username.clone(), avatar_hash: user.avatar_hash.clone() }
    }
}

/// Counts the store computes for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub tweets: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    /// Only shown to the account itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub avatar_hash: String,
    pub confirmed: bool,
    pub member_since: DateTime<Utc>,
    pub member_since_humanized: String,
    pub last_seen: DateTime<Utc>,
    pub last_seen_humanized: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub tweet_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_followed: Option<bool>,
}

impl UserView {
    pub fn build(
        user: &User,
        stats: UserStats,
        viewer_id: Option<i64>,
        is_followed: Option<bool>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: (viewer_id == Some(user.id)).then(|| user.email.clone()),
            name: user.name.clone(),
            location: user.location.clone(),
            about_me: user.about_me.clone(),
            avatar_hash: user.avatar_hash.clone(),
            confirmed: user.confirmed,
            member_since: user.member_since,
            member_since_humanized: humanize(user.member_since, now),
            last_seen: user.last_seen,
            last_seen_humanized: humanize(user.last_seen, now),
            followers_count: stats.followers,
            following_count: stats.following,
            post_count: stats.posts,
            tweet_count: stats.tweets,
            is_followed,
        }
    }
}

/// Engagement counts and viewer flags shared by posts and tweets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Engagement {
    pub likes: i64,
    pub collects: i64,
    pub comments: i64,
    pub is_liked: Option<bool>,
    pub is_collected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub body: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub author: AuthorView,
    pub created_at: DateTime<Utc>,
    pub created_humanized: String,
    pub updated_at: DateTime<Utc>,
    pub updated_humanized: String,
    pub like_count: i64,
    pub collect_count: i64,
    pub comment_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_collected: Option<bool>,
}

impl PostView {
    pub fn build(post: &Post, author: AuthorView, engagement: Engagement, now: DateTime<Utc>) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            body: post.body.clone(),
            summary: post.summary.clone(),
            author,
            created_at: post.created_at,
            created_humanized: humanize(post.created_at, now),
            updated_at: post.updated_at,
            updated_humanized: humanize(post.updated_at, now),
            like_count: engagement.likes,
            collect_count: engagement.collects,
            comment_count: engagement.comments,
            is_liked: engagement.is_liked,
            is_collected: engagement.is_collected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetView {
    pub id: i64,
    pub body: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub author: AuthorView,
    pub created_at: DateTime<Utc>,
    pub created_humanized: String,
    pub updated_at: DateTime<Utc>,
    pub like_count: i64,
    pub collect_count: i64,
    pub comment_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_collected: Option<bool>,
}

impl TweetView {
    pub fn build(tweet: &Tweet, author: AuthorView, engagement: Engagement, now: DateTime<Utc>) -> Self {
        Self {
            id: tweet.id,
            body: tweet.body.clone(),
            summary: tweet.summary.clone(),
            author,
            created_at: tweet.created_at,
            created_humanized: humanize(tweet.created_at, now),
            updated_at: tweet.updated_at,
            like_count: engagement.likes,
            collect_count: engagement.collects,
            comment_count: engagement.comments,
            is_liked: engagement.is_liked,
            is_collected: engagement.is_collected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<i64>,
    pub reply_to: Option<i64>,
    pub author: AuthorView,
    pub created_at: DateTime<Utc>,
    pub created_humanized: String,
    pub like_count: i64,
    pub reply_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
}

impl CommentView {
    pub fn build(
        comment: &Comment,
        author: AuthorView,
        likes: i64,
        replies: i64,
        is_liked: Option<bool>,
        now: DateTime<Utc>,
    ) -> Self {
        let (post_id, tweet_id) = match comment.parent {
            CommentParent::Post(id) => (Some(id), None),
            CommentParent::Tweet(id) => (None, Some(id)),
        };
        Self {
            id: comment.id,
            body: comment.body.clone(),
            post_id,
            tweet_id,
            reply_to: comment.reply_to,
            author,
            created_at: comment.created_at,
            created_humanized: humanize(comment.created_at, now),
            like_count: likes,
            reply_count: replies,
            is_liked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        let now = Utc::now();
        Post {
            id: 3,
            title: "t".into(),
            body: "b".into(),
            summary: "b".into(),
            author_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn author() -> AuthorView {
        AuthorView { id: 1, username: "ann".into(), avatar_hash: "00".into() }
    }

    #[test]
    fn anonymous_dump_omits_viewer_flags() {
        let view = PostView::build(&post(), author(), Engagement::default(), Utc::now());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("is_liked").is_none());
        assert!(json.get("is_collected").is_none());
        assert_eq!(json["abstract"], "b");
        assert_eq!(json["created_humanized"], "just now");
    }

    #[test]
    fn viewer_dump_carries_flags() {
        let engagement = Engagement { likes: 2, is_liked: Some(true), is_collected: Some(false), ..Default::default() };
        let json = serde_json::to_value(PostView::build(&post(), author(), engagement, Utc::now())).unwrap();
        assert_eq!(json["is_liked"], true);
        assert_eq!(json["is_collected"], false);
        assert_eq!(json["like_count"], 2);
    }
}
