//! Posts, tweets and comments: permission checks, lifecycle and listings.
//!
//! Listings come in two flavours. `*_page` is offset based and reports
//! `has_prev`/`has_next`; `*_before` walks an id cursor and is unaffected
//! by newer inserts. Both use the configured page size.

use chrono::Utc;
use ff_core::auth::Viewer;
use ff_core::error::{AppError, Result};
use ff_core::models::{BodyPatch, Comment, CommentParent, NewComment, NewPost, NewTweet, Permissions, Post, PostPatch, Tweet};
use ff_core::pagination::{CursorPage, Page};
use ff_core::views::{CommentView, PostView, TweetView};
use ff_db_sqlite::{comments, commit, posts, tweets, users, views, SqliteConnection};

use crate::{require_owner_or_admin, require_permission, signed_in, AppState};

async fn dump_posts(conn: &mut SqliteConnection, found: &[Post], viewer: &Viewer) -> Result<Vec<PostView>> {
    let now = Utc::now();
    let mut out = Vec::with_capacity(found.len());
    for post in found {
        out.push(views::dump_post(conn, post, viewer, now).await?);
    }
    Ok(out)
}

async fn dump_tweets(conn: &mut SqliteConnection, found: &[Tweet], viewer: &Viewer) -> Result<Vec<TweetView>> {
    let now = Utc::now();
    let mut out = Vec::with_capacity(found.len());
    for tweet in found {
        out.push(views::dump_tweet(conn, tweet, viewer, now).await?);
    }
    Ok(out)
}

async fn dump_comments(conn: &mut SqliteConnection, found: &[Comment], viewer: &Viewer) -> Result<Vec<CommentView>> {
    let now = Utc::now();
    let mut out = Vec::with_capacity(found.len());
    for comment in found {
        out.push(views::dump_comment(conn, comment, viewer, now).await?);
    }
    Ok(out)
}

impl AppState {
    // ── Posts ───────────────────────────────────────────────────────────────

    pub async fn create_post(&self, viewer: &Viewer, new: NewPost) -> Result<Post> {
        let author_id = require_permission(viewer, Permissions::WRITE)?;
        let mut tx = self.db.begin().await?;
        let post = posts::create(&mut tx, author_id, &new, Utc::now()).await?;
        commit(tx).await?;
        Ok(post)
    }

    pub async fn update_post(&self, viewer: &Viewer, id: i64, patch: &PostPatch) -> Result<Post> {
        let mut tx = self.db.begin().await?;
        let post = posts::require(&mut tx, id).await?;
        require_owner_or_admin(viewer, post.author_id)?;
        let post = posts::update(&mut tx, id, patch, Utc::now()).await?;
        commit(tx).await?;
        Ok(post)
    }

    pub async fn delete_post(&self, viewer: &Viewer, id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let post = posts::require(&mut tx, id).await?;
        require_owner_or_admin(viewer, post.author_id)?;
        posts::delete(&mut tx, id).await?;
        commit(tx).await
    }

    pub async fn get_post(&self, id: i64) -> Result<Post> {
        let mut tx = self.db.begin().await?;
        posts::require(&mut tx, id).await
    }

    pub async fn dump_post(&self, viewer: &Viewer, id: i64) -> Result<PostView> {
        let mut tx = self.db.begin().await?;
        let post = posts::require(&mut tx, id).await?;
        views::dump_post(&mut tx, &post, viewer, Utc::now()).await
    }

    pub async fn posts_page(&self, viewer: &Viewer, page: u32) -> Result<Page<PostView>> {
        let mut tx = self.db.begin().await?;
        let found = posts::page(&mut tx, page, self.per_page()).await?;
        let dumped = dump_posts(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn posts_before(&self, viewer: &Viewer, max_id: Option<i64>) -> Result<CursorPage<PostView>> {
        let mut tx = self.db.begin().await?;
        let found = posts::before(&mut tx, max_id, self.per_page()).await?;
        let dumped = dump_posts(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    /// Posts by everyone the viewer follows, the viewer included.
    pub async fn post_feed(&self, viewer: &Viewer, max_id: Option<i64>) -> Result<CursorPage<PostView>> {
        let user_id = signed_in(viewer)?;
        let mut tx = self.db.begin().await?;
        let found = posts::followed_before(&mut tx, user_id, max_id, self.per_page()).await?;
        let dumped = dump_posts(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn user_posts(&self, viewer: &Viewer, user_id: i64, page: u32) -> Result<Page<PostView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, user_id).await?;
        let found = posts::by_author(&mut tx, user_id, page, self.per_page()).await?;
        let dumped = dump_posts(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn liked_posts(&self, viewer: &Viewer, user_id: i64, page: u32) -> Result<Page<PostView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, user_id).await?;
        let found = posts::liked_by(&mut tx, user_id, page, self.per_page()).await?;
        let dumped = dump_posts(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn collected_posts(&self, viewer: &Viewer, user_id: i64, page: u32) -> Result<Page<PostView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, user_id).await?;
        let found = posts::collected_by(&mut tx, user_id, page, self.per_page()).await?;
        let dumped = dump_posts(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    // ── Tweets ──────────────────────────────────────────────────────────────

    pub async fn create_tweet(&self, viewer: &Viewer, new: NewTweet) -> Result<Tweet> {
        let author_id = require_permission(viewer, Permissions::WRITE)?;
        let mut tx = self.db.begin().await?;
        let tweet = tweets::create(&mut tx, author_id, &new, Utc::now()).await?;
        commit(tx).await?;
        Ok(tweet)
    }

    pub async fn update_tweet(&self, viewer: &Viewer, id: i64, patch: &BodyPatch) -> Result<Tweet> {
        let mut tx = self.db.begin().await?;
        let tweet = tweets::require(&mut tx, id).await?;
        require_owner_or_admin(viewer, tweet.author_id)?;
        let tweet = tweets::update(&mut tx, id, patch, Utc::now()).await?;
        commit(tx).await?;
        Ok(tweet)
    }

    pub async fn delete_tweet(&self, viewer: &Viewer, id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let tweet = tweets::require(&mut tx, id).await?;
        require_owner_or_admin(viewer, tweet.author_id)?;
        tweets::delete(&mut tx, id).await?;
        commit(tx).await
    }

    pub async fn get_tweet(&self, id: i64) -> Result<Tweet> {
        let mut tx = self.db.begin().await?;
        tweets::require(&mut tx, id).await
    }

    pub async fn dump_tweet(&self, viewer: &Viewer, id: i64) -> Result<TweetView> {
        let mut tx = self.db.begin().await?;
        let tweet = tweets::require(&mut tx, id).await?;
        views::dump_tweet(&mut tx, &tweet, viewer, Utc::now()).await
    }

    pub async fn tweets_page(&self, viewer: &Viewer, page: u32) -> Result<Page<TweetView>> {
        let mut tx = self.db.begin().await?;
        let found = tweets::page(&mut tx, page, self.per_page()).await?;
        let dumped = dump_tweets(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn tweets_before(&self, viewer: &Viewer, max_id: Option<i64>) -> Result<CursorPage<TweetView>> {
        let mut tx = self.db.begin().await?;
        let found = tweets::before(&mut tx, max_id, self.per_page()).await?;
        let dumped = dump_tweets(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn tweet_feed(&self, viewer: &Viewer, max_id: Option<i64>) -> Result<CursorPage<TweetView>> {
        let user_id = signed_in(viewer)?;
        let mut tx = self.db.begin().await?;
        let found = tweets::followed_before(&mut tx, user_id, max_id, self.per_page()).await?;
        let dumped = dump_tweets(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn user_tweets(&self, viewer: &Viewer, user_id: i64, page: u32) -> Result<Page<TweetView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, user_id).await?;
        let found = tweets::by_author(&mut tx, user_id, page, self.per_page()).await?;
        let dumped = dump_tweets(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn liked_tweets(&self, viewer: &Viewer, user_id: i64, page: u32) -> Result<Page<TweetView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, user_id).await?;
        let found = tweets::liked_by(&mut tx, user_id, page, self.per_page()).await?;
        let dumped = dump_tweets(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn collected_tweets(&self, viewer: &Viewer, user_id: i64, page: u32) -> Result<Page<TweetView>> {
        let mut tx = self.db.begin().await?;
        users::require(&mut tx, user_id).await?;
        let found = tweets::collected_by(&mut tx, user_id, page, self.per_page()).await?;
        let dumped = dump_tweets(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    // ── Comments ────────────────────────────────────────────────────────────

    pub async fn create_comment(&self, viewer: &Viewer, new: NewComment) -> Result<Comment> {
        let author_id = require_permission(viewer, Permissions::COMMENT)?;
        let mut tx = self.db.begin().await?;
        let comment = comments::create(&mut tx, author_id, &new, Utc::now()).await?;
        commit(tx).await?;
        Ok(comment)
    }

    pub async fn update_comment(&self, viewer: &Viewer, id: i64, patch: &BodyPatch) -> Result<Comment> {
        let mut tx = self.db.begin().await?;
        let comment = comments::require(&mut tx, id).await?;
        require_comment_moderator(viewer, &comment)?;
        let comment = comments::update(&mut tx, id, patch, Utc::now()).await?;
        commit(tx).await?;
        Ok(comment)
    }

    /// Deletes the comment together with its replies.
    pub async fn delete_comment(&self, viewer: &Viewer, id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let comment = comments::require(&mut tx, id).await?;
        require_comment_moderator(viewer, &comment)?;
        comments::delete(&mut tx, id).await?;
        commit(tx).await
    }

    pub async fn dump_comment(&self, viewer: &Viewer, id: i64) -> Result<CommentView> {
        let mut tx = self.db.begin().await?;
        let comment = comments::require(&mut tx, id).await?;
        views::dump_comment(&mut tx, &comment, viewer, Utc::now()).await
    }

    pub async fn comments_page(&self, viewer: &Viewer, parent: CommentParent, page: u32) -> Result<Page<CommentView>> {
        let mut tx = self.db.begin().await?;
        match parent {
            CommentParent::Post(id) => posts::require(&mut tx, id).await.map(drop)?,
            CommentParent::Tweet(id) => tweets::require(&mut tx, id).await.map(drop)?,
        }
        let found = comments::for_parent(&mut tx, parent, page, self.per_page()).await?;
        let dumped = dump_comments(&mut tx, &found.items, viewer).await?;
        Ok(found.with_items(dumped))
    }

    pub async fn comment_replies(&self, viewer: &Viewer, id: i64) -> Result<Vec<CommentView>> {
        let mut tx = self.db.begin().await?;
        comments::require(&mut tx, id).await?;
        let found = comments::replies(&mut tx, id).await?;
        dump_comments(&mut tx, &found, viewer).await
    }
}

/// Comment authors, moderators and administrators.
fn require_comment_moderator(viewer: &Viewer, comment: &Comment) -> Result<()> {
    signed_in(viewer)?;
    if viewer.owns_or_admin(comment.author_id) || viewer.can(Permissions::MODERATE) {
        return Ok(());
    }
    Err(AppError::denied("only the author or a moderator may do this"))
}
