//! # Domain Models
//!
//! These structs represent the core entities of Firefly.
//! Identities are store-assigned, monotonically increasing integers so that
//! id-cursor pagination stays stable under concurrent inserts.

use std::ops::BitOr;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Bit-flag permission set carried by a [`Role`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u32);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const FOLLOW: Permissions = Permissions(1);
    pub const COMMENT: Permissions = Permissions(2);
    pub const WRITE: Permissions = Permissions(4);
    pub const MODERATE: Permissions = Permissions(8);
    pub const ADMIN: Permissions = Permissions(16);

    pub const fn from_bits(bits: u32) -> Self {
        Permissions(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Permissions) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Permissions) {
        self.0 &= !other.0;
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}

/// Name of the role handed to every new account unless it is the admin.
pub const DEFAULT_ROLE: &str = "User";
pub const ADMIN_ROLE: &str = "Administrator";

/// The seeded role table: (name, permissions).
pub fn role_presets() -> [(&'static str, Permissions); 3] {
    let user = Permissions::FOLLOW | Permissions::COMMENT | Permissions::WRITE;
    let moderator = user | Permissions::MODERATE;
    [
        (DEFAULT_ROLE, user),
        ("Moderator", moderator),
        (ADMIN_ROLE, moderator | Permissions::ADMIN),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    /// Exactly one role in the table carries this flag.
    pub is_default: bool,
    pub permissions: Permissions,
}

impl Role {
    pub fn has_permission(&self, perm: Permissions) -> bool {
        self.permissions.contains(perm)
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub confirmed: bool,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub avatar_hash: String,
    pub role_id: i64,
    /// Issue time (unix millis) of the only token pair still honoured.
    #[serde(skip_serializing)]
    pub token_issued_at: Option<i64>,
}

/// Registration input. The password never leaves its `SecretString`.
#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: SecretString,
}

impl NewUser {
    pub fn new(email: impl Into<String>, username: impl Into<String>, password: &str) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: SecretString::from(password.to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(AppError::validation("a valid email is required"));
        }
        if self.username.trim().is_empty() {
            return Err(AppError::validation("username is required"));
        }
        Ok(())
    }
}

/// Profile patch: only supplied fields overwrite.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.location.is_none() && self.about_me.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl NewPost {
    /// Builds a draft from a structured record, rejecting empty content.
    pub fn load(record: serde_json::Value) -> Result<Self> {
        let post: NewPost = serde_json::from_value(record)
            .map_err(|e| AppError::validation(format!("malformed post: {e}")))?;
        post.validate()?;
        Ok(post)
    }

    pub fn validate(&self) -> Result<()> {
        validate_post_fields(&self.title, &self.body)
    }
}

pub(crate) fn validate_post_fields(title: &str, body: &str) -> Result<()> {
    if title.trim().is_empty() && body.trim().is_empty() {
        return Err(AppError::validation("a post needs a title or a body"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PostPatch {
    pub fn load(record: serde_json::Value) -> Result<Self> {
        serde_json::from_value(record)
            .map_err(|e| AppError::validation(format!("malformed post patch: {e}")))
    }

    /// Applies the patch to `post`, returning whether the body changed.
    pub fn apply(&self, post: &mut Post) -> Result<bool> {
        let title = self.title.as_deref().unwrap_or(&post.title);
        let body = self.body.as_deref().unwrap_or(&post.body);
        validate_post_fields(title, body)?;
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        match &self.body {
            Some(body) => {
                post.body = body.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tweet {
    pub id: i64,
    pub body: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTweet {
    #[serde(default)]
    pub body: String,
}

impl NewTweet {
    pub fn load(record: serde_json::Value) -> Result<Self> {
        let tweet: NewTweet = serde_json::from_value(record)
            .map_err(|e| AppError::validation(format!("malformed tweet: {e}")))?;
        tweet.validate()?;
        Ok(tweet)
    }

    pub fn validate(&self) -> Result<()> {
        require_body(&self.body, "tweet")
    }
}

/// Body-only patch, shared by tweets and comments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BodyPatch {
    pub body: Option<String>,
}

impl BodyPatch {
    pub fn load(record: serde_json::Value) -> Result<Self> {
        serde_json::from_value(record)
            .map_err(|e| AppError::validation(format!("malformed patch: {e}")))
    }
}

fn require_body(body: &str, kind: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(AppError::validation(format!("a {kind} needs a body")));
    }
    Ok(())
}

/// The content a comment hangs off. Exactly one per comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentParent {
    Post(i64),
    Tweet(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub parent: CommentParent,
    pub reply_to: Option<i64>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub body: String,
    pub parent: CommentParent,
    pub reply_to: Option<i64>,
}

#[derive(Deserialize)]
struct CommentRecord {
    #[serde(default)]
    body: String,
    post_id: Option<i64>,
    tweet_id: Option<i64>,
    reply_to: Option<i64>,
}

impl NewComment {
    pub fn new(body: impl Into<String>, parent: CommentParent) -> Self {
        Self { body: body.into(), parent, reply_to: None }
    }

    pub fn replying_to(mut self, comment_id: i64) -> Self {
        self.reply_to = Some(comment_id);
        self
    }

    /// Reads `{body, post_id | tweet_id, reply_to?}`; exactly one parent.
    pub fn load(record: serde_json::Value) -> Result<Self> {
        let record: CommentRecord = serde_json::from_value(record)
            .map_err(|e| AppError::validation(format!("malformed comment: {e}")))?;
        let parent = match (record.post_id, record.tweet_id) {
            (Some(id), None) => CommentParent::Post(id),
            (None, Some(id)) => CommentParent::Tweet(id),
            _ => {
                return Err(AppError::validation(
                    "a comment belongs to exactly one post or tweet",
                ))
            }
        };
        let comment = NewComment { body: record.body, parent, reply_to: record.reply_to };
        comment.validate()?;
        Ok(comment)
    }

    pub fn validate(&self) -> Result<()> {
        require_body(&self.body, "comment")
    }
}

/// Validates a body replacement for tweets and comments.
pub fn validate_body(body: &str, kind: &str) -> Result<()> {
    require_body(body, kind)
}

/// A directed many-to-many relation recorded as an edge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Follow,
    LikePost,
    LikeComment,
    LikeTweet,
    CollectPost,
    CollectTweet,
}

impl Relation {
    pub const ALL: [Relation; 6] = [
        Relation::Follow,
        Relation::LikePost,
        Relation::LikeComment,
        Relation::LikeTweet,
        Relation::CollectPost,
        Relation::CollectTweet,
    ];
}

/// Something that may or may not have been assigned an identity yet.
///
/// Relationship edges are only ever created against persisted targets.
pub trait Persisted {
    fn persisted_id(&self) -> Option<i64>;
}

macro_rules! persisted {
    ($($ty:ty),*) => {
        $(impl Persisted for $ty {
            fn persisted_id(&self) -> Option<i64> {
                Some(self.id)
            }
        })*
    };
}

persisted!(User, Post, Tweet, Comment);

macro_rules! draft {
    ($($ty:ty),*) => {
        $(impl Persisted for $ty {
            fn persisted_id(&self) -> Option<i64> {
                None
            }
        })*
    };
}

draft!(NewUser, NewPost, NewTweet, NewComment);

impl Persisted for i64 {
    fn persisted_id(&self) -> Option<i64> {
        Some(*self)
    }
}

impl Persisted for Option<i64> {
    fn persisted_id(&self) -> Option<i64> {
        *self
    }
}

impl<T: Persisted + ?Sized> Persisted for &T {
    fn persisted_id(&self) -> Option<i64> {
        (**self).persisted_id()
    }
}
