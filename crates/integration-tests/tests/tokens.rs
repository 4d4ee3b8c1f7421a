use chrono::{Duration, Utc};
use ff_auth_simple::JwtTokenCodec;
use ff_core::auth::{TokenClaims, TokenPurpose};
use ff_core::error::AppError;
use ff_core::traits::{MockTaskQueue, TokenCodec};
use ff_db_sqlite::users;
use integration_tests::{app, database, settings, World, SECRET};
use secrecy::SecretString;

fn pw(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn codec() -> JwtTokenCodec {
    JwtTokenCodec::new(&pw(SECRET))
}

#[test]
fn issued_tokens_verify_for_their_purpose_only() {
    let codec = codec();
    let purposes = [
        TokenPurpose::Access,
        TokenPurpose::Refresh,
        TokenPurpose::Confirm,
        TokenPurpose::ResetPassword,
        TokenPurpose::ChangeEmail,
    ];
    for purpose in purposes {
        let claims = TokenClaims::new(42, purpose);
        let token = codec.issue(&claims, Duration::minutes(10)).unwrap();
        assert_eq!(codec.verify(&token, purpose).unwrap(), claims);
        for other in purposes.iter().filter(|p| **p != purpose) {
            assert_eq!(codec.verify(&token, *other).unwrap_err(), AppError::invalid_token());
        }
    }
}

#[test]
fn expired_tokens_fail() {
    let codec = codec();
    let claims = TokenClaims::at(1, TokenPurpose::Access, Utc::now() - Duration::hours(2));
    let token = codec.issue(&claims, Duration::hours(1)).unwrap();
    assert_eq!(codec.verify(&token, TokenPurpose::Access).unwrap_err(), AppError::invalid_token());
}

#[tokio::test]
async fn access_and_refresh_are_not_interchangeable() {
    let w = World::new().await;
    let ann = w.register("ann").await;
    let pair = w.app.login("ann@example.com", &pw("password")).await.unwrap();

    assert_eq!(w.app.authenticate(&pair.access_token).await.unwrap().user_id(), Some(ann.id));
    assert_eq!(w.app.authenticate(&pair.refresh_token).await.unwrap_err(), AppError::invalid_token());
    assert_eq!(w.app.refresh(&pair.access_token).await.unwrap_err(), AppError::invalid_token());
    assert!(w.app.refresh(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn reissuing_revokes_previous_pair() {
    let w = World::new().await;
    w.register("ann").await;
    let first = w.app.login("ann@example.com", &pw("password")).await.unwrap();
    let second = w.app.login("ann@example.com", &pw("password")).await.unwrap();

    assert!(w.app.authenticate(&first.access_token).await.is_err());
    assert!(w.app.refresh(&first.refresh_token).await.is_err());
    let viewer = w.app.authenticate(&second.access_token).await.unwrap();

    w.app.logout(&viewer).await.unwrap();
    assert!(w.app.authenticate(&second.access_token).await.is_err());
    assert!(w.app.refresh(&second.refresh_token).await.is_err());
}

#[tokio::test]
async fn pairs_coexist_without_single_session() {
    let mut cfg = settings(10);
    cfg.auth.single_session = false;
    let (queue, _outbox) = ff_tasks_local::ChannelQueue::new();
    let app = app(database().await, cfg, Box::new(queue));
    app.register(ff_core::models::NewUser::new("ann@example.com", "ann", "password"))
        .await
        .unwrap();

    let first = app.login("ann@example.com", &pw("password")).await.unwrap();
    let second = app.refresh(&first.refresh_token).await.unwrap();
    assert!(app.authenticate(&first.access_token).await.is_ok());
    assert!(app.authenticate(&second.access_token).await.is_ok());
}

#[tokio::test]
async fn tokens_of_deleted_users_are_rejected() {
    let w = World::new().await;
    let ann = w.register("ann").await;
    let pair = w.app.login("ann@example.com", &pw("password")).await.unwrap();

    let mut tx = w.app.db.begin().await.unwrap();
    users::delete(&mut tx, ann.id).await.unwrap();
    ff_db_sqlite::commit(tx).await.unwrap();
    assert_eq!(w.app.authenticate(&pair.access_token).await.unwrap_err(), AppError::invalid_token());
}

#[tokio::test]
async fn confirmation_token_is_mailed_and_redeemable() {
    let mut w = World::new().await;
    let ann = w.register("ann").await;
    let token = w.last_mail_token();
    let viewer = w.viewer(&ann).await;

    assert!(w.app.confirm(&viewer, &token).await.unwrap());
    assert!(w.app.get_user(ann.id).await.unwrap().confirmed);
}

#[tokio::test]
async fn registration_survives_a_closed_queue() {
    let mut queue = MockTaskQueue::new();
    queue
        .expect_enqueue()
        .times(1)
        .returning(|_| Err(AppError::Internal("task queue is closed".into())));
    let app = app(database().await, settings(10), Box::new(queue));

    let user = app
        .register(ff_core::models::NewUser::new("ann@example.com", "ann", "password"))
        .await
        .unwrap();
    assert!(app.get_user(user.id).await.is_ok());
}
