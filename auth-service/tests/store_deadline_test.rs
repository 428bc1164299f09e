//! Refresh store calls that outlive the operation deadline.

mod common;

use banking_auth::services::{AuthError, RefreshStateStore};
use common::{secret, TestEngine, ALICE_SECRET};
use std::time::Duration;
use tokio::time::Instant;

fn deadline_in(millis: u64) -> Instant {
    Instant::now() + Duration::from_millis(millis)
}

#[tokio::test]
async fn refresh_store_timeout_during_login_issues_nothing() {
    let (engine, slow) = TestEngine::with_slow_refresh_store();
    slow.set_delay(Duration::from_secs(5));

    let err = engine
        .service
        .login("alice", &secret(ALICE_SECRET), deadline_in(1_000))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout));
    assert!(engine.refresh_store.is_empty());
}

#[tokio::test]
async fn refresh_store_timeout_during_refresh_leaves_family_unchanged() {
    let (engine, slow) = TestEngine::with_slow_refresh_store();
    let pair = engine
        .service
        .login("alice", &secret(ALICE_SECRET), deadline_in(5_000))
        .await
        .unwrap();
    let family = engine.service.verify(&pair.access_token).unwrap().fam;
    let current = engine.refresh_store.get_current(&family).await.unwrap();
    assert!(current.is_some());

    slow.set_delay(Duration::from_secs(5));
    let err = engine
        .service
        .refresh(&pair.refresh_token, deadline_in(200))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Timeout));
    assert_eq!(engine.refresh_store.get_current(&family).await.unwrap(), current);

    // The timed-out attempt consumed nothing, so the same token still rotates.
    slow.set_delay(Duration::ZERO);
    let next = engine
        .service
        .refresh(&pair.refresh_token, deadline_in(5_000))
        .await
        .expect("refresh after timeout");
    assert_eq!(engine.service.verify(&next.access_token).unwrap().fam, family);
}

#[tokio::test]
async fn reuse_revokes_family_even_when_deadline_ends_after_the_rotation() {
    let (engine, slow) = TestEngine::with_slow_refresh_store();
    let first = engine
        .service
        .login("alice", &secret(ALICE_SECRET), deadline_in(5_000))
        .await
        .unwrap();
    let family = engine.service.verify(&first.access_token).unwrap().fam;
    let second = engine
        .service
        .refresh(&first.refresh_token, deadline_in(5_000))
        .await
        .unwrap();

    // Room for exactly one slow store call.
    slow.set_delay(Duration::from_millis(400));
    let reuse = engine
        .service
        .refresh(&first.refresh_token, deadline_in(600))
        .await
        .unwrap_err();
    assert!(matches!(reuse, AuthError::TokenRevoked));

    slow.set_delay(Duration::ZERO);
    assert_eq!(engine.refresh_store.get_current(&family).await.unwrap(), None);
    let successor = engine
        .service
        .refresh(&second.refresh_token, deadline_in(5_000))
        .await
        .unwrap_err();
    assert!(matches!(successor, AuthError::TokenRevoked));
}

#[tokio::test]
async fn refresh_store_timeout_during_logout_is_reported() {
    let (engine, slow) = TestEngine::with_slow_refresh_store();
    let pair = engine
        .service
        .login("alice", &secret(ALICE_SECRET), deadline_in(5_000))
        .await
        .unwrap();

    slow.set_delay(Duration::from_secs(5));
    let err = engine
        .service
        .logout(&pair.refresh_token, deadline_in(200))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout));
    assert_eq!(engine.refresh_store.len(), 1);
}
