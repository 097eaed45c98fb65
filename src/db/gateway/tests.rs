use super::*;
use crate::db::{create_test_pool, migrations::run_migrations};
use crate::models::{Price, Track};
use chrono::Utc;

async fn setup() -> (SqlitePool, SqlxGraphGateway) {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    let gateway = SqlxGraphGateway::new(pool.clone(), Duration::from_secs(5));
    (pool, gateway)
}

fn user(username: &str) -> User {
    User::new(
        username.to_uppercase(),
        username.to_string(),
        format!("{}@x.com", username),
        format!("$argon2id$v=19$fake${}", username),
    )
}

async fn stored(gateway: &SqlxGraphGateway, username: &str) -> User {
    let user = user(username);
    gateway.insert_user(&user).await.expect("Failed to insert user");
    user
}

fn listing(name: &str) -> Listing {
    Listing::new(
        Price::new(1999, "USD"),
        Track {
            name: name.to_string(),
            path: format!("tracks/{}.mp3", name),
        },
    )
    .expect("Failed to generate listing id")
}

fn usernames(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.username.as_str()).collect()
}

#[tokio::test]
async fn test_insert_then_get_by_username_or_email() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;

    let by_username = gateway.get_user("alice").await.unwrap().expect("user by username");
    assert_eq!(by_username.id, alice.id);
    assert_eq!(by_username.email, "alice@x.com");
    assert_eq!(by_username.password_hash, alice.password_hash);

    let by_email = gateway.get_user("alice@x.com").await.unwrap().expect("user by email");
    assert_eq!(by_email.id, alice.id);
}

#[tokio::test]
async fn test_get_missing_user_is_absent() {
    let (_pool, gateway) = setup().await;
    assert!(gateway.get_user("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_username_or_email_is_constraint_violation() {
    let (_pool, gateway) = setup().await;
    stored(&gateway, "alice").await;

    let mut same_username = user("alice");
    same_username.email = "other@x.com".to_string();
    let err = gateway.insert_user(&same_username).await.unwrap_err();
    assert!(matches!(err, GatewayError::ConstraintViolation(_)));

    let mut same_email = user("other");
    same_email.email = "alice@x.com".to_string();
    let err = gateway.insert_user(&same_email).await.unwrap_err();
    assert!(matches!(err, GatewayError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_values_are_bound_not_interpolated() {
    let (_pool, gateway) = setup().await;
    let hostile = "x' OR '1'='1";
    let mut mallory = user("mallory");
    mallory.username = hostile.to_string();
    gateway.insert_user(&mallory).await.unwrap();

    // The quote-laden identifier matches only itself
    stored(&gateway, "alice").await;
    let found = gateway.get_user(hostile).await.unwrap().unwrap();
    assert_eq!(found.id, mallory.id);
    assert!(gateway.get_user("' OR 1=1 --").await.unwrap().is_none());

    let dropper = "bob'); DROP TABLE users; --";
    assert!(gateway.get_user(dropper).await.unwrap().is_none());
    assert!(gateway.get_user("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_follow_and_followers() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let bob = stored(&gateway, "bob").await;

    gateway.create_following(&alice, &bob).await.unwrap();

    let followers = gateway.get_followers(&alice).await.unwrap();
    assert_eq!(usernames(&followers), vec!["bob"]);
    assert!(gateway.get_followers(&bob).await.unwrap().is_empty());

    let following = gateway.get_following(&bob).await.unwrap();
    assert_eq!(usernames(&following), vec!["alice"]);
}

#[tokio::test]
async fn test_follow_twice_keeps_one_edge() {
    let (pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let bob = stored(&gateway, "bob").await;

    gateway.create_following(&alice, &bob).await.unwrap();
    gateway.create_following(&alice, &bob).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM edges WHERE kind = 'FOLLOWS'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_follow_unknown_user_is_not_found() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let ghost = user("ghost");

    let err = gateway.create_following(&alice, &ghost).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(gateway.get_followers(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unfollow_is_idempotent() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let bob = stored(&gateway, "bob").await;

    // No edge yet
    gateway.unfollow(&alice, &bob).await.unwrap();

    gateway.create_following(&alice, &bob).await.unwrap();
    gateway.unfollow(&alice, &bob).await.unwrap();
    assert!(gateway.get_followers(&alice).await.unwrap().is_empty());

    gateway.unfollow(&alice, &bob).await.unwrap();
    assert!(gateway.get_followers(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_user_detaches_edges() {
    let (pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let bob = stored(&gateway, "bob").await;
    gateway.create_following(&alice, &bob).await.unwrap();
    gateway.create_following(&bob, &alice).await.unwrap();

    gateway.delete_user("bob", "bob@x.com").await.unwrap();

    assert!(gateway.get_user("bob").await.unwrap().is_none());
    assert!(gateway.get_followers(&alice).await.unwrap().is_empty());
    assert!(gateway.get_following(&alice).await.unwrap().is_empty());

    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM edges")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(edges, 0);
}

#[tokio::test]
async fn test_delete_user_requires_both_fields() {
    let (_pool, gateway) = setup().await;
    stored(&gateway, "alice").await;

    let err = gateway.delete_user("alice", "wrong@x.com").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(gateway.get_user("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_create_user_listing_links_seller() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let track = listing("intro");

    gateway.create_user_listing(&alice, &track).await.unwrap();

    let seller = gateway.seller_of(&track.id).await.unwrap().unwrap();
    assert_eq!(seller.id, alice.id);

    let listings = gateway.listings_for(&alice).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id, track.id);
    assert_eq!(listings[0].price, track.price);
    assert_eq!(listings[0].track, track.track);
    assert!(!listings[0].is_sold());
}

#[tokio::test]
async fn test_create_user_listing_is_atomic() {
    let (_pool, gateway) = setup().await;
    let ghost = user("ghost");
    let track = listing("intro");

    let err = gateway.create_user_listing(&ghost, &track).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    // Neither the node nor the edge survived
    assert!(gateway.get_listing(&track.id).await.unwrap().is_none());
    assert!(gateway.seller_of(&track.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_listing_without_seller() {
    let (_pool, gateway) = setup().await;
    let track = listing("loose");

    gateway.create_listing(&track).await.unwrap();

    let loaded = gateway.get_listing(&track.id).await.unwrap().unwrap();
    assert_eq!(loaded.track.name, "loose");
    assert!(gateway.seller_of(&track.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_mark_sold_and_is_sold() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let bob = stored(&gateway, "bob").await;
    let track = listing("intro");
    gateway.create_user_listing(&alice, &track).await.unwrap();

    assert!(gateway.is_sold(&track.id).await.unwrap().is_none());

    let date = Utc::now();
    let sale = gateway.mark_sold(&bob, &track.id, date).await.unwrap();
    assert_eq!(sale.buyer.username, "bob");
    assert!(sale.buyer.password_hash.is_empty());

    let status = gateway.is_sold(&track.id).await.unwrap().expect("listing sold");
    assert_eq!(status.id, sale.id);
    assert_eq!(status.buyer.id, bob.id);
    assert!(status.buyer.password_hash.is_empty());
    assert_eq!(status.date.timestamp(), date.timestamp());

    let listings = gateway.listings_for(&alice).await.unwrap();
    assert_eq!(listings[0].transaction.as_ref().map(|t| t.id.as_str()), Some(sale.id.as_str()));
}

#[tokio::test]
async fn test_listing_sold_only_once() {
    let (_pool, gateway) = setup().await;
    let alice = stored(&gateway, "alice").await;
    let bob = stored(&gateway, "bob").await;
    let carol = stored(&gateway, "carol").await;
    let track = listing("intro");
    gateway.create_user_listing(&alice, &track).await.unwrap();

    gateway.mark_sold(&bob, &track.id, Utc::now()).await.unwrap();
    let err = gateway.mark_sold(&carol, &track.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, GatewayError::ConstraintViolation(_)));

    let status = gateway.is_sold(&track.id).await.unwrap().unwrap();
    assert_eq!(status.buyer.username, "bob");
}

#[tokio::test]
async fn test_mark_sold_unknown_listing_is_not_found() {
    let (_pool, gateway) = setup().await;
    let bob = stored(&gateway, "bob").await;

    let err = gateway.mark_sold(&bob, "missing123", Utc::now()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
}

#[tokio::test]
async fn test_store_call_times_out() {
    let (pool, _) = setup().await;
    let gateway = SqlxGraphGateway::new(pool.clone(), Duration::from_millis(50));

    // The test pool has a single connection; holding it starves the gateway
    let _held = pool.acquire().await.unwrap();

    let err = gateway.get_user("alice").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout(_)));
}
