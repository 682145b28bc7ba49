//! Follow Toggle Tests
//!
//! Covers follow/unfollow idempotence, self-follow and redirects.

mod common;

use axum::http::StatusCode;
use common::app;
use quill::app::social::SocialService;

#[tokio::test]
async fn follow_creates_one_edge() {
    let app = app().await;
    let fan = app.create_user("flw_fan").await;
    app.create_user("flw_star").await;

    let resp = app.get("/profile/flw_star/follow/", Some(&fan)).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/profile/flw_star/");
    assert_eq!(app.count_follows_from(&fan).await, 1);

    // Following again is a no-op
    let resp = app.get("/profile/flw_star/follow/", Some(&fan)).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(app.count_follows_from(&fan).await, 1);
}

#[tokio::test]
async fn follow_then_unfollow_restores_edges() {
    let app = app().await;
    let fan = app.create_user("flw_round").await;
    app.create_user("flw_round_star").await;
    let before = app.count_follows_from(&fan).await;

    app.get("/profile/flw_round_star/follow/", Some(&fan)).await;
    assert_eq!(app.count_follows_from(&fan).await, before + 1);

    let resp = app
        .get_with_referer(
            "/profile/flw_round_star/unfollow/",
            Some(&fan),
            "http://testserver/follow/?page=2",
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/follow/?page=2");
    assert_eq!(app.count_follows_from(&fan).await, before);

    // Unfollowing again changes nothing
    let resp = app.get("/profile/flw_round_star/unfollow/", Some(&fan)).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/profile/flw_round_star/");
    assert_eq!(app.count_follows_from(&fan).await, before);
}

#[tokio::test]
async fn self_follow_never_creates_an_edge() {
    let app = app().await;
    let narcissus = app.create_user("flw_self").await;

    let resp = app
        .get_with_referer(
            "/profile/flw_self/follow/",
            Some(&narcissus),
            "http://testserver/group/mirrors/",
        )
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location(), "/group/mirrors/");

    let resp = app.get("/profile/flw_self/follow/", Some(&narcissus)).await;
    assert_eq!(resp.location(), "/profile/flw_self/");
    assert_eq!(app.count_follows_from(&narcissus).await, 0);
}

#[tokio::test]
async fn following_unknown_user_is_not_found() {
    let app = app().await;
    let fan = app.create_user("flw_ghost_fan").await;

    let resp = app.get("/profile/flw_ghost/follow/", Some(&fan)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(app.count_follows_from(&fan).await, 0);
}

#[tokio::test]
async fn follow_requires_login() {
    let app = app().await;
    app.create_user("flw_anon_star").await;

    let resp = app.get("/profile/flw_anon_star/follow/", None).await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(
        resp.location(),
        "/auth/login/?next=/profile/flw_anon_star/follow/"
    );
}

#[tokio::test]
async fn slashless_follow_paths_redirect() {
    let app = app().await;
    let fan = app.create_user("flw_slash").await;

    let resp = app.get("/profile/flw_slash_star/follow", Some(&fan)).await;
    assert_eq!(resp.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.location(), "/profile/flw_slash_star/follow/");

    let resp = app.get("/profile/flw_slash_star/unfollow", Some(&fan)).await;
    assert_eq!(resp.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.location(), "/profile/flw_slash_star/unfollow/");
}

#[tokio::test]
async fn social_service_refuses_self_edges() {
    let app = app().await;
    let user = app.create_user("flw_svc_self").await;
    let other = app.create_user("flw_svc_other").await;
    let service = SocialService::new(app.state.db.clone());

    assert!(service.follow(user.id, user.id).await.unwrap().is_none());
    assert!(!service.edge_exists(user.id, user.id).await.unwrap());

    let edge = service.follow(user.id, other.id).await.unwrap().unwrap();
    assert_eq!((edge.user_id, edge.author_id), (user.id, other.id));
    assert!(service.follow(user.id, other.id).await.unwrap().is_none());
    assert!(service.edge_exists(user.id, other.id).await.unwrap());
    assert!(!service.edge_exists(other.id, user.id).await.unwrap());

    assert!(service.unfollow(user.id, "flw_svc_other").await.unwrap());
    assert!(!service.unfollow(user.id, "flw_svc_other").await.unwrap());
    assert!(!service.edge_exists(user.id, other.id).await.unwrap());

    // The table itself rejects self edges
    let inserted = sqlx::query("INSERT INTO follows (user_id, author_id) VALUES ($1, $1)")
        .bind(user.id)
        .execute(app.pool())
        .await;
    assert!(inserted.is_err());
}
