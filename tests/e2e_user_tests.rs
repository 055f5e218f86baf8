//! End-to-end tests for favorites and user administration

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_favorites_are_idempotent() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;
    let song = &server.seed.song_1_id;

    for _ in 0..2 {
        let response = user.add_favorite(song).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Added to favorites");
    }
    let favorites: Value = user.favorites().await.json().await.unwrap();
    let favorites = favorites.as_array().unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0]["fullname"], SONG_1_NAME);
    assert_eq!(favorites[0]["artistId"]["fullname"], ARTIST_1_NAME);

    for _ in 0..2 {
        let response = user.remove_favorite(song).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Removed from favorites");
    }
    let favorites: Value = user.favorites().await.json().await.unwrap();
    assert!(favorites.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_favorite_of_unknown_song_is_rejected() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;

    assert_eq!(
        user.add_favorite(MISSING_ID).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        user.add_favorite("nope").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_favorites_need_a_session() {
    let server = TestServer::spawn().await;
    let anonymous = TestClient::new(server.base_url.clone());

    assert_eq!(
        anonymous.favorites().await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        anonymous.add_favorite(&server.seed.song_1_id).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_deleted_song_leaves_favorites() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;

    user.add_favorite(&server.seed.song_1_id).await;
    user.add_favorite(&server.seed.song_3_id).await;
    let response = admin
        .delete(&format!("/songs/{}", server.seed.song_3_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let favorites: Value = user.favorites().await.json().await.unwrap();
    let favorites = favorites.as_array().unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0]["id"], server.seed.song_1_id.as_str());
}

#[tokio::test]
async fn test_user_admin_requires_admin() {
    let server = TestServer::spawn().await;
    let user = TestClient::authenticated(server.base_url.clone()).await;

    for path in ["/users", "/users/stats"] {
        assert_eq!(user.get(path).await.status(), StatusCode::FORBIDDEN);
    }
    let response = user
        .put_json(
            &format!("/users/{}/role", server.seed.user_id),
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_users_and_stats() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;
    let user = TestClient::authenticated(server.base_url.clone()).await;
    user.add_favorite(&server.seed.song_2_id).await;

    let users: Value = admin.get("/users").await.json().await.unwrap();
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 2);
    let test_user = users
        .iter()
        .find(|u| u["username"] == TEST_USER)
        .unwrap();
    assert_eq!(test_user["favorites"], json!([server.seed.song_2_id]));

    let stats: Value = admin.get("/users/stats").await.json().await.unwrap();
    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["adminUsers"], 1);
    assert_eq!(stats["regularUsers"], 1);
    assert_eq!(stats["recentUsers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_promote_user_to_admin() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;
    let path = format!("/users/{}/role", server.seed.user_id);

    let response = admin.put_json(&path, json!({ "role": "overlord" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = admin.put_json(&path, json!({ "role": "admin" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User role updated successfully");
    assert_eq!(body["user"]["role"], "admin");

    // the promoted user can now write the catalog
    let user = TestClient::authenticated(server.base_url.clone()).await;
    assert_eq!(
        user.create_artist("Promoted").await.status(),
        StatusCode::CREATED
    );
}

#[tokio::test]
async fn test_delete_user() {
    let server = TestServer::spawn().await;
    let admin = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = admin
        .delete(&format!("/users/{}", server.seed.admin_id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = admin
        .delete(&format!("/users/{}", server.seed.user_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User deleted successfully");

    let response = admin
        .delete(&format!("/users/{}", server.seed.user_id))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let fresh = TestClient::new(server.base_url.clone());
    assert_eq!(
        fresh.login(TEST_USER, TEST_PASS).await.status(),
        StatusCode::UNAUTHORIZED
    );
}
