//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with a bearer token and methods for the `/api` endpoints.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with token based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Bearer token sent with every request once logged in
    pub token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client logged in as the given user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn logged_in(base_url: String, username: &str, password: &str) -> Self {
        let mut client = Self::new(base_url);
        let response = client.login(username, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Authentication of {} failed",
            username
        );
        let body: Value = response.json().await.expect("Login body is not JSON");
        client.token = body["token"].as_str().map(str::to_string);
        assert!(client.token.is_some(), "Login response carries no token");
        client
    }

    /// Creates a client pre-authenticated as the regular test user
    pub async fn authenticated(base_url: String) -> Self {
        Self::logged_in(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client pre-authenticated as the admin test user
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::logged_in(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send(&self, builder: RequestBuilder) -> Response {
        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        builder.send().await.expect("Request failed")
    }

    // ========================================================================
    // Generic requests
    // ========================================================================

    pub async fn get(&self, path: &str) -> Response {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.send(self.client.delete(self.url(path))).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Response {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> Response {
        self.send(self.client.put(self.url(path)).json(&body)).await
    }

    pub async fn post_form(&self, path: &str, form: Form) -> Response {
        self.send(self.client.post(self.url(path)).multipart(form))
            .await
    }

    pub async fn put_form(&self, path: &str, form: Form) -> Response {
        self.send(self.client.put(self.url(path)).multipart(form))
            .await
    }

    /// POST without a body, for membership and favorites endpoints
    pub async fn post_empty(&self, path: &str) -> Response {
        self.send(self.client.post(self.url(path))).await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /api/auth/register
    pub async fn register(&self, username: &str, password: &str) -> Response {
        self.post_json(
            "/auth/register",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// POST /api/auth/login
    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.post_json(
            "/auth/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    // ========================================================================
    // Catalog Endpoints
    // ========================================================================

    /// POST /api/artists
    pub async fn create_artist(&self, fullname: &str) -> Response {
        self.post_json("/artists", json!({ "fullname": fullname }))
            .await
    }

    /// POST /api/songs
    pub async fn create_song(&self, fullname: &str, artist_id: &str) -> Response {
        self.post_json(
            "/songs",
            json!({ "fullname": fullname, "artistId": artist_id }),
        )
        .await
    }

    /// POST /api/playlists
    pub async fn create_playlist(&self, title: &str, song_ids: &[&str]) -> Response {
        self.post_json(
            "/playlists",
            json!({ "title": title, "songIds": song_ids }),
        )
        .await
    }

    /// POST /api/users/favorites/{song_id}
    pub async fn add_favorite(&self, song_id: &str) -> Response {
        self.post_empty(&format!("/users/favorites/{}", song_id))
            .await
    }

    /// DELETE /api/users/favorites/{song_id}
    pub async fn remove_favorite(&self, song_id: &str) -> Response {
        self.delete(&format!("/users/favorites/{}", song_id)).await
    }

    /// GET /api/users/favorites
    pub async fn favorites(&self) -> Response {
        self.get("/users/favorites").await
    }
}

/// A multipart file part
pub fn file_part(bytes: &'static [u8], file_name: &str, mime: &str) -> Part {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .expect("Invalid mime type")
}

/// Id field of a JSON entity
pub fn id_of(body: &Value) -> String {
    body["id"]
        .as_str()
        .unwrap_or_else(|| panic!("No id in {}", body))
        .to_string()
}
