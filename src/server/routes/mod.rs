//! REST endpoints, one module per resource, mounted under `/api`.

mod albums;
mod artists;
mod auth;
mod playlists;
mod songs;
mod users;

use super::state::ServerState;
use crate::catalog::{ArtistListing, Page};
use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

pub fn make_api_routes() -> Router<ServerState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/artists", artists::routes())
        .nest("/songs", songs::routes())
        .nest("/albums", albums::routes())
        .nest("/playlists", playlists::routes())
        .nest("/users", users::routes())
}

fn message(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "message": text.into() }))
}

fn created<T: Serialize>(entity: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(entity))
}

/// `{"<key>": [...], "pagination": {...}}`
fn page_json<T: Serialize>(key: &str, page: Page<T>) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), json!(page.items));
    body.insert("pagination".to_string(), json!(page.pagination));
    Json(Value::Object(body))
}

/// `{"artist": {...}, "<key>": [...], "count": n}`
fn listing_json<T: Serialize>(key: &str, listing: ArtistListing<T>) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert("artist".to_string(), json!(listing.artist));
    body.insert("count".to_string(), json!(listing.items.len()));
    body.insert(key.to_string(), json!(listing.items));
    Json(Value::Object(body))
}
