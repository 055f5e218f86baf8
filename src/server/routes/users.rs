use super::message;
use crate::error::ServiceError;
use crate::server::form::JsonBody;
use crate::server::session::{AdminSession, Session};
use crate::server::state::{GuardedUserManager, ServerState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list_users))
        .route("/stats", get(user_stats))
        .route("/favorites", get(list_favorites))
        .route(
            "/favorites/{song_id}",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/{id}/role", put(update_role))
        .route("/{id}", delete(delete_user))
}

#[derive(Deserialize)]
struct RoleBody {
    role: Option<String>,
}

async fn list_favorites(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(user_manager.list_favorites(session.user_id())?))
}

async fn add_favorite(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(song_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    user_manager.add_favorite(session.user_id(), &song_id)?;
    Ok(message("Added to favorites"))
}

async fn remove_favorite(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(song_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    user_manager.remove_favorite(session.user_id(), &song_id)?;
    Ok(message("Removed from favorites"))
}

async fn list_users(
    _admin: AdminSession,
    State(user_manager): State<GuardedUserManager>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(user_manager.list_users()?))
}

async fn user_stats(
    _admin: AdminSession,
    State(user_manager): State<GuardedUserManager>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(user_manager.stats()?))
}

async fn update_role(
    _admin: AdminSession,
    State(user_manager): State<GuardedUserManager>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<RoleBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = user_manager.set_role(&id, body.role.as_deref())?;
    Ok(Json(json!({
        "message": "User role updated successfully",
        "user": user,
    })))
}

async fn delete_user(
    AdminSession(session): AdminSession,
    State(user_manager): State<GuardedUserManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    user_manager.delete_user(session.user_id(), &id)?;
    Ok(message("User deleted successfully"))
}
