use super::message;
use crate::error::ServiceError;
use crate::media::UploadCategory;
use crate::server::form::{FormPayload, JsonBody, Uploads};
use crate::server::metrics::record_login_attempt;
use crate::server::session::Session;
use crate::server::state::{GuardedMediaStore, GuardedUserManager, ServerState};
use crate::user::ProfileForm;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", put(change_password))
}

#[derive(Deserialize)]
struct RegisterBody {
    username: Option<String>,
    password: Option<String>,
    sex: Option<String>,
}

#[derive(Deserialize)]
struct LoginBody {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody {
    current_password: Option<String>,
    new_password: Option<String>,
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    JsonBody(body): JsonBody<RegisterBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = user_manager.register(
        body.username.as_deref(),
        body.password.as_deref(),
        body.sex.as_deref(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Register successful", "user": user })),
    ))
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    JsonBody(body): JsonBody<LoginBody>,
) -> Result<impl IntoResponse, ServiceError> {
    debug!("login() called for {:?}", body.username);
    let result = user_manager.login(body.username.as_deref(), body.password.as_deref());
    record_login_attempt(result.is_ok());
    let response = result?;
    info!("User {} logged in", response.user.id);
    Ok(Json(response))
}

async fn get_profile(session: Session) -> impl IntoResponse {
    Json(session.user)
}

async fn update_profile(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    State(media): State<GuardedMediaStore>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let profile = ProfileForm {
        avatar: uploads.store(&form, "avatar", UploadCategory::Avatars)?,
        username: form.text("username"),
        sex: form.text("sex"),
    };
    let user = user_manager.update_profile(session.user_id(), profile)?;
    uploads.commit();
    Ok(Json(user))
}

async fn change_password(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    JsonBody(body): JsonBody<ChangePasswordBody>,
) -> Result<impl IntoResponse, ServiceError> {
    user_manager.change_password(
        session.user_id(),
        body.current_password.as_deref(),
        body.new_password.as_deref(),
    )?;
    Ok(message("Password changed successfully"))
}
