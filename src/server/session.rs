use super::state::ServerState;
use crate::catalog::Actor;
use crate::error::ServiceError;
use crate::user::User;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;

/// The authenticated caller. The user is re-read on every request, so a
/// changed role or a deleted account takes effect immediately.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user.id.clone(),
            is_admin: self.user.is_admin(),
        }
    }
}

/// A session whose user has the admin role.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

async fn extract_session_from_request_parts(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Result<Session, ServiceError> {
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, ctx)
            .await
            .map_err(|_| {
                debug!("No bearer token in request headers.");
                ServiceError::Unauthorized("No token provided".to_string())
            })?;

    let user = ctx.user_manager.authenticate(bearer.token())?;
    debug!("Authenticated user {} ({})", user.id, user.role);
    Ok(Session { user })
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx).await
    }
}

impl FromRequestParts<ServerState> for AdminSession {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let session = extract_session_from_request_parts(parts, ctx).await?;
        if !session.user.is_admin() {
            return Err(ServiceError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminSession(session))
    }
}
