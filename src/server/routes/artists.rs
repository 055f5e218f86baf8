use super::{created, message, page_json};
use crate::catalog::{ArtistForm, ListParams};
use crate::error::ServiceError;
use crate::media::UploadCategory;
use crate::server::form::{FormPayload, QueryParams, Uploads};
use crate::server::session::AdminSession;
use crate::server::state::{GuardedCatalogManager, GuardedMediaStore, ServerState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list_artists).post(create_artist))
        .route(
            "/{id}",
            get(get_artist).put(update_artist).delete(delete_artist),
        )
}

fn artist_form(form: &FormPayload, uploads: &mut Uploads) -> Result<ArtistForm, ServiceError> {
    Ok(ArtistForm {
        avatar: uploads.store(form, "avatar", UploadCategory::Avatars)?,
        fullname: form.text("fullname"),
    })
}

async fn list_artists(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(page_json("artists", catalog.list_artists(&params)?))
}

async fn get_artist(
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.get_artist(&id)?))
}

async fn create_artist(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let artist = catalog.create_artist(artist_form(&form, &mut uploads)?)?;
    uploads.commit();
    Ok(created(artist))
}

async fn update_artist(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    Path(id): Path<String>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let artist = catalog.update_artist(&id, artist_form(&form, &mut uploads)?)?;
    uploads.commit();
    Ok(Json(artist))
}

async fn delete_artist(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.delete_artist(&id)?;
    Ok(message("Artist deleted successfully"))
}
