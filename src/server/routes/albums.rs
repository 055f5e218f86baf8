use super::{created, listing_json, message, page_json};
use crate::catalog::{AlbumForm, LimitParams, ListParams};
use crate::catalog_store::Container;
use crate::error::ServiceError;
use crate::media::UploadCategory;
use crate::server::form::{FormPayload, QueryParams, Uploads};
use crate::server::session::AdminSession;
use crate::server::state::{GuardedCatalogManager, GuardedMediaStore, ServerState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list_albums).post(create_album))
        .route("/latest", get(latest_albums))
        .route("/artist/{artist_id}", get(albums_by_artist))
        .route(
            "/{id}",
            get(get_album).put(update_album).delete(delete_album),
        )
        .route(
            "/{album_id}/songs/{song_id}",
            post(add_album_song).delete(remove_album_song),
        )
}

fn album_form(form: &FormPayload, uploads: &mut Uploads) -> Result<AlbumForm, ServiceError> {
    Ok(AlbumForm {
        thumbnail: uploads.store(form, "thumbnail", UploadCategory::Albums)?,
        title: form.text("title"),
        description: form.text("description"),
        artist_id: form.text("artistId"),
        song_ids: form.id_list("songIds"),
        release_date: form.text("releaseDate"),
    })
}

async fn list_albums(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(page_json("albums", catalog.list_albums(&params)?))
}

async fn latest_albums(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<LimitParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.latest_albums(params.limit)?))
}

async fn albums_by_artist(
    State(catalog): State<GuardedCatalogManager>,
    Path(artist_id): Path<String>,
    QueryParams(params): QueryParams<LimitParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(listing_json(
        "albums",
        catalog.albums_by_artist(&artist_id, params.limit)?,
    ))
}

async fn get_album(
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.get_album(&id)?))
}

async fn create_album(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let album = catalog.create_album(album_form(&form, &mut uploads)?)?;
    uploads.commit();
    Ok(created(album))
}

async fn update_album(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    Path(id): Path<String>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let album = catalog.update_album(&id, album_form(&form, &mut uploads)?)?;
    uploads.commit();
    Ok(Json(album))
}

async fn delete_album(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.delete_album(&id)?;
    Ok(message("Album deleted successfully"))
}

async fn add_album_song(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    Path((album_id, song_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.add_song(Container::Album, &album_id, &song_id)?;
    Ok(Json(catalog.get_album(&album_id)?))
}

async fn remove_album_song(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    Path((album_id, song_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.remove_song(Container::Album, &album_id, &song_id)?;
    Ok(Json(catalog.get_album(&album_id)?))
}
