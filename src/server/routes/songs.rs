use super::{created, listing_json, message, page_json};
use crate::catalog::{LimitParams, ListParams, SongForm};
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
        .route("/", get(list_songs).post(create_song))
        .route("/latest", get(latest_songs))
        .route("/artist/{id}", get(songs_by_artist))
        .route("/{id}", get(get_song).put(update_song).delete(delete_song))
}

fn song_form(form: &FormPayload, uploads: &mut Uploads) -> Result<SongForm, ServiceError> {
    Ok(SongForm {
        thumbnail: uploads.store(form, "thumbnail", UploadCategory::Thumbnails)?,
        file_mp3: uploads.store(form, "fileMp3", UploadCategory::Mp3)?,
        fullname: form.text("fullname"),
        artist_id: form.text("artistId"),
        album_id: form.text("albumId"),
    })
}

async fn list_songs(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(page_json("songs", catalog.list_songs(&params)?))
}

async fn latest_songs(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<LimitParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.latest_songs(params.limit)?))
}

async fn songs_by_artist(
    State(catalog): State<GuardedCatalogManager>,
    Path(artist_id): Path<String>,
    QueryParams(params): QueryParams<LimitParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(listing_json(
        "songs",
        catalog.songs_by_artist(&artist_id, params.limit)?,
    ))
}

async fn get_song(
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.get_song(&id)?))
}

async fn create_song(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let song = catalog.create_song(song_form(&form, &mut uploads)?)?;
    uploads.commit();
    Ok(created(song))
}

async fn update_song(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    Path(id): Path<String>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let song = catalog.update_song(&id, song_form(&form, &mut uploads)?)?;
    uploads.commit();
    Ok(Json(song))
}

async fn delete_song(
    _admin: AdminSession,
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.delete_song(&id)?;
    Ok(message("Song deleted successfully"))
}
