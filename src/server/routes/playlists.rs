use super::{created, message, page_json};
use crate::catalog::{LimitParams, ListParams, PlaylistForm};
use crate::catalog_store::Container;
use crate::error::ServiceError;
use crate::media::UploadCategory;
use crate::server::form::{FormPayload, QueryParams, Uploads};
use crate::server::session::Session;
use crate::server::state::{GuardedCatalogManager, GuardedMediaStore, ServerState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list_playlists).post(create_playlist))
        .route("/latest", get(latest_playlists))
        .route(
            "/{id}",
            get(get_playlist).put(update_playlist).delete(delete_playlist),
        )
        .route(
            "/{playlist_id}/songs/{song_id}",
            post(add_playlist_song).delete(remove_playlist_song),
        )
}

fn playlist_form(form: &FormPayload, uploads: &mut Uploads) -> Result<PlaylistForm, ServiceError> {
    Ok(PlaylistForm {
        thumbnail: uploads.store(form, "thumbnail", UploadCategory::Playlists)?,
        title: form.text("title"),
        description: form.text("description"),
        song_ids: form.id_list("songIds"),
    })
}

async fn list_playlists(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(page_json("playlists", catalog.list_playlists(&params)?))
}

async fn latest_playlists(
    State(catalog): State<GuardedCatalogManager>,
    QueryParams(params): QueryParams<LimitParams>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.latest_playlists(params.limit)?))
}

async fn get_playlist(
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(catalog.get_playlist(&id)?))
}

async fn create_playlist(
    session: Session,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let mut uploads = Uploads::new(media.as_ref());
    let form = playlist_form(&form, &mut uploads)?;
    let playlist = catalog.create_playlist(form, session.user_id())?;
    uploads.commit();
    Ok(created(playlist))
}

async fn update_playlist(
    session: Session,
    State(catalog): State<GuardedCatalogManager>,
    State(media): State<GuardedMediaStore>,
    Path(id): Path<String>,
    form: FormPayload,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = session.actor();
    // ownership is checked before anything gets uploaded
    catalog.authorize_playlist(&id, &actor)?;
    let mut uploads = Uploads::new(media.as_ref());
    let form = playlist_form(&form, &mut uploads)?;
    let playlist = catalog.update_playlist(&id, form, &actor)?;
    uploads.commit();
    Ok(Json(playlist))
}

async fn delete_playlist(
    session: Session,
    State(catalog): State<GuardedCatalogManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.delete_playlist(&id, &session.actor())?;
    Ok(message("Playlist deleted successfully"))
}

async fn add_playlist_song(
    session: Session,
    State(catalog): State<GuardedCatalogManager>,
    Path((playlist_id, song_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.authorize_playlist(&playlist_id, &session.actor())?;
    catalog.add_song(Container::Playlist, &playlist_id, &song_id)?;
    Ok(Json(catalog.get_playlist(&playlist_id)?))
}

async fn remove_playlist_song(
    session: Session,
    State(catalog): State<GuardedCatalogManager>,
    Path((playlist_id, song_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    catalog.authorize_playlist(&playlist_id, &session.actor())?;
    catalog.remove_song(Container::Playlist, &playlist_id, &song_id)?;
    Ok(Json(catalog.get_playlist(&playlist_id)?))
}
