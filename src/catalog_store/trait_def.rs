//! CatalogStore trait definition.

use super::models::*;
use crate::error::ServiceResult;
use crate::reference::EntityKind;
use std::collections::HashMap;

/// Entity store for the catalog.
///
/// Single-entity operations are atomic. Nothing is transactional across
/// entities: creating a song and then attaching it to an album are two writes.
/// `get_*` and `update_*` return `Ok(None)` for unknown ids, `delete_*` reports
/// whether a row was removed.
pub trait CatalogStore: Send + Sync {
    /// The artists among `ids` that exist, keyed by id.
    fn find_artists(&self, ids: &[String]) -> ServiceResult<HashMap<String, Artist>>;

    /// The songs among `ids` that exist, keyed by id.
    fn find_songs(&self, ids: &[String]) -> ServiceResult<HashMap<String, Song>>;

    // =========================================================================
    // Artists
    // =========================================================================

    fn insert_artist(&self, artist: NewArtist) -> ServiceResult<Artist>;
    fn get_artist(&self, id: &str) -> ServiceResult<Option<Artist>>;
    fn update_artist(&self, id: &str, update: ArtistUpdate) -> ServiceResult<Option<Artist>>;
    fn delete_artist(&self, id: &str) -> ServiceResult<bool>;
    fn query_artists(&self, query: &ListQuery) -> ServiceResult<QueryResult<Artist>>;

    // =========================================================================
    // Songs
    // =========================================================================

    fn insert_song(&self, song: NewSong) -> ServiceResult<Song>;
    fn get_song(&self, id: &str) -> ServiceResult<Option<Song>>;
    fn update_song(&self, id: &str, update: SongUpdate) -> ServiceResult<Option<Song>>;
    fn delete_song(&self, id: &str) -> ServiceResult<bool>;
    fn query_songs(&self, query: &ListQuery) -> ServiceResult<QueryResult<Song>>;

    // =========================================================================
    // Albums
    // =========================================================================

    fn insert_album(&self, album: NewAlbum) -> ServiceResult<Album>;
    fn get_album(&self, id: &str) -> ServiceResult<Option<Album>>;
    fn update_album(&self, id: &str, update: AlbumUpdate) -> ServiceResult<Option<Album>>;
    fn delete_album(&self, id: &str) -> ServiceResult<bool>;
    fn query_albums(&self, query: &ListQuery) -> ServiceResult<QueryResult<Album>>;

    // =========================================================================
    // Playlists
    // =========================================================================

    fn insert_playlist(&self, playlist: NewPlaylist) -> ServiceResult<Playlist>;
    fn get_playlist(&self, id: &str) -> ServiceResult<Option<Playlist>>;
    fn update_playlist(&self, id: &str, update: PlaylistUpdate)
        -> ServiceResult<Option<Playlist>>;
    fn delete_playlist(&self, id: &str) -> ServiceResult<bool>;
    fn query_playlists(&self, query: &ListQuery) -> ServiceResult<QueryResult<Playlist>>;

    // =========================================================================
    // Membership
    // =========================================================================

    /// Appends `song_id` unless it is already a member.
    fn append_member(
        &self,
        container: Container,
        container_id: &str,
        song_id: &str,
    ) -> ServiceResult<MembershipChange>;

    /// Removes every occurrence of `song_id`. `None` if the container is missing.
    fn remove_member(
        &self,
        container: Container,
        container_id: &str,
        song_id: &str,
    ) -> ServiceResult<Option<usize>>;

    fn count(&self, kind: EntityKind) -> ServiceResult<usize>;
}
