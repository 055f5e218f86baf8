use super::forms::*;
use super::paging::*;
use crate::catalog_store::{
    AlbumUpdate, Artist, ArtistSummary, ArtistUpdate, CatalogStore, Container, ListFilter,
    ListQuery, MembershipChange, NewAlbum, NewArtist, NewPlaylist, NewSong, Playlist,
    PlaylistUpdate, ResolvedAlbum, ResolvedPlaylist, ResolvedSong, Sort, SortField, SortOrder,
    SongUpdate, Window,
};
use crate::error::{ServiceError, ServiceResult};
use crate::reference::{
    is_well_formed_id, normalize_id_list, parse_id, populate_all, populate_one, EntityKind,
    StoreLookup,
};
use crate::user::UserStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LATEST_ALBUMS_DEFAULT: usize = 6;
pub const LATEST_SONGS_DEFAULT: usize = 4;
pub const LATEST_PLAYLISTS_DEFAULT: usize = 4;

/// Who is acting on an owned resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

/// Catalog reads with populated references, and validated catalog writes.
pub struct CatalogManager {
    store: Arc<dyn CatalogStore>,
    users: Arc<dyn UserStore>,
}

fn latest_query(limit: usize, sort: Sort) -> ListQuery {
    ListQuery {
        filter: ListFilter::default(),
        sort,
        window: Window { offset: 0, limit },
    }
}

/// Path ids that cannot be identifiers cannot name an entity either.
fn path_id(kind: EntityKind, raw: &str) -> ServiceResult<String> {
    let candidate = raw.trim();
    if is_well_formed_id(candidate) {
        Ok(candidate.to_ascii_lowercase())
    } else {
        Err(ServiceError::not_found(kind, raw))
    }
}

impl CatalogManager {
    pub fn new(store: Arc<dyn CatalogStore>, users: Arc<dyn UserStore>) -> Self {
        CatalogManager { store, users }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    fn lookup(&self) -> StoreLookup<'_> {
        StoreLookup::new(self.store.as_ref(), self.users.as_ref())
    }

    /// A required single reference: well-formed and existing.
    fn require_reference(
        &self,
        kind: EntityKind,
        field: &'static str,
        raw: &str,
    ) -> ServiceResult<String> {
        let id = parse_id(field, raw)?;
        let exists = match kind {
            EntityKind::Artist => self.store.get_artist(&id)?.is_some(),
            EntityKind::Album => self.store.get_album(&id)?.is_some(),
            EntityKind::Song => self.store.get_song(&id)?.is_some(),
            EntityKind::Playlist => self.store.get_playlist(&id)?.is_some(),
            EntityKind::User => false,
        };
        if !exists {
            return Err(ServiceError::reference_not_found(kind, id));
        }
        Ok(id)
    }

    fn existing_artist(&self, raw_id: &str) -> ServiceResult<Artist> {
        let id = path_id(EntityKind::Artist, raw_id)?;
        self.store
            .get_artist(&id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Artist, id))
    }

    fn existing_playlist(&self, raw_id: &str) -> ServiceResult<Playlist> {
        let id = path_id(EntityKind::Playlist, raw_id)?;
        self.store
            .get_playlist(&id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Playlist, id))
    }

    // =========================================================================
    // Artists
    // =========================================================================

    pub fn list_artists(&self, params: &ListParams) -> ServiceResult<Page<Artist>> {
        let (page, limit, query) = params.to_query()?;
        let result = self.store.query_artists(&query)?;
        Ok(Page {
            pagination: Pagination::new(page, limit, result.items.len(), result.total),
            items: result.items,
        })
    }

    pub fn get_artist(&self, id: &str) -> ServiceResult<Artist> {
        self.existing_artist(id)
    }

    pub fn create_artist(&self, form: ArtistForm) -> ServiceResult<Artist> {
        let artist = self.store.insert_artist(NewArtist {
            fullname: trimmed(form.fullname).unwrap_or_default(),
            avatar: form.avatar,
        })?;
        info!("Created artist {} ({})", artist.id, artist.fullname);
        Ok(artist)
    }

    pub fn update_artist(&self, id: &str, form: ArtistForm) -> ServiceResult<Artist> {
        let id = path_id(EntityKind::Artist, id)?;
        self.store
            .update_artist(
                &id,
                ArtistUpdate {
                    fullname: trimmed(form.fullname),
                    avatar: form.avatar,
                },
            )?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Artist, id))
    }

    /// Songs and albums of the artist keep their now dangling reference.
    pub fn delete_artist(&self, id: &str) -> ServiceResult<()> {
        let id = path_id(EntityKind::Artist, id)?;
        if !self.store.delete_artist(&id)? {
            return Err(ServiceError::not_found(EntityKind::Artist, id));
        }
        info!("Deleted artist {}", id);
        Ok(())
    }

    // =========================================================================
    // Songs
    // =========================================================================

    pub fn list_songs(&self, params: &ListParams) -> ServiceResult<Page<ResolvedSong>> {
        let (page, limit, query) = params.to_query()?;
        let result = self.store.query_songs(&query)?;
        let items = populate_all(&self.lookup(), result.items)?;
        Ok(Page {
            pagination: Pagination::new(page, limit, items.len(), result.total),
            items,
        })
    }

    pub fn latest_songs(&self, limit: Option<usize>) -> ServiceResult<Vec<ResolvedSong>> {
        let query = latest_query(latest_limit(limit, LATEST_SONGS_DEFAULT), Sort::default());
        let songs = self.store.query_songs(&query)?.items;
        populate_all(&self.lookup(), songs)
    }

    pub fn songs_by_artist(
        &self,
        artist_id: &str,
        limit: Option<usize>,
    ) -> ServiceResult<ArtistListing<ResolvedSong>> {
        let artist = self.existing_artist(artist_id)?;
        let mut query = latest_query(by_artist_limit(limit), Sort::default());
        query.filter.artist_id = Some(artist.id.clone());
        let songs = self.store.query_songs(&query)?.items;
        Ok(ArtistListing {
            artist: ArtistSummary::from(artist),
            items: populate_all(&self.lookup(), songs)?,
        })
    }

    pub fn get_song(&self, id: &str) -> ServiceResult<ResolvedSong> {
        let id = path_id(EntityKind::Song, id)?;
        let song = self
            .store
            .get_song(&id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Song, id))?;
        populate_one(&self.lookup(), song)
    }

    pub fn create_song(&self, form: SongForm) -> ServiceResult<ResolvedSong> {
        let artist_id = provided(form.artist_id)
            .map(|raw| self.require_reference(EntityKind::Artist, "artistId", &raw))
            .transpose()?;
        let album_id = provided(form.album_id)
            .map(|raw| self.require_reference(EntityKind::Album, "albumId", &raw))
            .transpose()?;
        let song = self.store.insert_song(NewSong {
            fullname: trimmed(form.fullname).unwrap_or_default(),
            thumbnail: form.thumbnail,
            file_mp3: form.file_mp3,
            artist_id,
            album_id,
        })?;
        info!("Created song {} ({})", song.id, song.fullname);
        populate_one(&self.lookup(), song)
    }

    pub fn update_song(&self, id: &str, form: SongForm) -> ServiceResult<ResolvedSong> {
        let id = path_id(EntityKind::Song, id)?;
        if self.store.get_song(&id)?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Song, id));
        }
        let update = SongUpdate {
            fullname: trimmed(form.fullname),
            thumbnail: form.thumbnail,
            file_mp3: form.file_mp3,
            artist_id: provided(form.artist_id)
                .map(|raw| self.require_reference(EntityKind::Artist, "artistId", &raw))
                .transpose()?,
            album_id: provided(form.album_id)
                .map(|raw| self.require_reference(EntityKind::Album, "albumId", &raw))
                .transpose()?,
        };
        let song = self
            .store
            .update_song(&id, update)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Song, id))?;
        populate_one(&self.lookup(), song)
    }

    /// Albums, playlists and favorites keep the id; readers drop it.
    pub fn delete_song(&self, id: &str) -> ServiceResult<()> {
        let id = path_id(EntityKind::Song, id)?;
        if !self.store.delete_song(&id)? {
            return Err(ServiceError::not_found(EntityKind::Song, id));
        }
        info!("Deleted song {}", id);
        Ok(())
    }

    // =========================================================================
    // Albums
    // =========================================================================

    pub fn list_albums(&self, params: &ListParams) -> ServiceResult<Page<ResolvedAlbum>> {
        let (page, limit, query) = params.to_query()?;
        let result = self.store.query_albums(&query)?;
        let items = populate_all(&self.lookup(), result.items)?;
        Ok(Page {
            pagination: Pagination::new(page, limit, items.len(), result.total),
            items,
        })
    }

    pub fn latest_albums(&self, limit: Option<usize>) -> ServiceResult<Vec<ResolvedAlbum>> {
        let query = latest_query(latest_limit(limit, LATEST_ALBUMS_DEFAULT), Sort::default());
        let albums = self.store.query_albums(&query)?.items;
        populate_all(&self.lookup(), albums)
    }

    pub fn albums_by_artist(
        &self,
        artist_id: &str,
        limit: Option<usize>,
    ) -> ServiceResult<ArtistListing<ResolvedAlbum>> {
        let artist = self.existing_artist(artist_id)?;
        let mut query = latest_query(
            by_artist_limit(limit),
            Sort {
                field: SortField::ReleaseDate,
                order: SortOrder::Desc,
            },
        );
        query.filter.artist_id = Some(artist.id.clone());
        let albums = self.store.query_albums(&query)?.items;
        Ok(ArtistListing {
            artist: ArtistSummary::from(artist),
            items: populate_all(&self.lookup(), albums)?,
        })
    }

    pub fn get_album(&self, id: &str) -> ServiceResult<ResolvedAlbum> {
        let id = path_id(EntityKind::Album, id)?;
        let album = self
            .store
            .get_album(&id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Album, id))?;
        populate_one(&self.lookup(), album)
    }

    pub fn create_album(&self, form: AlbumForm) -> ServiceResult<ResolvedAlbum> {
        let title = trimmed(form.title).unwrap_or_default();
        if title.is_empty() {
            return Err(ServiceError::EmptyField { field: "title" });
        }
        let artist_id = provided(form.artist_id)
            .ok_or(ServiceError::EmptyField { field: "artistId" })?;
        let artist_id = self.require_reference(EntityKind::Artist, "artistId", &artist_id)?;
        let release_date = provided(form.release_date)
            .map(|raw| parse_release_date(&raw))
            .transpose()?;
        let song_ids = normalize_id_list(form.song_ids);
        debug!("Creating album '{}' with {} songs", title, song_ids.len());

        let album = self.store.insert_album(NewAlbum {
            title,
            description: trimmed(form.description).unwrap_or_default(),
            thumbnail: form.thumbnail,
            artist_id,
            song_ids,
            release_date,
        })?;
        info!("Created album {} ({})", album.id, album.title);
        populate_one(&self.lookup(), album)
    }

    /// Partial update. A present `songIds`, even an empty one, replaces the
    /// whole track list.
    pub fn update_album(&self, id: &str, form: AlbumForm) -> ServiceResult<ResolvedAlbum> {
        let id = path_id(EntityKind::Album, id)?;
        if self.store.get_album(&id)?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Album, id));
        }
        let update = AlbumUpdate {
            title: trimmed(form.title),
            description: trimmed(form.description),
            thumbnail: form.thumbnail,
            artist_id: provided(form.artist_id)
                .map(|raw| self.require_reference(EntityKind::Artist, "artistId", &raw))
                .transpose()?,
            song_ids: form.song_ids.map(|raw| normalize_id_list(Some(raw))),
            release_date: provided(form.release_date)
                .map(|raw| parse_release_date(&raw))
                .transpose()?,
        };
        let album = self
            .store
            .update_album(&id, update)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Album, id))?;
        populate_one(&self.lookup(), album)
    }

    pub fn delete_album(&self, id: &str) -> ServiceResult<()> {
        let id = path_id(EntityKind::Album, id)?;
        if !self.store.delete_album(&id)? {
            return Err(ServiceError::not_found(EntityKind::Album, id));
        }
        info!("Deleted album {}", id);
        Ok(())
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    pub fn list_playlists(&self, params: &ListParams) -> ServiceResult<Page<ResolvedPlaylist>> {
        let (page, limit, query) = params.to_query()?;
        let result = self.store.query_playlists(&query)?;
        let items = populate_all(&self.lookup(), result.items)?;
        Ok(Page {
            pagination: Pagination::new(page, limit, items.len(), result.total),
            items,
        })
    }

    pub fn latest_playlists(&self, limit: Option<usize>) -> ServiceResult<Vec<ResolvedPlaylist>> {
        let query = latest_query(
            latest_limit(limit, LATEST_PLAYLISTS_DEFAULT),
            Sort::default(),
        );
        let playlists = self.store.query_playlists(&query)?.items;
        populate_all(&self.lookup(), playlists)
    }

    pub fn get_playlist(&self, id: &str) -> ServiceResult<ResolvedPlaylist> {
        let playlist = self.existing_playlist(id)?;
        populate_one(&self.lookup(), playlist)
    }

    /// Fails unless `actor` owns the playlist or is an admin.
    pub fn authorize_playlist(&self, id: &str, actor: &Actor) -> ServiceResult<Playlist> {
        let playlist = self.existing_playlist(id)?;
        if actor.is_admin || playlist.user_id.as_deref() == Some(actor.user_id.as_str()) {
            Ok(playlist)
        } else {
            Err(ServiceError::Forbidden(
                "You can only modify your own playlists".to_string(),
            ))
        }
    }

    pub fn create_playlist(&self, form: PlaylistForm, owner: &str) -> ServiceResult<ResolvedPlaylist> {
        let title = trimmed(form.title).unwrap_or_default();
        if title.is_empty() {
            return Err(ServiceError::EmptyField { field: "title" });
        }
        let raw_song_ids = match form.song_ids {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                return Err(ServiceError::Validation(
                    "At least one song is required".to_string(),
                ))
            }
        };
        let submitted = raw_song_ids.clone().into_candidates().len();
        let song_ids = raw_song_ids.into_well_formed();
        if song_ids.is_empty() {
            return Err(ServiceError::Validation(
                "No valid song IDs provided".to_string(),
            ));
        }
        if song_ids.len() != submitted {
            warn!(
                "Dropped {} malformed song ids from new playlist '{}'",
                submitted - song_ids.len(),
                title
            );
        }

        let playlist = self.store.insert_playlist(NewPlaylist {
            title,
            description: trimmed(form.description),
            thumbnail: form.thumbnail,
            user_id: Some(owner.to_string()),
            song_ids,
        })?;
        info!("Created playlist {} for user {}", playlist.id, owner);
        populate_one(&self.lookup(), playlist)
    }

    pub fn update_playlist(
        &self,
        id: &str,
        form: PlaylistForm,
        actor: &Actor,
    ) -> ServiceResult<ResolvedPlaylist> {
        let playlist = self.authorize_playlist(id, actor)?;
        let update = PlaylistUpdate {
            title: trimmed(form.title),
            description: trimmed(form.description),
            thumbnail: form.thumbnail,
            song_ids: form.song_ids.map(|raw| normalize_id_list(Some(raw))),
        };
        let playlist = self
            .store
            .update_playlist(&playlist.id, update)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Playlist, playlist.id))?;
        populate_one(&self.lookup(), playlist)
    }

    pub fn delete_playlist(&self, id: &str, actor: &Actor) -> ServiceResult<()> {
        let playlist = self.authorize_playlist(id, actor)?;
        if !self.store.delete_playlist(&playlist.id)? {
            return Err(ServiceError::not_found(EntityKind::Playlist, playlist.id));
        }
        info!("Deleted playlist {}", playlist.id);
        Ok(())
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Strict append: a song already in the container is a conflict.
    pub fn add_song(
        &self,
        container: Container,
        container_id: &str,
        song_id: &str,
    ) -> ServiceResult<()> {
        let kind = container.kind();
        let container_id = path_id(kind, container_id)?;
        let exists = match container {
            Container::Album => self.store.get_album(&container_id)?.is_some(),
            Container::Playlist => self.store.get_playlist(&container_id)?.is_some(),
        };
        if !exists {
            return Err(ServiceError::not_found(kind, container_id));
        }
        let song_id = path_id(EntityKind::Song, song_id)?;
        if self.store.get_song(&song_id)?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Song, song_id));
        }

        match self.store.append_member(container, &container_id, &song_id)? {
            MembershipChange::Added => {
                debug!("Added song {} to {} {}", song_id, kind, container_id);
                Ok(())
            }
            MembershipChange::AlreadyPresent => {
                Err(ServiceError::Conflict(format!("Song already in {}", kind)))
            }
            MembershipChange::ContainerMissing => Err(ServiceError::not_found(kind, container_id)),
        }
    }

    /// Removes every occurrence. A song that is not there is not an error.
    pub fn remove_song(
        &self,
        container: Container,
        container_id: &str,
        song_id: &str,
    ) -> ServiceResult<()> {
        let kind = container.kind();
        let container_id = path_id(kind, container_id)?;
        let song_id = song_id.trim().to_ascii_lowercase();
        match self.store.remove_member(container, &container_id, &song_id)? {
            Some(removed) => {
                debug!(
                    "Removed {} occurrences of song {} from {} {}",
                    removed, song_id, kind, container_id
                );
                Ok(())
            }
            None => Err(ServiceError::not_found(kind, container_id)),
        }
    }

    pub fn counts(&self) -> ServiceResult<Vec<(EntityKind, usize)>> {
        [
            EntityKind::Artist,
            EntityKind::Song,
            EntityKind::Album,
            EntityKind::Playlist,
        ]
        .into_iter()
        .map(|kind| Ok((kind, self.store.count(kind)?)))
        .collect()
    }
}
