use chrono::{DateTime, Utc};
use crate::user::UserSummary;
use serde::Serialize;

pub(crate) fn datetime_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// =============================================================================
// Stored records
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub fullname: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of an artist, embedded wherever an artist is referenced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArtistSummary {
    pub id: String,
    pub fullname: String,
    pub avatar: Option<String>,
}

impl From<Artist> for ArtistSummary {
    fn from(artist: Artist) -> Self {
        ArtistSummary {
            id: artist.id,
            fullname: artist.fullname,
            avatar: artist.avatar,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub fullname: String,
    pub thumbnail: Option<String>,
    pub file_mp3: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub artist_id: String,
    /// Track order.
    pub song_ids: Vec<String>,
    pub release_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub user_id: Option<String>,
    pub song_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Resolved (populated) views
// =============================================================================
//
// Reference fields keep their wire names (`artistId`, `songIds`) but carry the
// referenced entity instead of its id. A dangling single reference becomes null,
// dangling entries of a song list are left out.

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSong {
    pub id: String,
    pub fullname: String,
    pub thumbnail: Option<String>,
    pub file_mp3: Option<String>,
    #[serde(rename = "artistId")]
    pub artist: Option<ArtistSummary>,
    pub album_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAlbum {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    #[serde(rename = "artistId")]
    pub artist: Option<ArtistSummary>,
    #[serde(rename = "songIds")]
    pub songs: Vec<ResolvedSong>,
    pub release_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlaylist {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(rename = "userId")]
    pub owner: Option<UserSummary>,
    #[serde(rename = "songIds")]
    pub songs: Vec<ResolvedSong>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Write payloads
// =============================================================================
//
// References in these structs are already normalised and well-formed; existence
// of required references is checked by the caller before they reach the store.

#[derive(Clone, Debug, Default)]
pub struct NewArtist {
    pub fullname: String,
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ArtistUpdate {
    pub fullname: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NewSong {
    pub fullname: String,
    pub thumbnail: Option<String>,
    pub file_mp3: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SongUpdate {
    pub fullname: Option<String>,
    pub thumbnail: Option<String>,
    pub file_mp3: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NewAlbum {
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub artist_id: String,
    pub song_ids: Vec<String>,
    pub release_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct AlbumUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub artist_id: Option<String>,
    /// `Some` replaces the whole track list, `None` leaves it untouched.
    pub song_ids: Option<Vec<String>>,
    pub release_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct NewPlaylist {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub user_id: Option<String>,
    pub song_ids: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PlaylistUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub song_ids: Option<Vec<String>>,
}

// =============================================================================
// Queries
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Sortable fields. Not every field applies to every entity type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Fullname,
    ReleaseDate,
}

impl SortField {
    pub fn parse(s: &str) -> Option<SortField> {
        match s {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "fullname" => Some(SortField::Fullname),
            "releaseDate" => Some(SortField::ReleaseDate),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub search: Option<String>,
}

/// Window over a sorted result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub sort: Sort,
    pub window: Window,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    /// Number of entities matching the filter, regardless of the window.
    pub total: usize,
}

/// Outcome of a strict membership append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipChange {
    Added,
    AlreadyPresent,
    ContainerMissing,
}

/// Entities holding an ordered song list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Album,
    Playlist,
}

impl Container {
    pub fn kind(&self) -> crate::reference::EntityKind {
        match self {
            Container::Album => crate::reference::EntityKind::Album,
            Container::Playlist => crate::reference::EntityKind::Playlist,
        }
    }
}
