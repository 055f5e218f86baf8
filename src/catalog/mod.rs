//! Catalog Query Service and Membership Mutators.

mod forms;
mod manager;
mod paging;

pub use forms::{parse_release_date, AlbumForm, ArtistForm, PlaylistForm, SongForm};
pub use manager::{
    Actor, CatalogManager, LATEST_ALBUMS_DEFAULT, LATEST_PLAYLISTS_DEFAULT, LATEST_SONGS_DEFAULT,
};
pub use paging::{
    ArtistListing, LimitParams, ListParams, Page, Pagination, DEFAULT_PAGE_SIZE, MAX_LATEST,
    MAX_PAGE_SIZE,
};
