//! Read-time population of references.
//!
//! Every populatable entity declares its direct references through [`Populate`].
//! Resolution happens in batches: the direct song references of all entities are
//! fetched first, then the artist references of both the entities and those
//! songs, and the playlist owners. Songs reached through a list are populated
//! one level deep, so their `artistId` is expanded but nothing below it.

use crate::catalog_store::{
    Album, Artist, ArtistSummary, CatalogStore, Playlist, ResolvedAlbum, ResolvedPlaylist,
    ResolvedSong, Song,
};
use crate::error::{ServiceError, ServiceResult};
use crate::user::{UserStore, UserSummary};
use std::collections::{BTreeSet, HashMap};

/// Batch lookups the populate engine reads through. Missing ids are simply
/// absent from the returned maps.
pub trait ReferenceLookup: Send + Sync {
    fn find_artists(&self, ids: &[String]) -> ServiceResult<HashMap<String, Artist>>;
    fn find_songs(&self, ids: &[String]) -> ServiceResult<HashMap<String, Song>>;
    fn find_users(&self, ids: &[String]) -> ServiceResult<HashMap<String, UserSummary>>;
}

/// Catalog references come from the catalog store, owners from the user store.
pub struct StoreLookup<'a> {
    catalog: &'a dyn CatalogStore,
    users: &'a dyn UserStore,
}

impl<'a> StoreLookup<'a> {
    pub fn new(catalog: &'a dyn CatalogStore, users: &'a dyn UserStore) -> Self {
        StoreLookup { catalog, users }
    }
}

impl ReferenceLookup for StoreLookup<'_> {
    fn find_artists(&self, ids: &[String]) -> ServiceResult<HashMap<String, Artist>> {
        self.catalog.find_artists(ids)
    }

    fn find_songs(&self, ids: &[String]) -> ServiceResult<HashMap<String, Song>> {
        self.catalog.find_songs(ids)
    }

    fn find_users(&self, ids: &[String]) -> ServiceResult<HashMap<String, UserSummary>> {
        Ok(self
            .users
            .get_users(ids)?
            .into_iter()
            .map(|user| (user.id.clone(), UserSummary::from(user)))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct ReferenceSet {
    artists: BTreeSet<String>,
    songs: BTreeSet<String>,
    users: BTreeSet<String>,
}

impl ReferenceSet {
    pub fn artist(&mut self, id: &str) {
        self.artists.insert(id.to_string());
    }

    pub fn user(&mut self, id: &str) {
        self.users.insert(id.to_string());
    }

    pub fn songs<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) {
        self.songs.extend(ids.into_iter().cloned());
    }

    fn artist_ids(&self) -> Vec<String> {
        self.artists.iter().cloned().collect()
    }

    fn song_ids(&self) -> Vec<String> {
        self.songs.iter().cloned().collect()
    }

    fn user_ids(&self) -> Vec<String> {
        self.users.iter().cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct Resolved {
    artists: HashMap<String, ArtistSummary>,
    songs: HashMap<String, ResolvedSong>,
    users: HashMap<String, UserSummary>,
}

impl Resolved {
    pub fn artist(&self, id: Option<&str>) -> Option<ArtistSummary> {
        id.and_then(|id| self.artists.get(id)).cloned()
    }

    pub fn user(&self, id: Option<&str>) -> Option<UserSummary> {
        id.and_then(|id| self.users.get(id)).cloned()
    }

    /// Resolved songs in the given order, dangling ids left out.
    pub fn songs(&self, ids: &[String]) -> Vec<ResolvedSong> {
        ids.iter()
            .filter_map(|id| self.songs.get(id))
            .cloned()
            .collect()
    }
}

pub trait Populate: Sized {
    type Output;

    fn references(&self, refs: &mut ReferenceSet);

    fn populate(self, resolved: &Resolved) -> Self::Output;
}

impl Populate for Song {
    type Output = ResolvedSong;

    fn references(&self, refs: &mut ReferenceSet) {
        if let Some(artist_id) = &self.artist_id {
            refs.artist(artist_id);
        }
    }

    fn populate(self, resolved: &Resolved) -> ResolvedSong {
        ResolvedSong {
            artist: resolved.artist(self.artist_id.as_deref()),
            id: self.id,
            fullname: self.fullname,
            thumbnail: self.thumbnail,
            file_mp3: self.file_mp3,
            album_id: self.album_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Populate for Album {
    type Output = ResolvedAlbum;

    fn references(&self, refs: &mut ReferenceSet) {
        refs.artist(&self.artist_id);
        refs.songs(&self.song_ids);
    }

    fn populate(self, resolved: &Resolved) -> ResolvedAlbum {
        ResolvedAlbum {
            artist: resolved.artist(Some(&self.artist_id)),
            songs: resolved.songs(&self.song_ids),
            id: self.id,
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail,
            release_date: self.release_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Populate for Playlist {
    type Output = ResolvedPlaylist;

    fn references(&self, refs: &mut ReferenceSet) {
        if let Some(user_id) = &self.user_id {
            refs.user(user_id);
        }
        refs.songs(&self.song_ids);
    }

    fn populate(self, resolved: &Resolved) -> ResolvedPlaylist {
        ResolvedPlaylist {
            owner: resolved.user(self.user_id.as_deref()),
            songs: resolved.songs(&self.song_ids),
            id: self.id,
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A bare ordered list of song references, such as a user's favorites.
#[derive(Debug, Clone, Default)]
pub struct SongRefs(pub Vec<String>);

impl Populate for SongRefs {
    type Output = Vec<ResolvedSong>;

    fn references(&self, refs: &mut ReferenceSet) {
        refs.songs(&self.0);
    }

    fn populate(self, resolved: &Resolved) -> Vec<ResolvedSong> {
        resolved.songs(&self.0)
    }
}

pub fn populate_all<T: Populate>(
    lookup: &dyn ReferenceLookup,
    items: Vec<T>,
) -> ServiceResult<Vec<T::Output>> {
    if items.is_empty() {
        return Ok(vec![]);
    }

    let mut refs = ReferenceSet::default();
    for item in &items {
        item.references(&mut refs);
    }

    let song_ids = refs.song_ids();
    let songs = if song_ids.is_empty() {
        HashMap::new()
    } else {
        lookup.find_songs(&song_ids)?
    };
    for song in songs.values() {
        song.references(&mut refs);
    }

    let artist_ids = refs.artist_ids();
    let artists = if artist_ids.is_empty() {
        HashMap::new()
    } else {
        lookup.find_artists(&artist_ids)?
    };

    let user_ids = refs.user_ids();
    let users = if user_ids.is_empty() {
        HashMap::new()
    } else {
        lookup.find_users(&user_ids)?
    };

    let mut resolved = Resolved {
        artists: artists
            .into_iter()
            .map(|(id, artist)| (id, ArtistSummary::from(artist)))
            .collect(),
        songs: HashMap::new(),
        users,
    };
    let resolved_songs = songs
        .into_iter()
        .map(|(id, song)| (id, song.populate(&resolved)))
        .collect();
    resolved.songs = resolved_songs;

    Ok(items
        .into_iter()
        .map(|item| item.populate(&resolved))
        .collect())
}

pub fn populate_one<T: Populate>(lookup: &dyn ReferenceLookup, item: T) -> ServiceResult<T::Output> {
    populate_all(lookup, vec![item])?
        .pop()
        .ok_or_else(|| ServiceError::from(anyhow::anyhow!("populate dropped its only item")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::datetime_from_millis;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapLookup {
        artists: HashMap<String, Artist>,
        songs: HashMap<String, Song>,
        users: HashMap<String, UserSummary>,
        song_lookups: Mutex<usize>,
        artist_lookups: Mutex<usize>,
        user_lookups: Mutex<usize>,
    }

    impl ReferenceLookup for MapLookup {
        fn find_artists(&self, ids: &[String]) -> ServiceResult<HashMap<String, Artist>> {
            *self.artist_lookups.lock().unwrap() += 1;
            Ok(ids
                .iter()
                .filter_map(|id| self.artists.get(id).map(|a| (id.clone(), a.clone())))
                .collect())
        }

        fn find_songs(&self, ids: &[String]) -> ServiceResult<HashMap<String, Song>> {
            *self.song_lookups.lock().unwrap() += 1;
            Ok(ids
                .iter()
                .filter_map(|id| self.songs.get(id).map(|s| (id.clone(), s.clone())))
                .collect())
        }

        fn find_users(&self, ids: &[String]) -> ServiceResult<HashMap<String, UserSummary>> {
            *self.user_lookups.lock().unwrap() += 1;
            Ok(ids
                .iter()
                .filter_map(|id| self.users.get(id).map(|u| (id.clone(), u.clone())))
                .collect())
        }
    }

    fn artist(id: &str, name: &str) -> Artist {
        Artist {
            id: id.to_string(),
            fullname: name.to_string(),
            avatar: Some(format!("{}.png", id)),
            created_at: datetime_from_millis(0),
            updated_at: datetime_from_millis(0),
        }
    }

    fn song(id: &str, artist_id: Option<&str>, album_id: Option<&str>) -> Song {
        Song {
            id: id.to_string(),
            fullname: format!("song {}", id),
            thumbnail: None,
            file_mp3: Some(format!("{}.mp3", id)),
            artist_id: artist_id.map(str::to_string),
            album_id: album_id.map(str::to_string),
            created_at: datetime_from_millis(0),
            updated_at: datetime_from_millis(0),
        }
    }

    fn album(id: &str, artist_id: &str, song_ids: &[&str]) -> Album {
        Album {
            id: id.to_string(),
            title: format!("album {}", id),
            description: String::new(),
            thumbnail: None,
            artist_id: artist_id.to_string(),
            song_ids: song_ids.iter().map(|s| s.to_string()).collect(),
            release_date: datetime_from_millis(0),
            created_at: datetime_from_millis(0),
            updated_at: datetime_from_millis(0),
        }
    }

    fn lookup() -> MapLookup {
        let mut lookup = MapLookup::default();
        for a in [artist("a1", "First"), artist("a2", "Second")] {
            lookup.artists.insert(a.id.clone(), a);
        }
        for s in [
            song("s1", Some("a1"), Some("al1")),
            song("s2", Some("a2"), Some("al1")),
            song("s3", Some("gone"), None),
        ] {
            lookup.songs.insert(s.id.clone(), s);
        }
        lookup.users.insert(
            "u1".to_string(),
            UserSummary {
                id: "u1".to_string(),
                username: "linh".to_string(),
                avatar: None,
            },
        );
        lookup
    }

    fn playlist(id: &str, user_id: Option<&str>, song_ids: &[&str]) -> Playlist {
        Playlist {
            id: id.to_string(),
            title: format!("playlist {}", id),
            description: None,
            thumbnail: None,
            user_id: user_id.map(str::to_string),
            song_ids: song_ids.iter().map(|s| s.to_string()).collect(),
            created_at: datetime_from_millis(0),
            updated_at: datetime_from_millis(0),
        }
    }

    #[test]
    fn album_populates_artist_and_songs_one_level_deep() {
        let lookup = lookup();
        let resolved = populate_one(&lookup, album("al1", "a1", &["s2", "s1"])).unwrap();

        let artist = resolved.artist.unwrap();
        assert_eq!(artist.id, "a1");
        assert_eq!(artist.fullname, "First");
        assert_eq!(artist.avatar.as_deref(), Some("a1.png"));

        let song_ids: Vec<_> = resolved.songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(song_ids, vec!["s2", "s1"]);
        assert_eq!(resolved.songs[0].artist.as_ref().unwrap().fullname, "Second");
        // nested songs keep their album as a bare reference
        assert_eq!(resolved.songs[0].album_id.as_deref(), Some("al1"));
    }

    #[test]
    fn dangling_references_are_nulled_or_dropped() {
        let lookup = lookup();
        let resolved = populate_one(&lookup, album("al2", "gone", &["s1", "missing", "s3"])).unwrap();

        assert!(resolved.artist.is_none());
        let song_ids: Vec<_> = resolved.songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(song_ids, vec!["s1", "s3"]);
        assert!(resolved.songs[1].artist.is_none());
    }

    #[test]
    fn batches_lookups_across_entities() {
        let lookup = lookup();
        let albums = vec![
            album("al1", "a1", &["s1"]),
            album("al2", "a2", &["s2"]),
            album("al3", "a1", &[]),
        ];
        let resolved = populate_all(&lookup, albums).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(*lookup.song_lookups.lock().unwrap(), 1);
        assert_eq!(*lookup.artist_lookups.lock().unwrap(), 1);
    }

    #[test]
    fn song_refs_keep_order_and_skip_missing() {
        let lookup = lookup();
        let songs = populate_one(
            &lookup,
            SongRefs(vec!["s3".to_string(), "nope".to_string(), "s1".to_string()]),
        )
        .unwrap();
        let ids: Vec<_> = songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s1"]);
    }

    #[test]
    fn empty_input_does_not_touch_the_store() {
        let lookup = lookup();
        let resolved: Vec<ResolvedSong> = populate_all::<Song>(&lookup, vec![]).unwrap();
        assert!(resolved.is_empty());
        assert_eq!(*lookup.song_lookups.lock().unwrap(), 0);
    }

    #[test]
    fn playlist_without_songs_skips_song_lookup() {
        let lookup = lookup();
        let resolved = populate_one(&lookup, playlist("p1", None, &[])).unwrap();
        assert!(resolved.songs.is_empty());
        assert!(resolved.owner.is_none());
        assert_eq!(*lookup.song_lookups.lock().unwrap(), 0);
        assert_eq!(*lookup.artist_lookups.lock().unwrap(), 0);
        assert_eq!(*lookup.user_lookups.lock().unwrap(), 0);
    }

    #[test]
    fn playlist_owners_resolve_to_their_public_projection() {
        let lookup = lookup();
        let playlists = vec![
            playlist("p1", Some("u1"), &["s1"]),
            playlist("p2", Some("u1"), &[]),
            playlist("p3", Some("deleted"), &["s2"]),
        ];
        let resolved = populate_all(&lookup, playlists).unwrap();

        assert_eq!(resolved[0].owner.as_ref().unwrap().username, "linh");
        assert_eq!(resolved[1].owner, resolved[0].owner);
        assert!(resolved[2].owner.is_none());
        assert_eq!(resolved[2].songs[0].artist.as_ref().unwrap().fullname, "Second");
        assert_eq!(*lookup.user_lookups.lock().unwrap(), 1);
    }
}
