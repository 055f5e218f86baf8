//! Test fixture creation for catalog and user databases

use super::constants::*;
use anyhow::Result;
use music_catalog_server::catalog_store::{CatalogStore, NewAlbum, NewArtist, NewSong};
use music_catalog_server::user::{Sex, TokenIssuer};
use music_catalog_server::{SqliteCatalogStore, SqliteUserStore, UserManager, UserRole};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Ids of the entities every test server starts with.
#[derive(Debug, Clone)]
pub struct SeededCatalog {
    pub artist_1_id: String,
    pub artist_2_id: String,
    /// By artist 1, on album 1
    pub song_1_id: String,
    /// By artist 1, on album 1
    pub song_2_id: String,
    /// By artist 2, no album
    pub song_3_id: String,
    pub album_1_id: String,
    pub user_id: String,
    pub admin_id: String,
}

pub struct TestStores {
    pub dir: TempDir,
    pub catalog_store: Arc<SqliteCatalogStore>,
    pub user_store: Arc<SqliteUserStore>,
    pub seed: SeededCatalog,
}

pub fn token_issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_JWT_SECRET, Duration::from_secs(3600))
}

/// Creates both databases in a temporary directory with two artists, one
/// album, three songs, an admin and a regular user.
pub fn create_test_stores() -> Result<TestStores> {
    let dir = TempDir::new()?;
    let catalog_store = Arc::new(SqliteCatalogStore::new(dir.path().join("catalog.db"))?);
    let user_store = Arc::new(SqliteUserStore::new(dir.path().join("user.db"))?);

    let artist_1 = catalog_store.insert_artist(NewArtist {
        fullname: ARTIST_1_NAME.to_string(),
        avatar: None,
    })?;
    let artist_2 = catalog_store.insert_artist(NewArtist {
        fullname: ARTIST_2_NAME.to_string(),
        avatar: None,
    })?;
    let song = |name: &str, artist_id: &str| NewSong {
        fullname: name.to_string(),
        thumbnail: None,
        file_mp3: None,
        artist_id: Some(artist_id.to_string()),
        album_id: None,
    };
    let song_1 = catalog_store.insert_song(song(SONG_1_NAME, &artist_1.id))?;
    let song_2 = catalog_store.insert_song(song(SONG_2_NAME, &artist_1.id))?;
    let song_3 = catalog_store.insert_song(song(SONG_3_NAME, &artist_2.id))?;
    let album_1 = catalog_store.insert_album(NewAlbum {
        title: ALBUM_1_TITLE.to_string(),
        description: "Seeded".to_string(),
        thumbnail: None,
        artist_id: artist_1.id.clone(),
        song_ids: vec![song_1.id.clone(), song_2.id.clone()],
        release_date: None,
    })?;

    let user_manager = UserManager::new(user_store.clone(), catalog_store.clone(), token_issuer());
    let admin = user_manager.create_user(ADMIN_USER, ADMIN_PASS, UserRole::Admin, Sex::Other)?;
    let user = user_manager.create_user(TEST_USER, TEST_PASS, UserRole::User, Sex::Other)?;

    Ok(TestStores {
        dir,
        catalog_store,
        user_store,
        seed: SeededCatalog {
            artist_1_id: artist_1.id,
            artist_2_id: artist_2.id,
            song_1_id: song_1.id,
            song_2_id: song_2.id,
            song_3_id: song_3.id,
            album_1_id: album_1.id,
            user_id: user.id,
            admin_id: admin.id,
        },
    })
}
