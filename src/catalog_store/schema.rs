//! SQLite schema for the catalog database.
//!
//! Membership tables hold the ordered song lists of albums and playlists. Their
//! `song_id` deliberately has no foreign key: deleting a song leaves the entry in
//! place and readers drop it when it no longer resolves.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

pub const ARTISTS_TABLE: &str = "artists";
pub const SONGS_TABLE: &str = "songs";
pub const ALBUMS_TABLE: &str = "albums";
pub const ALBUM_SONGS_TABLE: &str = "album_songs";
pub const PLAYLISTS_TABLE: &str = "playlists";
pub const PLAYLIST_SONGS_TABLE: &str = "playlist_songs";

const ARTISTS_TABLE_V_0: Table = Table {
    name: ARTISTS_TABLE,
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("fullname", &SqlType::Text, non_null = true),
        sqlite_column!("avatar", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_artists_created_at", "created_at")],
    unique_constraints: &[],
};

const SONGS_TABLE_V_0: Table = Table {
    name: SONGS_TABLE,
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("fullname", &SqlType::Text, non_null = true),
        sqlite_column!("thumbnail", &SqlType::Text),
        sqlite_column!("file_mp3", &SqlType::Text),
        sqlite_column!("artist_id", &SqlType::Text),
        sqlite_column!("album_id", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_songs_artist_id", "artist_id"),
        ("idx_songs_album_id", "album_id"),
        ("idx_songs_created_at", "created_at"),
    ],
    unique_constraints: &[],
};

const ALBUMS_TABLE_V_0: Table = Table {
    name: ALBUMS_TABLE,
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "description",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("thumbnail", &SqlType::Text),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_albums_artist_id", "artist_id"),
        ("idx_albums_created_at", "created_at"),
    ],
    unique_constraints: &[],
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: ALBUMS_TABLE,
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ALBUM_SONGS_TABLE_V_0: Table = Table {
    name: ALBUM_SONGS_TABLE,
    columns: &[
        sqlite_column!(
            "album_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ALBUM_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_album_songs_song_id", "song_id")],
    unique_constraints: &[&["album_id", "position"]],
};

const PLAYLISTS_TABLE_V_0: Table = Table {
    name: PLAYLISTS_TABLE,
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("thumbnail", &SqlType::Text),
        sqlite_column!("user_id", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_playlists_created_at", "created_at")],
    unique_constraints: &[],
};

const PLAYLIST_FK: ForeignKey = ForeignKey {
    foreign_table: PLAYLISTS_TABLE,
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PLAYLIST_SONGS_TABLE_V_0: Table = Table {
    name: PLAYLIST_SONGS_TABLE,
    columns: &[
        sqlite_column!(
            "playlist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&PLAYLIST_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_playlist_songs_song_id", "song_id")],
    unique_constraints: &[&["playlist_id", "position"]],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTISTS_TABLE_V_0,
        SONGS_TABLE_V_0,
        ALBUMS_TABLE_V_0,
        ALBUM_SONGS_TABLE_V_0,
        PLAYLISTS_TABLE_V_0,
        PLAYLIST_SONGS_TABLE_V_0,
    ],
    migration: None,
}];
