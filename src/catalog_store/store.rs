//! SQLite-backed catalog store.

use super::models::*;
use super::schema::*;
use super::trait_def::CatalogStore;
use super::validation::*;
use crate::error::{ServiceError, ServiceResult};
use crate::reference::{generate_id, EntityKind};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const ARTIST_COLUMNS: &str = "t.id, t.fullname, t.avatar, t.created_at, t.updated_at";
const SONG_COLUMNS: &str =
    "t.id, t.fullname, t.thumbnail, t.file_mp3, t.artist_id, t.album_id, t.created_at, t.updated_at";
const ALBUM_COLUMNS: &str =
    "t.id, t.title, t.description, t.thumbnail, t.artist_id, t.release_date, t.created_at, t.updated_at";
const PLAYLIST_COLUMNS: &str =
    "t.id, t.title, t.description, t.thumbnail, t.user_id, t.created_at, t.updated_at";

/// How one entity type is listed: its table, filterable and searchable
/// columns, and which sort fields map to which column.
struct ListSpec {
    kind: EntityKind,
    table: &'static str,
    columns: &'static str,
    joins: &'static str,
    search_columns: &'static [&'static str],
    artist_column: Option<&'static str>,
    album_column: Option<&'static str>,
    sortable: &'static [(SortField, &'static str)],
}

impl ListSpec {
    fn sort_column(&self, field: SortField) -> Option<&'static str> {
        self.sortable
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, column)| *column)
    }
}

const ARTIST_LIST: ListSpec = ListSpec {
    kind: EntityKind::Artist,
    table: ARTISTS_TABLE,
    columns: ARTIST_COLUMNS,
    joins: "",
    search_columns: &["t.fullname"],
    artist_column: None,
    album_column: None,
    sortable: &[
        (SortField::CreatedAt, "t.created_at"),
        (SortField::UpdatedAt, "t.updated_at"),
        (SortField::Fullname, "t.fullname"),
    ],
};

const SONG_LIST: ListSpec = ListSpec {
    kind: EntityKind::Song,
    table: SONGS_TABLE,
    columns: SONG_COLUMNS,
    joins: " LEFT JOIN artists a ON a.id = t.artist_id",
    search_columns: &["t.fullname", "a.fullname"],
    artist_column: Some("t.artist_id"),
    album_column: Some("t.album_id"),
    sortable: &[
        (SortField::CreatedAt, "t.created_at"),
        (SortField::UpdatedAt, "t.updated_at"),
        (SortField::Fullname, "t.fullname"),
    ],
};

const ALBUM_LIST: ListSpec = ListSpec {
    kind: EntityKind::Album,
    table: ALBUMS_TABLE,
    columns: ALBUM_COLUMNS,
    joins: "",
    search_columns: &["t.title", "t.description"],
    artist_column: Some("t.artist_id"),
    album_column: None,
    sortable: &[
        (SortField::CreatedAt, "t.created_at"),
        (SortField::UpdatedAt, "t.updated_at"),
        (SortField::Title, "t.title"),
        (SortField::ReleaseDate, "t.release_date"),
    ],
};

const PLAYLIST_LIST: ListSpec = ListSpec {
    kind: EntityKind::Playlist,
    table: PLAYLISTS_TABLE,
    columns: PLAYLIST_COLUMNS,
    joins: "",
    search_columns: &["t.title", "t.description"],
    artist_column: None,
    album_column: None,
    sortable: &[
        (SortField::CreatedAt, "t.created_at"),
        (SortField::UpdatedAt, "t.updated_at"),
        (SortField::Title, "t.title"),
    ],
};

/// Tables backing the song list of a container.
struct MembershipTables {
    container_table: &'static str,
    members_table: &'static str,
    container_column: &'static str,
}

fn membership_tables(container: Container) -> MembershipTables {
    match container {
        Container::Album => MembershipTables {
            container_table: ALBUMS_TABLE,
            members_table: ALBUM_SONGS_TABLE,
            container_column: "album_id",
        },
        Container::Playlist => MembershipTables {
            container_table: PLAYLISTS_TABLE,
            members_table: PLAYLIST_SONGS_TABLE,
            container_column: "playlist_id",
        },
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// SQLite integers are signed 64 bit.
fn sql_integer(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `?1, ?2, ...` for `count` parameters, starting after `offset` already bound ones.
fn placeholders(offset: usize, count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", offset + i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn artist_from_row(row: &Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        fullname: row.get(1)?,
        avatar: row.get(2)?,
        created_at: datetime_from_millis(row.get(3)?),
        updated_at: datetime_from_millis(row.get(4)?),
    })
}

fn song_from_row(row: &Row) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        fullname: row.get(1)?,
        thumbnail: row.get(2)?,
        file_mp3: row.get(3)?,
        artist_id: row.get(4)?,
        album_id: row.get(5)?,
        created_at: datetime_from_millis(row.get(6)?),
        updated_at: datetime_from_millis(row.get(7)?),
    })
}

/// Song ids are attached afterwards from the membership table.
fn album_from_row(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        thumbnail: row.get(3)?,
        artist_id: row.get(4)?,
        song_ids: vec![],
        release_date: datetime_from_millis(row.get(5)?),
        created_at: datetime_from_millis(row.get(6)?),
        updated_at: datetime_from_millis(row.get(7)?),
    })
}

fn playlist_from_row(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        thumbnail: row.get(3)?,
        user_id: row.get(4)?,
        song_ids: vec![],
        created_at: datetime_from_millis(row.get(5)?),
        updated_at: datetime_from_millis(row.get(6)?),
    })
}

/// Case-insensitive substring match, Unicode aware. The needle is a literal.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<Option<String>>(0)?;
            let needle = ctx.get::<Option<String>>(1)?;
            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            })
        },
    )
}

/// Collects `column = value` assignments of a partial update.
#[derive(Default)]
struct UpdateSet {
    assignments: Vec<String>,
    values: Vec<Option<String>>,
}

impl UpdateSet {
    fn set(&mut self, column: &str, value: Option<String>) {
        self.values.push(value);
        self.assignments
            .push(format!("{} = ?{}", column, self.values.len()));
    }

    fn set_if(&mut self, column: &str, value: Option<String>) {
        if value.is_some() {
            self.set(column, value);
        }
    }

    /// Runs the update, always refreshing `updated_at`. Returns whether the row exists.
    fn execute(mut self, conn: &Connection, table: &str, id: &str) -> rusqlite::Result<bool> {
        self.assignments
            .push(format!("updated_at = {}", now_millis()));
        self.values.push(Some(id.to_string()));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            self.assignments.join(", "),
            self.values.len()
        );
        let changed = conn.execute(&sql, params_from_iter(self.values.iter()))?;
        Ok(changed > 0)
    }
}

pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening catalog database at {:?}", db_path);
        let conn = open_versioned(db_path, VERSIONED_SCHEMAS)
            .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;
        Self::from_connection(conn)
    }

    /// A store over a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        VERSIONED_SCHEMAS
            .last()
            .context("No catalog schema defined")?
            .create(&conn)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        register_functions(&conn)?;
        Ok(SqliteCatalogStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow!("Catalog connection mutex poisoned")))
    }

    fn get_one<T>(
        conn: &Connection,
        spec: &ListSpec,
        id: &str,
        map_row: fn(&Row) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<Option<T>> {
        conn.query_row(
            &format!("SELECT {} FROM {} t WHERE t.id = ?1", spec.columns, spec.table),
            params![id],
            map_row,
        )
        .optional()
    }

    fn get_many<T>(
        conn: &Connection,
        spec: &ListSpec,
        ids: &[String],
        map_row: fn(&Row) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT {} FROM {} t WHERE t.id IN ({})",
            spec.columns,
            spec.table,
            placeholders(0, ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), map_row)?;
        rows.collect()
    }

    fn delete_row(conn: &Connection, table: &str, id: &str) -> rusqlite::Result<bool> {
        let deleted = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), params![id])?;
        Ok(deleted > 0)
    }

    fn query_entities<T>(
        conn: &Connection,
        spec: &ListSpec,
        query: &ListQuery,
        map_row: fn(&Row) -> rusqlite::Result<T>,
    ) -> ServiceResult<QueryResult<T>> {
        let mut clauses: Vec<String> = vec![];
        let mut values: Vec<Value> = vec![];

        if let (Some(column), Some(artist_id)) = (spec.artist_column, &query.filter.artist_id) {
            values.push(Value::Text(artist_id.clone()));
            clauses.push(format!("{} = ?{}", column, values.len()));
        }
        if let (Some(column), Some(album_id)) = (spec.album_column, &query.filter.album_id) {
            values.push(Value::Text(album_id.clone()));
            clauses.push(format!("{} = ?{}", column, values.len()));
        }
        let search = query
            .filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(search) = search {
            values.push(Value::Text(search.to_string()));
            let index = values.len();
            let alternatives = spec
                .search_columns
                .iter()
                .map(|column| format!("contains_ci({}, ?{})", column, index))
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({})", alternatives));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let from_sql = format!("{} t{}", spec.table, spec.joins);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", from_sql, where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sort_column = spec.sort_column(query.sort.field).ok_or_else(|| {
            ServiceError::Validation(format!(
                "Cannot sort {}s by {:?}",
                spec.kind, query.sort.field
            ))
        })?;
        let total = total as usize;
        if query.window.offset >= total {
            return Ok(QueryResult {
                items: vec![],
                total,
            });
        }

        let direction = query.sort.order.as_sql();
        values.push(Value::Integer(sql_integer(query.window.limit)));
        let limit_index = values.len();
        values.push(Value::Integer(sql_integer(query.window.offset)));
        let offset_index = values.len();
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {}, t.rowid {} LIMIT ?{} OFFSET ?{}",
            spec.columns,
            from_sql,
            where_sql,
            sort_column,
            direction,
            direction,
            limit_index,
            offset_index
        );
        debug!("Listing {}s: {}", spec.kind, sql);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), map_row)?
            .collect::<rusqlite::Result<Vec<T>>>()?;

        Ok(QueryResult { items, total })
    }

    /// Ordered song ids for each of the given containers.
    fn load_members(
        conn: &Connection,
        container: Container,
        ids: &[String],
    ) -> rusqlite::Result<HashMap<String, Vec<String>>> {
        let mut members: HashMap<String, Vec<String>> = HashMap::new();
        if ids.is_empty() {
            return Ok(members);
        }
        let tables = membership_tables(container);
        let sql = format!(
            "SELECT {col}, song_id FROM {members} WHERE {col} IN ({ids}) ORDER BY {col}, position",
            col = tables.container_column,
            members = tables.members_table,
            ids = placeholders(0, ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (container_id, song_id) = row?;
            members.entry(container_id).or_default().push(song_id);
        }
        Ok(members)
    }

    fn write_members(
        conn: &Connection,
        container: Container,
        container_id: &str,
        song_ids: &[String],
    ) -> rusqlite::Result<()> {
        let tables = membership_tables(container);
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                tables.members_table, tables.container_column
            ),
            params![container_id],
        )?;
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} ({}, position, song_id) VALUES (?1, ?2, ?3)",
            tables.members_table, tables.container_column
        ))?;
        for (position, song_id) in song_ids.iter().enumerate() {
            stmt.execute(params![container_id, position as i64, song_id])?;
        }
        Ok(())
    }

    fn container_exists(
        conn: &Connection,
        tables: &MembershipTables,
        container_id: &str,
    ) -> rusqlite::Result<bool> {
        Ok(conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", tables.container_table),
                params![container_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn touch(conn: &Connection, table: &str, id: &str) -> rusqlite::Result<()> {
        conn.execute(
            &format!("UPDATE {} SET updated_at = ?1 WHERE id = ?2", table),
            params![now_millis(), id],
        )?;
        Ok(())
    }

    fn with_album_members(conn: &Connection, mut albums: Vec<Album>) -> rusqlite::Result<Vec<Album>> {
        let ids: Vec<String> = albums.iter().map(|a| a.id.clone()).collect();
        let mut members = Self::load_members(conn, Container::Album, &ids)?;
        for album in albums.iter_mut() {
            album.song_ids = members.remove(&album.id).unwrap_or_default();
        }
        Ok(albums)
    }

    fn with_playlist_members(
        conn: &Connection,
        mut playlists: Vec<Playlist>,
    ) -> rusqlite::Result<Vec<Playlist>> {
        let ids: Vec<String> = playlists.iter().map(|p| p.id.clone()).collect();
        let mut members = Self::load_members(conn, Container::Playlist, &ids)?;
        for playlist in playlists.iter_mut() {
            playlist.song_ids = members.remove(&playlist.id).unwrap_or_default();
        }
        Ok(playlists)
    }

    fn album_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Album>> {
        match Self::get_one(conn, &ALBUM_LIST, id, album_from_row)? {
            Some(album) => Ok(Self::with_album_members(conn, vec![album])?.pop()),
            None => Ok(None),
        }
    }

    fn playlist_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Playlist>> {
        match Self::get_one(conn, &PLAYLIST_LIST, id, playlist_from_row)? {
            Some(playlist) => Ok(Self::with_playlist_members(conn, vec![playlist])?.pop()),
            None => Ok(None),
        }
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn find_artists(&self, ids: &[String]) -> ServiceResult<HashMap<String, Artist>> {
        let conn = self.conn()?;
        let artists = Self::get_many(&conn, &ARTIST_LIST, ids, artist_from_row)?;
        Ok(artists.into_iter().map(|a| (a.id.clone(), a)).collect())
    }

    fn find_songs(&self, ids: &[String]) -> ServiceResult<HashMap<String, Song>> {
        let conn = self.conn()?;
        let songs = Self::get_many(&conn, &SONG_LIST, ids, song_from_row)?;
        Ok(songs.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    // =========================================================================
    // Artists
    // =========================================================================

    fn insert_artist(&self, artist: NewArtist) -> ServiceResult<Artist> {
        validate_new_artist(&artist)?;
        let conn = self.conn()?;
        let id = generate_id();
        let now = now_millis();
        conn.execute(
            "INSERT INTO artists (id, fullname, avatar, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, artist.fullname, artist.avatar, now],
        )?;
        Self::get_one(&conn, &ARTIST_LIST, &id, artist_from_row)?
            .ok_or_else(|| anyhow!("Inserted artist {} vanished", id).into())
    }

    fn get_artist(&self, id: &str) -> ServiceResult<Option<Artist>> {
        let conn = self.conn()?;
        Ok(Self::get_one(&conn, &ARTIST_LIST, id, artist_from_row)?)
    }

    fn update_artist(&self, id: &str, update: ArtistUpdate) -> ServiceResult<Option<Artist>> {
        validate_artist_update(&update)?;
        let conn = self.conn()?;
        let mut set = UpdateSet::default();
        set.set_if("fullname", update.fullname);
        set.set_if("avatar", update.avatar);
        if !set.execute(&conn, ARTISTS_TABLE, id)? {
            return Ok(None);
        }
        Ok(Self::get_one(&conn, &ARTIST_LIST, id, artist_from_row)?)
    }

    fn delete_artist(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        Ok(Self::delete_row(&conn, ARTISTS_TABLE, id)?)
    }

    fn query_artists(&self, query: &ListQuery) -> ServiceResult<QueryResult<Artist>> {
        let conn = self.conn()?;
        Self::query_entities(&conn, &ARTIST_LIST, query, artist_from_row)
    }

    // =========================================================================
    // Songs
    // =========================================================================

    fn insert_song(&self, song: NewSong) -> ServiceResult<Song> {
        validate_new_song(&song)?;
        let conn = self.conn()?;
        let id = generate_id();
        let now = now_millis();
        conn.execute(
            "INSERT INTO songs (id, fullname, thumbnail, file_mp3, artist_id, album_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                song.fullname,
                song.thumbnail,
                song.file_mp3,
                song.artist_id,
                song.album_id,
                now
            ],
        )?;
        Self::get_one(&conn, &SONG_LIST, &id, song_from_row)?
            .ok_or_else(|| anyhow!("Inserted song {} vanished", id).into())
    }

    fn get_song(&self, id: &str) -> ServiceResult<Option<Song>> {
        let conn = self.conn()?;
        Ok(Self::get_one(&conn, &SONG_LIST, id, song_from_row)?)
    }

    fn update_song(&self, id: &str, update: SongUpdate) -> ServiceResult<Option<Song>> {
        validate_song_update(&update)?;
        let conn = self.conn()?;
        let mut set = UpdateSet::default();
        set.set_if("fullname", update.fullname);
        set.set_if("thumbnail", update.thumbnail);
        set.set_if("file_mp3", update.file_mp3);
        set.set_if("artist_id", update.artist_id);
        set.set_if("album_id", update.album_id);
        if !set.execute(&conn, SONGS_TABLE, id)? {
            return Ok(None);
        }
        Ok(Self::get_one(&conn, &SONG_LIST, id, song_from_row)?)
    }

    fn delete_song(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        Ok(Self::delete_row(&conn, SONGS_TABLE, id)?)
    }

    fn query_songs(&self, query: &ListQuery) -> ServiceResult<QueryResult<Song>> {
        let conn = self.conn()?;
        Self::query_entities(&conn, &SONG_LIST, query, song_from_row)
    }

    // =========================================================================
    // Albums
    // =========================================================================

    fn insert_album(&self, album: NewAlbum) -> ServiceResult<Album> {
        validate_new_album(&album)?;
        let mut conn = self.conn()?;
        let id = generate_id();
        let now = now_millis();
        let release_date = album
            .release_date
            .map(|d| d.timestamp_millis())
            .unwrap_or(now);

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO albums (id, title, description, thumbnail, artist_id, release_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                album.title,
                album.description,
                album.thumbnail,
                album.artist_id,
                release_date,
                now
            ],
        )?;
        Self::write_members(&tx, Container::Album, &id, &album.song_ids)?;
        tx.commit()?;

        Self::album_by_id(&conn, &id)?
            .ok_or_else(|| anyhow!("Inserted album {} vanished", id).into())
    }

    fn get_album(&self, id: &str) -> ServiceResult<Option<Album>> {
        let conn = self.conn()?;
        Ok(Self::album_by_id(&conn, id)?)
    }

    fn update_album(&self, id: &str, update: AlbumUpdate) -> ServiceResult<Option<Album>> {
        validate_album_update(&update)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut set = UpdateSet::default();
        set.set_if("title", update.title);
        set.set_if("description", update.description);
        set.set_if("thumbnail", update.thumbnail);
        set.set_if("artist_id", update.artist_id);
        set.set_if(
            "release_date",
            update.release_date.map(|d| d.timestamp_millis().to_string()),
        );
        if !set.execute(&tx, ALBUMS_TABLE, id)? {
            return Ok(None);
        }
        if let Some(song_ids) = &update.song_ids {
            Self::write_members(&tx, Container::Album, id, song_ids)?;
        }
        tx.commit()?;

        Ok(Self::album_by_id(&conn, id)?)
    }

    fn delete_album(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        Ok(Self::delete_row(&conn, ALBUMS_TABLE, id)?)
    }

    fn query_albums(&self, query: &ListQuery) -> ServiceResult<QueryResult<Album>> {
        let conn = self.conn()?;
        let result = Self::query_entities(&conn, &ALBUM_LIST, query, album_from_row)?;
        Ok(QueryResult {
            items: Self::with_album_members(&conn, result.items)?,
            total: result.total,
        })
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    fn insert_playlist(&self, playlist: NewPlaylist) -> ServiceResult<Playlist> {
        validate_new_playlist(&playlist)?;
        let mut conn = self.conn()?;
        let id = generate_id();
        let now = now_millis();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO playlists (id, title, description, thumbnail, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id,
                playlist.title,
                playlist.description,
                playlist.thumbnail,
                playlist.user_id,
                now
            ],
        )?;
        Self::write_members(&tx, Container::Playlist, &id, &playlist.song_ids)?;
        tx.commit()?;

        Self::playlist_by_id(&conn, &id)?
            .ok_or_else(|| anyhow!("Inserted playlist {} vanished", id).into())
    }

    fn get_playlist(&self, id: &str) -> ServiceResult<Option<Playlist>> {
        let conn = self.conn()?;
        Ok(Self::playlist_by_id(&conn, id)?)
    }

    fn update_playlist(
        &self,
        id: &str,
        update: PlaylistUpdate,
    ) -> ServiceResult<Option<Playlist>> {
        validate_playlist_update(&update)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut set = UpdateSet::default();
        set.set_if("title", update.title);
        set.set_if("description", update.description);
        set.set_if("thumbnail", update.thumbnail);
        if !set.execute(&tx, PLAYLISTS_TABLE, id)? {
            return Ok(None);
        }
        if let Some(song_ids) = &update.song_ids {
            Self::write_members(&tx, Container::Playlist, id, song_ids)?;
        }
        tx.commit()?;

        Ok(Self::playlist_by_id(&conn, id)?)
    }

    fn delete_playlist(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        Ok(Self::delete_row(&conn, PLAYLISTS_TABLE, id)?)
    }

    fn query_playlists(&self, query: &ListQuery) -> ServiceResult<QueryResult<Playlist>> {
        let conn = self.conn()?;
        let result = Self::query_entities(&conn, &PLAYLIST_LIST, query, playlist_from_row)?;
        Ok(QueryResult {
            items: Self::with_playlist_members(&conn, result.items)?,
            total: result.total,
        })
    }

    // =========================================================================
    // Membership
    // =========================================================================

    fn append_member(
        &self,
        container: Container,
        container_id: &str,
        song_id: &str,
    ) -> ServiceResult<MembershipChange> {
        let tables = membership_tables(container);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !Self::container_exists(&tx, &tables, container_id)? {
            return Ok(MembershipChange::ContainerMissing);
        }
        let present = tx
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE {} = ?1 AND song_id = ?2",
                    tables.members_table, tables.container_column
                ),
                params![container_id, song_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if present {
            return Ok(MembershipChange::AlreadyPresent);
        }

        tx.execute(
            &format!(
                "INSERT INTO {members} ({col}, position, song_id)
                 SELECT ?1, COALESCE(MAX(position), -1) + 1, ?2 FROM {members} WHERE {col} = ?1",
                members = tables.members_table,
                col = tables.container_column
            ),
            params![container_id, song_id],
        )?;
        Self::touch(&tx, tables.container_table, container_id)?;
        tx.commit()?;
        Ok(MembershipChange::Added)
    }

    fn remove_member(
        &self,
        container: Container,
        container_id: &str,
        song_id: &str,
    ) -> ServiceResult<Option<usize>> {
        let tables = membership_tables(container);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !Self::container_exists(&tx, &tables, container_id)? {
            return Ok(None);
        }
        let removed = tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND song_id = ?2",
                tables.members_table, tables.container_column
            ),
            params![container_id, song_id],
        )?;
        if removed > 0 {
            Self::touch(&tx, tables.container_table, container_id)?;
        }
        tx.commit()?;
        Ok(Some(removed))
    }

    fn count(&self, kind: EntityKind) -> ServiceResult<usize> {
        let table = match kind {
            EntityKind::Artist => ARTISTS_TABLE,
            EntityKind::Song => SONGS_TABLE,
            EntityKind::Album => ALBUMS_TABLE,
            EntityKind::Playlist => PLAYLISTS_TABLE,
            EntityKind::User => {
                return Err(ServiceError::Validation(
                    "Users are not stored in the catalog".to_string(),
                ))
            }
        };
        let conn = self.conn()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}
