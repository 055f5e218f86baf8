use super::auth::{CredentialsHasher, PasswordCredentials};
use super::user_models::{NewUser, Sex, User, UserRole, UserUpdate};
use super::user_store::{UserCredentialsStore, UserFavoritesStore, UserStore};
use crate::catalog_store::datetime_from_millis;
use crate::error::{ServiceError, ServiceResult};
use crate::reference::generate_id;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP_MS,
};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const USERS_TABLE_V_0: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "role",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'user'")
        ),
        sqlite_column!(
            "sex",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'other'")
        ),
        sqlite_column!("avatar", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_users_created_at", "created_at")],
    unique_constraints: &[],
};
const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP_MS)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};
const USER_FAVORITES_V_0: Table = Table {
    name: "user_favorites",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP_MS)
        ),
    ],
    indices: &[("idx_user_favorites_song_id", "song_id")],
    unique_constraints: &[&["user_id", "song_id"]],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USERS_TABLE_V_0,
        USER_PASSWORD_CREDENTIALS_V_0,
        USER_FAVORITES_V_0,
    ],
    migration: None,
}];

const USER_COLUMNS: &str = "id, username, role, sex, avatar, created_at, updated_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(2)?;
    let sex: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        role: UserRole::from_str(&role).unwrap_or_default(),
        sex: Sex::from_str(&sex).unwrap_or_default(),
        avatar: row.get(4)?,
        created_at: datetime_from_millis(row.get(5)?),
        updated_at: datetime_from_millis(row.get(6)?),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn username_taken(err: rusqlite::Error) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::Conflict("Username already exists".to_string())
    } else {
        err.into()
    }
}

pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening user database at {:?}", db_path);
        let conn = open_versioned(db_path, VERSIONED_SCHEMAS)
            .with_context(|| format!("Failed to open user database {:?}", db_path))?;
        Ok(SqliteUserStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        VERSIONED_SCHEMAS
            .last()
            .context("No user schema defined")?
            .create(&conn)?;
        Ok(SqliteUserStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow!("User connection mutex poisoned")))
    }

    fn user_by_id(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<User>> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id],
            user_from_row,
        )
        .optional()
    }
}

impl UserCredentialsStore for SqliteUserStore {
    fn get_password_credentials(&self, user_id: &str) -> ServiceResult<Option<PasswordCredentials>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT hash, hasher FROM user_password_credentials WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((hash, hasher)) => Ok(Some(PasswordCredentials {
                user_id: user_id.to_string(),
                hash,
                hasher: CredentialsHasher::from_str(&hasher)?,
            })),
        }
    }

    fn set_password_credentials(&self, credentials: PasswordCredentials) -> ServiceResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_password_credentials (user_id, hash, hasher) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET hash = excluded.hash, hasher = excluded.hasher",
            params![
                credentials.user_id,
                credentials.hash,
                credentials.hasher.to_string()
            ],
        )?;
        Ok(())
    }
}

impl UserFavoritesStore for SqliteUserStore {
    fn add_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO user_favorites (user_id, song_id) VALUES (?1, ?2)",
            params![user_id, song_id],
        )?;
        Ok(inserted > 0)
    }

    fn remove_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM user_favorites WHERE user_id = ?1 AND song_id = ?2",
            params![user_id, song_id],
        )?;
        Ok(deleted > 0)
    }

    fn is_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT 1 FROM user_favorites WHERE user_id = ?1 AND song_id = ?2",
                params![user_id, song_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn get_favorites(&self, user_id: &str) -> ServiceResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT song_id FROM user_favorites WHERE user_id = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, user: NewUser) -> ServiceResult<User> {
        let conn = self.conn()?;
        let id = generate_id();
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO users (id, username, role, sex, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, user.username, user.role.as_str(), user.sex.as_str(), now],
        )
        .map_err(username_taken)?;
        debug!("Created user {} ({})", id, user.username);
        Self::user_by_id(&conn, &id)?
            .ok_or_else(|| anyhow!("Inserted user {} vanished", id).into())
    }

    fn get_user(&self, user_id: &str) -> ServiceResult<Option<User>> {
        let conn = self.conn()?;
        Ok(Self::user_by_id(&conn, user_id)?)
    }

    fn get_users(&self, user_ids: &[String]) -> ServiceResult<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn()?;
        let placeholders = (1..=user_ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE id IN ({})",
            USER_COLUMNS, placeholders
        ))?;
        let rows = stmt.query_map(params_from_iter(user_ids.iter()), user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<User>>>()?)
    }

    fn get_user_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()?)
    }

    fn update_user(&self, user_id: &str, update: UserUpdate) -> ServiceResult<Option<User>> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE users SET
                    username = COALESCE(?1, username),
                    sex = COALESCE(?2, sex),
                    avatar = COALESCE(?3, avatar),
                    role = COALESCE(?4, role),
                    updated_at = ?5
                 WHERE id = ?6",
                params![
                    update.username,
                    update.sex.map(Sex::as_str),
                    update.avatar,
                    update.role.map(UserRole::as_str),
                    chrono::Utc::now().timestamp_millis(),
                    user_id
                ],
            )
            .map_err(username_taken)?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Self::user_by_id(&conn, user_id)?)
    }

    fn delete_user(&self, user_id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        Ok(deleted > 0)
    }

    fn list_users(&self) -> ServiceResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, rowid DESC",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<User>>>()?)
    }

    fn count_users(&self, role: Option<UserRole>) -> ServiceResult<usize> {
        let conn = self.conn()?;
        let count: i64 = match role {
            None => conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?,
            Some(role) => conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                params![role.as_str()],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }
}
