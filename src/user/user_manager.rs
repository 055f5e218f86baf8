use super::auth::{PasswordCredentials, TokenIssuer};
use super::user_models::{NewUser, Sex, User, UserRole, UserStats, UserUpdate, UserWithFavorites};
use super::user_store::UserStore;
use crate::catalog_store::{CatalogStore, ResolvedSong};
use crate::error::{ServiceError, ServiceResult};
use crate::reference::{is_well_formed_id, populate_one, EntityKind, SongRefs, StoreLookup};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

const RECENT_USERS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub username: Option<String>,
    pub sex: Option<String>,
    /// Stored filename of a freshly uploaded avatar.
    pub avatar: Option<String>,
}

fn required(field: &'static str, value: Option<&str>) -> ServiceResult<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ServiceError::EmptyField { field }),
    }
}

/// Passwords are taken verbatim, only emptiness is rejected.
fn required_password(field: &'static str, value: Option<&str>) -> ServiceResult<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ServiceError::EmptyField { field }),
    }
}

fn user_path_id(raw: &str) -> ServiceResult<String> {
    let candidate = raw.trim();
    if is_well_formed_id(candidate) {
        Ok(candidate.to_ascii_lowercase())
    } else {
        Err(ServiceError::not_found(EntityKind::User, raw))
    }
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized("Invalid username or password".to_string())
}

/// Accounts, credentials, session tokens and favorites.
pub struct UserManager {
    user_store: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
    tokens: TokenIssuer,
}

impl UserManager {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        catalog: Arc<dyn CatalogStore>,
        tokens: TokenIssuer,
    ) -> Self {
        UserManager {
            user_store,
            catalog,
            tokens,
        }
    }

    fn existing_user(&self, user_id: &str) -> ServiceResult<User> {
        self.user_store
            .get_user(user_id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, user_id))
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Creates a user with a password. Used by registration and by the admin tool.
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
        sex: Sex,
    ) -> ServiceResult<User> {
        let username = required("username", Some(username))?;
        let password = required_password("password", Some(password))?;
        let user = self.user_store.create_user(NewUser {
            username,
            role,
            sex,
        })?;
        let credentials = PasswordCredentials::create(&user.id, &password)?;
        if let Err(err) = self.user_store.set_password_credentials(credentials) {
            // a user without credentials could never log in
            self.user_store.delete_user(&user.id)?;
            return Err(err);
        }
        info!("Created {} {} ({})", user.role, user.id, user.username);
        Ok(user)
    }

    pub fn register(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        sex: Option<&str>,
    ) -> ServiceResult<User> {
        let username = required("username", username)?;
        let password = required_password("password", password)?;
        let sex = match sex.map(str::trim).filter(|s| !s.is_empty()) {
            Some(sex) => Sex::from_str(sex)?,
            None => Sex::default(),
        };
        self.create_user(&username, &password, UserRole::User, sex)
    }

    pub fn login(&self, username: Option<&str>, password: Option<&str>) -> ServiceResult<LoginResponse> {
        let username = required("username", username)?;
        let password = required_password("password", password)?;

        let Some(user) = self.user_store.get_user_by_username(&username)? else {
            debug!("Login attempt for unknown user {}", username);
            return Err(invalid_credentials());
        };
        let Some(credentials) = self.user_store.get_password_credentials(&user.id)? else {
            warn!("User {} has no password credentials", user.id);
            return Err(invalid_credentials());
        };
        if !credentials.verify(&password)? {
            debug!("Wrong password for user {}", user.id);
            return Err(invalid_credentials());
        }

        let token = self.tokens.issue(&user)?;
        info!("User {} logged in", user.username);
        Ok(LoginResponse { token, user })
    }

    /// Resolves a bearer token to the user it was issued for. The stored user
    /// wins over the claims, so role changes and deletions apply immediately.
    pub fn authenticate(&self, token: &str) -> ServiceResult<User> {
        let claims = self.tokens.decode(token)?;
        self.user_store
            .get_user(&claims.id)?
            .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".to_string()))
    }

    pub fn profile(&self, user_id: &str) -> ServiceResult<User> {
        self.existing_user(user_id)
    }

    pub fn update_profile(&self, user_id: &str, form: ProfileForm) -> ServiceResult<User> {
        let username = match form.username {
            Some(username) => Some(required("username", Some(username.as_str()))?),
            None => None,
        };
        let sex = form
            .sex
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Sex::from_str)
            .transpose()?;
        self.user_store
            .update_user(
                user_id,
                UserUpdate {
                    username,
                    sex,
                    avatar: form.avatar,
                    role: None,
                },
            )?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, user_id))
    }

    pub fn change_password(
        &self,
        user_id: &str,
        current_password: Option<&str>,
        new_password: Option<&str>,
    ) -> ServiceResult<()> {
        let current_password = required_password("currentPassword", current_password)?;
        let new_password = required_password("newPassword", new_password)?;
        let user = self.existing_user(user_id)?;

        let verified = match self.user_store.get_password_credentials(&user.id)? {
            Some(credentials) => credentials.verify(&current_password)?,
            None => false,
        };
        if !verified {
            return Err(ServiceError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }
        self.user_store
            .set_password_credentials(PasswordCredentials::create(&user.id, &new_password)?)?;
        info!("User {} changed their password", user.id);
        Ok(())
    }

    /// Replaces a password without knowing the old one. Admin tool only.
    pub fn set_password(&self, username: &str, password: &str) -> ServiceResult<User> {
        let password = required_password("password", Some(password))?;
        let user = self
            .user_store
            .get_user_by_username(username)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, username))?;
        self.user_store
            .set_password_credentials(PasswordCredentials::create(&user.id, &password)?)?;
        Ok(user)
    }

    /// Deletes a user by name. Admin tool only.
    pub fn delete_user_by_username(&self, username: &str) -> ServiceResult<User> {
        let user = self
            .user_store
            .get_user_by_username(username)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, username))?;
        self.user_store.delete_user(&user.id)?;
        info!("Deleted user {} ({})", user.id, user.username);
        Ok(user)
    }

    pub fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        self.user_store.get_user_by_username(username)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub fn list_users(&self) -> ServiceResult<Vec<UserWithFavorites>> {
        self.user_store
            .list_users()?
            .into_iter()
            .map(|user| {
                let favorites = self.user_store.get_favorites(&user.id)?;
                Ok(UserWithFavorites { user, favorites })
            })
            .collect()
    }

    pub fn stats(&self) -> ServiceResult<UserStats> {
        let total_users = self.user_store.count_users(None)?;
        let admin_users = self.user_store.count_users(Some(UserRole::Admin))?;
        let mut recent_users = self.user_store.list_users()?;
        recent_users.truncate(RECENT_USERS);
        Ok(UserStats {
            total_users,
            admin_users,
            regular_users: total_users - admin_users,
            recent_users,
        })
    }

    pub fn set_role(&self, user_id: &str, role: Option<&str>) -> ServiceResult<User> {
        let role = UserRole::from_str(role.map(str::trim).unwrap_or_default())?;
        let user_id = user_path_id(user_id)?;
        let user = self
            .user_store
            .update_user(
                &user_id,
                UserUpdate {
                    role: Some(role),
                    ..Default::default()
                },
            )?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, user_id))?;
        info!("User {} is now {}", user.username, user.role);
        Ok(user)
    }

    pub fn delete_user(&self, acting_user_id: &str, user_id: &str) -> ServiceResult<()> {
        let user_id = user_path_id(user_id)?;
        if user_id == acting_user_id {
            return Err(ServiceError::Validation(
                "Cannot delete your own account".to_string(),
            ));
        }
        if !self.user_store.delete_user(&user_id)? {
            return Err(ServiceError::not_found(EntityKind::User, user_id));
        }
        info!("Deleted user {}", user_id);
        Ok(())
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    fn existing_song_id(&self, song_id: &str) -> ServiceResult<String> {
        let candidate = song_id.trim();
        if !is_well_formed_id(candidate) {
            return Err(ServiceError::invalid("songId", song_id));
        }
        let song_id = candidate.to_ascii_lowercase();
        if self.catalog.get_song(&song_id)?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Song, song_id));
        }
        Ok(song_id)
    }

    /// Set union. Adding a song that is already a favorite succeeds.
    pub fn add_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<()> {
        let song_id = self.existing_song_id(song_id)?;
        if self.user_store.add_favorite(user_id, &song_id)? {
            debug!("User {} favorited song {}", user_id, song_id);
        }
        Ok(())
    }

    /// Set difference. Removing a song that is not a favorite succeeds.
    pub fn remove_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<()> {
        let song_id = song_id.trim().to_ascii_lowercase();
        if self.user_store.remove_favorite(user_id, &song_id)? {
            debug!("User {} unfavorited song {}", user_id, song_id);
        }
        Ok(())
    }

    /// Flips the favorite state and returns the new one.
    ///
    /// This reads and then writes without a guard: two concurrent toggles for
    /// the same user and song can both observe the same state, so the outcome is
    /// either state. Use [`Self::add_favorite`] and [`Self::remove_favorite`].
    #[deprecated(note = "racy read-modify-write, use add_favorite or remove_favorite")]
    pub fn toggle_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool> {
        let song_id = self.existing_song_id(song_id)?;
        if self.user_store.is_favorite(user_id, &song_id)? {
            self.user_store.remove_favorite(user_id, &song_id)?;
            Ok(false)
        } else {
            self.user_store.add_favorite(user_id, &song_id)?;
            Ok(true)
        }
    }

    /// Favorite songs, populated. Songs deleted since are left out.
    pub fn list_favorites(&self, user_id: &str) -> ServiceResult<Vec<ResolvedSong>> {
        let song_ids = self.user_store.get_favorites(user_id)?;
        let lookup = StoreLookup::new(self.catalog.as_ref(), self.user_store.as_ref());
        populate_one(&lookup, SongRefs(song_ids))
    }
}
