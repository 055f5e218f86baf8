use super::auth::PasswordCredentials;
use super::user_models::{NewUser, User, UserRole, UserUpdate};
use crate::error::ServiceResult;

pub trait UserCredentialsStore: Send + Sync {
    /// Returns Ok(None) if the user has no password set.
    fn get_password_credentials(&self, user_id: &str) -> ServiceResult<Option<PasswordCredentials>>;

    /// Inserts or replaces the user's password credentials.
    fn set_password_credentials(&self, credentials: PasswordCredentials) -> ServiceResult<()>;
}

pub trait UserFavoritesStore: Send + Sync {
    /// Adds `song_id` to the user's favorites. Adding a present song changes nothing.
    /// Returns whether the set changed.
    fn add_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool>;

    /// Removes `song_id` from the user's favorites. Returns whether the set changed.
    fn remove_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool>;

    fn is_favorite(&self, user_id: &str, song_id: &str) -> ServiceResult<bool>;

    /// Favorite song ids in the order they were added.
    fn get_favorites(&self, user_id: &str) -> ServiceResult<Vec<String>>;
}

pub trait UserStore: UserCredentialsStore + UserFavoritesStore + Send + Sync {
    /// Creates a user, failing with a conflict if the username is taken.
    fn create_user(&self, user: NewUser) -> ServiceResult<User>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: &str) -> ServiceResult<Option<User>>;

    /// The users among `user_ids` that exist, in no particular order.
    fn get_users(&self, user_ids: &[String]) -> ServiceResult<Vec<User>>;

    fn get_user_by_username(&self, username: &str) -> ServiceResult<Option<User>>;

    /// Returns Ok(None) if the user does not exist.
    fn update_user(&self, user_id: &str, update: UserUpdate) -> ServiceResult<Option<User>>;

    /// Deletes the user with their credentials and favorites.
    fn delete_user(&self, user_id: &str) -> ServiceResult<bool>;

    /// All users, newest first.
    fn list_users(&self) -> ServiceResult<Vec<User>>;

    fn count_users(&self, role: Option<UserRole>) -> ServiceResult<usize>;
}
