pub mod auth;
mod sqlite_user_store;
mod user_manager;
pub mod user_models;
mod user_store;

pub use auth::{Claims, CredentialsHasher, PasswordCredentials, TokenIssuer};
pub use sqlite_user_store::SqliteUserStore;
pub use user_manager::{LoginResponse, ProfileForm, UserManager};
pub use user_models::{Sex, User, UserRole, UserStats, UserSummary, UserWithFavorites};
pub use user_store::{UserCredentialsStore, UserFavoritesStore, UserStore};
