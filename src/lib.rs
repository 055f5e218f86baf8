//! Music Catalog Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod catalog_store;
pub mod config;
pub mod error;
pub mod media;
pub mod reference;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use catalog::CatalogManager;
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use error::{ServiceError, ServiceResult};
pub use media::{FileMediaStore, MediaStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use user::{SqliteUserStore, UserManager, UserRole, UserStore};
