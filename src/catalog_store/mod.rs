//! Catalog persistence: artists, songs, albums and playlists.

mod models;
mod schema;
mod store;
mod trait_def;
pub mod validation;

pub use models::*;
pub(crate) use models::datetime_from_millis;
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogStore;
