use axum::extract::FromRef;

use crate::catalog::CatalogManager;
use crate::media::MediaStore;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCatalogManager = Arc<CatalogManager>;
pub type GuardedUserManager = Arc<UserManager>;
pub type GuardedMediaStore = Arc<dyn MediaStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub catalog_manager: GuardedCatalogManager,
    pub user_manager: GuardedUserManager,
    pub media_store: GuardedMediaStore,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        catalog_manager: CatalogManager,
        user_manager: UserManager,
        media_store: GuardedMediaStore,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            catalog_manager: Arc::new(catalog_manager),
            user_manager: Arc::new(user_manager),
            media_store,
        }
    }
}

impl FromRef<ServerState> for GuardedCatalogManager {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedMediaStore {
    fn from_ref(input: &ServerState) -> Self {
        input.media_store.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
