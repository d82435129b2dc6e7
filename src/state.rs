use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuditLogger, AuthService, SeaOrmAuthService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub audit: AuditLogger,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::open_with_pool_options(
            &config.database.url,
            config.security.clone(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        let audit = AuditLogger::new(store.clone());

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            audit.clone(),
            config.server.session_ttl_minutes,
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            auth_service,
            audit,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
