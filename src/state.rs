use std::sync::Arc;

use crate::auth::password::Hasher;
use crate::auth::session::SessionKeys;
use crate::config::{AppConfig, DatabaseConfig};
use crate::storage::{MemoryStorage, PgStorage, Storage};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub hasher: Hasher,
    pub sessions: SessionKeys,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let storage: Arc<dyn Storage> = match &config.database {
            DatabaseConfig::Memory => {
                tracing::warn!("using in-memory storage; data is lost on exit");
                Arc::new(MemoryStorage::new())
            }
            db => Arc::new(PgStorage::connect(db).await?),
        };
        Self::from_parts(storage, &config)
    }

    pub fn from_parts(storage: Arc<dyn Storage>, config: &AppConfig) -> anyhow::Result<Self> {
        let hasher = Hasher::new(&config.password)?;
        let sessions = SessionKeys::new(&config.session);
        Ok(Self {
            storage,
            hasher,
            sessions,
        })
    }

    /// Isolated state over a fresh in-memory store with cheap hashing.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{PasswordConfig, SessionConfig};

        let config = AppConfig {
            database: DatabaseConfig::Memory,
            session: SessionConfig {
                secret: "test".into(),
                ttl_minutes: 5,
                cookie_secure: false,
            },
            password: PasswordConfig {
                m_cost: 8,
                t_cost: 1,
                p_cost: 1,
            },
            host: "127.0.0.1".into(),
            port: 0,
        };
        Self::from_parts(Arc::new(MemoryStorage::new()), &config).expect("test state")
    }
}
