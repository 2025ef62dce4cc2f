use std::sync::Arc;

use tracing::warn;

use crate::auth::{
    jwt::JwtKeys,
    password::PasswordHasher,
    repo::{MemoryUserStore, PgUserStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;
use crate::db;
use crate::tasks::repo::{MemoryTaskStore, PgTaskStore, TaskStore};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (users, tasks) = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                (
                    Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>,
                    Arc::new(PgTaskStore::new(pool)) as Arc<dyn TaskStore>,
                )
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory stores, data is lost on restart");
                (
                    Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>,
                    Arc::new(MemoryTaskStore::new()) as Arc<dyn TaskStore>,
                )
            }
        };

        Self::from_parts(&config, users, tasks)
    }

    pub fn from_parts(
        config: &AppConfig,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(&config.password)?;
        let keys = JwtKeys::new(&config.jwt)?;
        let auth = AuthService::new(users, hasher, keys)?;
        Ok(Self { auth, tasks })
    }

    /// In-memory state with cheap hashing parameters, for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, PasswordConfig};

        let config = AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        };

        Self::from_parts(
            &config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryTaskStore::new()),
        )
        .expect("fake state")
    }
}
