//! SurrealDB connection management.
//!
//! The endpoint scheme picks the engine: `ws://`/`wss://` for a remote
//! server, `mem://` for an embedded in-memory database.

use sessionstore_core::key::RecordKey;
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::{StoreConfig, SurrealSessionStore};

/// Root credentials for servers that enforce authentication.
#[derive(Debug, Clone)]
pub struct RootCredentials {
    pub username: String,
    pub password: String,
}

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., `ws://127.0.0.1:8000` or `mem://`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// `None` skips sign-in, as an embedded engine has no users.
    pub credentials: Option<RootCredentials>,
    /// Behaviour of stores opened through this connection.
    pub store: StoreConfig,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "auth".into(),
            database: "sessions".into(),
            credentials: Some(RootCredentials {
                username: "root".into(),
                password: "root".into(),
            }),
            store: StoreConfig::default(),
        }
    }
}

/// A connection to SurrealDB that hands out session stores.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
    store: StoreConfig,
}

impl DbManager {
    /// Connect, sign in when credentials are configured, and select the
    /// configured namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = any::connect(config.url.as_str()).await?;

        if let Some(credentials) = &config.credentials {
            db.signin(Root {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self {
            db,
            store: config.store.clone(),
        })
    }

    /// Migrate the schema and return a store over this connection.
    pub async fn session_store<Id, UserId>(
        &self,
    ) -> Result<SurrealSessionStore<Any, Id, UserId>, DbError>
    where
        Id: RecordKey,
        UserId: RecordKey,
    {
        let store = SurrealSessionStore::init(self.db.clone()).await?;
        info!("Session store ready");
        Ok(store.with_config(self.store.clone()))
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
