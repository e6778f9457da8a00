use std::{sync::Arc, time::Duration};

use abi::{Actor, ActorId, DbConfig, OfficeError};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{
    ActorDirectory, ApprovalGate, MemoryDirectory, MemoryStore, OfficeManager, OfficeStore,
    Operation, PgDirectory, PgStore,
};

impl OfficeManager {
    pub fn new(store: Arc<dyn OfficeStore>, directory: Arc<dyn ActorDirectory>) -> Self {
        Self { store, directory }
    }

    /// Postgres store and directory sharing one pool.
    pub async fn from_config(config: &DbConfig) -> Result<Self, OfficeError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.to_url())
            .await?;

        info!(
            host = %config.host,
            dbname = %config.dbname,
            max_connections = config.max_connections,
            "connected to postgres"
        );

        Ok(Self::new(
            Arc::new(PgStore::new(pool.clone(), config.lock_timeout_ms)),
            Arc::new(PgDirectory::new(pool)),
        ))
    }

    /// Everything in process memory; for development and tests.
    pub fn in_memory(directory: Arc<MemoryDirectory>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), directory)
    }

    /// Resolves the actor and runs the approval gate for `op`. Unknown
    /// actors are treated like inactive ones.
    pub(crate) async fn authorize(
        &self,
        actor_id: ActorId,
        op: Operation,
    ) -> Result<Actor, OfficeError> {
        let actor = self.directory.resolve(actor_id).await?.ok_or_else(|| {
            OfficeError::Forbidden(format!("actor {} is not in the directory", actor_id))
        })?;
        ApprovalGate::check(&actor, op)?;
        Ok(actor)
    }
}
