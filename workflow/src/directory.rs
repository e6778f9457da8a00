use std::{collections::HashMap, sync::RwLock};

use abi::{Actor, ActorId, OfficeError};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

/// Read-only view of the employee directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn resolve(&self, id: ActorId) -> Result<Option<Actor>, OfficeError>;
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    actors: RwLock<HashMap<ActorId, Actor>>,
}

impl MemoryDirectory {
    pub fn new(actors: impl IntoIterator<Item = Actor>) -> Self {
        Self {
            actors: RwLock::new(actors.into_iter().map(|a| (a.id, a)).collect()),
        }
    }

    /// Adds or replaces an actor, e.g. after a role change upstream.
    pub fn upsert(&self, actor: Actor) -> Result<(), OfficeError> {
        self.actors
            .write()
            .map_err(|_| OfficeError::Unknown)?
            .insert(actor.id, actor);
        Ok(())
    }
}

#[async_trait]
impl ActorDirectory for MemoryDirectory {
    async fn resolve(&self, id: ActorId) -> Result<Option<Actor>, OfficeError> {
        let actors = self.actors.read().map_err(|_| OfficeError::Unknown)?;
        Ok(actors.get(&id).cloned())
    }
}

/// Reads `office.employees`, which the employee directory maintains.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: i64,
    role: String,
    supervisor_id: Option<i64>,
    active: bool,
}

#[async_trait]
impl ActorDirectory for PgDirectory {
    async fn resolve(&self, id: ActorId) -> Result<Option<Actor>, OfficeError> {
        let row: Option<EmployeeRow> = sqlx::query_as(
            "SELECT id, role, supervisor_id, active FROM office.employees WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Actor::try_from).transpose()
    }
}

impl TryFrom<EmployeeRow> for Actor {
    type Error = OfficeError;

    /// A role the core does not know is bad directory data, not bad input.
    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|e: OfficeError| {
            OfficeError::DbError(sqlx::Error::ColumnDecode {
                index: "role".to_string(),
                source: Box::new(e),
            })
        })?;

        Ok(Actor {
            id: row.id,
            role,
            supervisor_id: row.supervisor_id,
            active: row.active,
        })
    }
}
