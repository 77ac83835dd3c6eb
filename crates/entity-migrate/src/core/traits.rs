//! Collaborator traits consumed by the migration engine.
//!
//! - [`MetadataLookup`]: entity schema facts (identifier, display name, collection)
//! - [`RecordAccess`]: filtered reads and single-record writes
//!
//! Both take the [`Environment`] explicitly so one implementation can serve
//! the source and the target side of a run.

use async_trait::async_trait;

use crate::error::Result;

use super::record::{EntityMetadata, Environment, QueryRequest, Record};

/// Entity schema lookup.
///
/// Implementations return `EntityMetadata` with absent fields for unknown
/// entities and reserve errors for transport failures.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Describe an entity type in an environment.
    async fn entity_metadata(&self, env: Environment, entity: &str) -> Result<EntityMetadata>;
}

/// Record reads and writes against an environment.
#[async_trait]
pub trait RecordAccess: Send + Sync {
    /// Run a filtered read.
    async fn query(&self, env: Environment, request: &QueryRequest) -> Result<Vec<Record>>;

    /// Fetch one record by identifier.
    ///
    /// Returns `MigrateError::NotFound` when no record has that identifier.
    async fn retrieve(
        &self,
        env: Environment,
        entity: &str,
        id: &str,
        fields: &[String],
    ) -> Result<Record>;

    /// Create a record and return its identifier.
    async fn create(&self, env: Environment, entity: &str, payload: &Record) -> Result<String>;

    /// Update the record with the given identifier.
    async fn update(&self, env: Environment, entity: &str, id: &str, payload: &Record)
        -> Result<()>;

    /// Delete the record with the given identifier.
    async fn delete(&self, env: Environment, entity: &str, id: &str) -> Result<()>;
}
