//! # entity-migrate
//!
//! Record migration between two environments of a schema-defined record store.
//!
//! This library moves the approved records of one entity type from a source
//! environment to a target environment with support for:
//!
//! - **Field mapping** with per-field enable flags and renames
//! - **Reference rewriting** so lookup fields point at the target's records
//! - **Identity auto-mapping** for users, teams and business units
//! - **Create/update decisions** based on whether the record already exists
//! - **Batched progress** with per-record failure isolation
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use entity_migrate::{Config, Environment, MemoryStore, MigrationEngine, QueryRequest, RecordAccess};
//!
//! #[tokio::main]
//! async fn main() -> entity_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = Arc::new(MemoryStore::load(&config.source.snapshot, &config.target.snapshot)?);
//!
//!     let mut engine = MigrationEngine::new(store.clone(), store.clone());
//!     engine.auto_map_users().await?;
//!
//!     let records = store
//!         .query(Environment::Source, &QueryRequest::new(config.migration.entity.as_str()))
//!         .await?;
//!     let report = engine
//!         .migrate_records(&config.migration, &records, |p| {
//!             println!("{}/{} processed", p.processed, p.total)
//!         })
//!         .await?;
//!     println!("{} records failed", report.progress.failed);
//!     Ok(())
//! }
//! ```

pub mod automap;
pub mod config;
pub mod core;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod store;
pub mod transform;

// Re-exports for convenient access
pub use automap::{AutoMappingResult, Confidence, IdentityKind, IdentityMaps};
pub use config::{
    Config, FieldMapping, FieldType, LookupMapping, LookupStrategy, MigrationConfig, Operation,
};
pub use crate::core::{EntityMetadata, Environment, MetadataLookup, QueryRequest, Record, RecordAccess};
pub use error::{MigrateError, Result};
pub use naming::{fallback_collection_name, CollectionNameResolver};
pub use orchestrator::{
    batch_count, plan_operations, MigrationEngine, MigrationProgress, MigrationRecord,
    MigrationReport, RecordStatus,
};
pub use store::{MemoryStore, Snapshot};
pub use transform::RecordTransformer;
