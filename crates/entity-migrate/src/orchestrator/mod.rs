//! Migration engine - batch workflow coordinator.

mod progress;

pub use progress::{batch_count, MigrationProgress, MigrationRecord, RecordStatus};

use crate::automap::{AutoMapper, AutoMappingResult, IdentityKind, IdentityMaps};
use crate::config::{MigrationConfig, Operation};
use crate::core::{
    field_str, non_empty_str, normalize_id, Environment, MetadataLookup, Record, RecordAccess,
};
use crate::error::{MigrateError, Result};
use crate::naming::CollectionNameResolver;
use crate::transform::RecordTransformer;
use chrono::{DateTime, Utc};
use progress::ProgressTracker;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Migration engine.
///
/// Owns the identity dictionaries for its lifetime; they only grow through
/// the `auto_map_*` calls and are read-only while records migrate.
pub struct MigrationEngine {
    metadata: Arc<dyn MetadataLookup>,
    records: Arc<dyn RecordAccess>,
    identities: IdentityMaps,
    names: CollectionNameResolver,
}

/// Identifier and display attributes of the migrated entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKeys {
    pub id_field: String,
    pub name_field: String,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Entity type that was migrated.
    pub entity: String,

    /// SHA256 of the migration settings used.
    pub config_hash: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Final progress, including every record outcome.
    pub progress: MigrationProgress,
}

impl MigrationReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn has_failures(&self) -> bool {
        self.progress.failed > 0
    }
}

enum Outcome {
    Written(Option<String>),
    Skipped,
}

/// Operations to run for one record, in requested order.
///
/// With more than one operation requested, `create` is dropped when the
/// record already exists and `update` is requested, and `update` is dropped
/// when it is absent and `create` is requested. A single operation always runs.
pub fn plan_operations(requested: &[Operation], exists: bool) -> Vec<Operation> {
    if requested.len() <= 1 {
        return requested.to_vec();
    }
    let has = |op: Operation| requested.contains(&op);

    requested
        .iter()
        .copied()
        .filter(|op| match op {
            Operation::Create => !(exists && has(Operation::Update)),
            Operation::Update => exists || !has(Operation::Create),
            Operation::Delete => true,
        })
        .collect()
}

impl MigrationEngine {
    pub fn new(metadata: Arc<dyn MetadataLookup>, records: Arc<dyn RecordAccess>) -> Self {
        let names = CollectionNameResolver::new(metadata.clone());
        Self {
            metadata,
            records,
            identities: IdentityMaps::default(),
            names,
        }
    }

    /// Identity dictionaries built so far.
    pub fn identities(&self) -> &IdentityMaps {
        &self.identities
    }

    /// Auto-map one identity kind and merge the matches into the dictionaries.
    pub async fn auto_map(&mut self, kind: IdentityKind) -> Result<Vec<AutoMappingResult>> {
        let results = AutoMapper::new(self.records.clone()).run(kind).await?;
        self.identities.absorb(kind, &results);
        Ok(results)
    }

    pub async fn auto_map_users(&mut self) -> Result<Vec<AutoMappingResult>> {
        self.auto_map(IdentityKind::User).await
    }

    pub async fn auto_map_teams(&mut self) -> Result<Vec<AutoMappingResult>> {
        self.auto_map(IdentityKind::Team).await
    }

    pub async fn auto_map_business_units(&mut self) -> Result<Vec<AutoMappingResult>> {
        self.auto_map(IdentityKind::BusinessUnit).await
    }

    /// Resolve the source entity's identifier and display attributes.
    ///
    /// Fails with a setup error when metadata is unreachable or has no
    /// identifier attribute. A missing display attribute falls back to the
    /// identifier.
    pub async fn source_keys(&self, entity: &str) -> Result<EntityKeys> {
        let meta = self
            .metadata
            .entity_metadata(Environment::Source, entity)
            .await
            .map_err(|e| MigrateError::setup(entity, format!("metadata lookup failed: {}", e)))?;

        let id_field = meta
            .primary_id_attribute
            .filter(|f| !f.is_empty())
            .ok_or_else(|| MigrateError::setup(entity, "primary identifier attribute is unknown"))?;

        let name_field = match meta.primary_name_attribute.filter(|f| !f.is_empty()) {
            Some(name) => name,
            None => {
                debug!("{}: no display attribute, using {}", entity, id_field);
                id_field.clone()
            }
        };

        Ok(EntityKeys {
            id_field,
            name_field,
        })
    }

    /// Migrate the approved records in batches.
    ///
    /// `on_progress` receives an owned snapshot at the start, at every batch
    /// boundary, before and after every record, and once more at the end.
    /// Record failures are isolated; only configuration and setup errors
    /// abort the call, and they do so before the first snapshot.
    pub async fn migrate_records<F>(
        &mut self,
        config: &MigrationConfig,
        approved: &[Record],
        mut on_progress: F,
    ) -> Result<MigrationReport>
    where
        F: FnMut(MigrationProgress),
    {
        config.validate()?;
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let entity = config.entity.as_str();

        let keys = self.source_keys(entity).await?;
        let mut tracker = ProgressTracker::new(approved.len(), config.batch_size);

        let operations: Vec<String> = config.operations.iter().map(|op| op.to_string()).collect();
        info!(
            "Starting migration run {}: {} records of {} in {} batches ({})",
            run_id,
            approved.len(),
            entity,
            batch_count(approved.len(), config.batch_size),
            operations.join(", ")
        );
        on_progress(tracker.snapshot());

        for (index, batch) in approved.chunks(config.batch_size).enumerate() {
            tracker.start_batch(index + 1);
            debug!("{}: batch {} ({} records)", entity, index + 1, batch.len());
            on_progress(tracker.snapshot());

            for record in batch {
                let source_id = field_str(record, &keys.id_field)
                    .map(|id| normalize_id(&id))
                    .unwrap_or_default();
                let display_name = non_empty_str(record, &keys.name_field)
                    .map(str::to_string)
                    .or_else(|| field_str(record, &keys.name_field))
                    .unwrap_or_else(|| source_id.clone());

                let slot = tracker.begin(source_id.clone(), display_name);
                on_progress(tracker.snapshot());

                match self.process_record(config, &keys, &source_id, record).await {
                    Ok(Outcome::Written(target_id)) => tracker.succeed(slot, target_id),
                    Ok(Outcome::Skipped) => {
                        debug!("{} {}: no operation applies, skipped", entity, source_id);
                        tracker.skip(slot);
                    }
                    Err(e) => {
                        warn!("{} {}: {}", entity, source_id, e);
                        tracker.fail(slot, e.to_string());
                    }
                }
                on_progress(tracker.snapshot());
            }
        }

        tracker.finish();
        let progress = tracker.snapshot();
        on_progress(progress.clone());

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        info!(
            "Migration {} of {}: {} succeeded, {} failed, {} skipped in {:.1}s",
            run_id,
            entity,
            progress.successful,
            progress.failed,
            progress.skipped,
            duration_seconds
        );

        Ok(MigrationReport {
            run_id,
            entity: config.entity.clone(),
            config_hash: config.hash(),
            started_at,
            completed_at,
            duration_seconds,
            progress,
        })
    }

    /// Transform, check existence and write one record.
    async fn process_record(
        &mut self,
        config: &MigrationConfig,
        keys: &EntityKeys,
        source_id: &str,
        record: &Record,
    ) -> Result<Outcome> {
        if source_id.is_empty() {
            return Err(MigrateError::transform(
                &keys.id_field,
                "record has no identifier",
            ));
        }

        let exists = self.exists(&config.entity, keys, source_id).await;
        let operations = plan_operations(&config.operations, exists);
        if operations.is_empty() {
            return Ok(Outcome::Skipped);
        }

        // Deletes only need the identifier
        let writes = operations
            .iter()
            .any(|op| matches!(op, Operation::Create | Operation::Update));
        let payload = if writes {
            RecordTransformer::new(&self.identities, &mut self.names)
                .transform(record, config)
                .await?
        } else {
            Record::new()
        };

        let entity = config.entity.as_str();
        let mut target_id = None;
        for op in operations {
            match op {
                Operation::Create => {
                    let mut create = payload.clone();
                    create.insert(keys.id_field.clone(), Value::String(source_id.to_string()));
                    let id = self
                        .records
                        .create(Environment::Target, entity, &create)
                        .await?;
                    target_id = Some(normalize_id(&id));
                }
                Operation::Update => {
                    self.records
                        .update(Environment::Target, entity, source_id, &payload)
                        .await?;
                    target_id = Some(source_id.to_string());
                }
                Operation::Delete => {
                    self.records
                        .delete(Environment::Target, entity, source_id)
                        .await?;
                    target_id = Some(source_id.to_string());
                }
            }
            debug!("{} {}: {} done", entity, source_id, op);
        }

        Ok(Outcome::Written(target_id))
    }

    /// Whether the target already holds the record. Lookup failures count as absent.
    async fn exists(&self, entity: &str, keys: &EntityKeys, source_id: &str) -> bool {
        let fields = [keys.id_field.clone()];
        match self
            .records
            .retrieve(Environment::Target, entity, source_id, &fields)
            .await
        {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!("{} {}: existence check failed, assuming absent: {}", entity, source_id, e);
                false
            }
        }
    }
}
