//! Snapshot-backed record store.
//!
//! [`MemoryStore`] keeps one [`Snapshot`] per environment in memory and
//! implements both [`MetadataLookup`] and [`RecordAccess`] over them. The
//! command-line tool loads the snapshots from disk and writes the target back
//! after a run.
//!
//! Reference bindings in write payloads (`<field>@odata.bind`) are stored as
//! the shadow field `_<field>_value`, the shape reads return them in.

mod filter;
mod snapshot;

pub use filter::Filter;
pub use snapshot::{EntitySet, Snapshot};

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::core::{
    field_str, normalize_id, parse_binding, shadow_field_name, EntityMetadata, Environment,
    MetadataLookup, QueryRequest, Record, RecordAccess, BINDING_SUFFIX,
};
use crate::error::{MigrateError, Result};

/// In-memory source and target environments.
pub struct MemoryStore {
    source: RwLock<Snapshot>,
    target: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new(source: Snapshot, target: Snapshot) -> Self {
        Self {
            source: RwLock::new(source),
            target: RwLock::new(target),
        }
    }

    /// Load both environments from snapshot files.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(source: P, target: Q) -> Result<Self> {
        Ok(Self::new(Snapshot::load(source)?, Snapshot::load(target)?))
    }

    fn env(&self, env: Environment) -> &RwLock<Snapshot> {
        match env {
            Environment::Source => &self.source,
            Environment::Target => &self.target,
        }
    }

    /// Copy of an environment's current contents.
    pub async fn snapshot(&self, env: Environment) -> Snapshot {
        self.env(env).read().await.clone()
    }

    /// Write an environment's current contents to a file.
    pub async fn save<P: AsRef<Path>>(&self, env: Environment, path: P) -> Result<()> {
        self.env(env).read().await.save(path)
    }
}

/// Keep only `fields` (all fields when empty).
fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    fields
        .iter()
        .filter_map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

/// Merge a write payload into a stored record.
fn apply_payload(record: &mut Record, payload: &Record) -> Result<()> {
    for (key, value) in payload {
        match key.strip_suffix(BINDING_SUFFIX) {
            Some(field) => {
                let binding = value.as_str().and_then(parse_binding).ok_or_else(|| {
                    MigrateError::RecordAccess(format!("malformed binding for {}: {}", field, value))
                })?;
                record.insert(shadow_field_name(field), Value::String(binding.1.to_string()));
            }
            None => {
                record.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl MetadataLookup for MemoryStore {
    async fn entity_metadata(&self, env: Environment, entity: &str) -> Result<EntityMetadata> {
        let snapshot = self.env(env).read().await;
        Ok(match snapshot.entities.get(entity) {
            Some(set) => EntityMetadata {
                primary_id_attribute: Some(set.id_field(entity)),
                ..set.metadata.clone()
            },
            None => EntityMetadata::default(),
        })
    }
}

#[async_trait]
impl RecordAccess for MemoryStore {
    async fn query(&self, env: Environment, request: &QueryRequest) -> Result<Vec<Record>> {
        let filter = request.filter.as_deref().map(Filter::parse).transpose()?;
        let snapshot = self.env(env).read().await;
        let Some(set) = snapshot.entities.get(&request.entity) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Record> = set
            .records
            .iter()
            .filter(|r| filter.as_ref().map(|f| f.matches(r)).unwrap_or(true))
            .collect();

        if let Some(ref field) = request.order_by {
            rows.sort_by_key(|r| field_str(r, field));
        }
        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }

        debug!("{} {}: query returned {} records", env, request.entity, rows.len());
        Ok(rows.into_iter().map(|r| project(r, &request.select)).collect())
    }

    async fn retrieve(
        &self,
        env: Environment,
        entity: &str,
        id: &str,
        fields: &[String],
    ) -> Result<Record> {
        let snapshot = self.env(env).read().await;
        let set = snapshot
            .entities
            .get(entity)
            .ok_or_else(|| MigrateError::not_found(entity, id))?;
        let pos = set
            .position(&set.id_field(entity), id)
            .ok_or_else(|| MigrateError::not_found(entity, id))?;
        Ok(project(&set.records[pos], fields))
    }

    async fn create(&self, env: Environment, entity: &str, payload: &Record) -> Result<String> {
        let mut snapshot = self.env(env).write().await;
        let set = snapshot.entities.entry(entity.to_string()).or_default();
        let id_field = set.id_field(entity);

        let id = field_str(payload, &id_field)
            .map(|id| normalize_id(&id))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if set.position(&id_field, &id).is_some() {
            return Err(MigrateError::RecordAccess(format!(
                "a record with id {} already exists in {}",
                id, entity
            )));
        }

        let mut record = Record::new();
        apply_payload(&mut record, payload)?;
        record.insert(id_field, Value::String(id.clone()));
        set.records.push(record);

        debug!("{} {}: created {}", env, entity, id);
        Ok(id)
    }

    async fn update(
        &self,
        env: Environment,
        entity: &str,
        id: &str,
        payload: &Record,
    ) -> Result<()> {
        let mut snapshot = self.env(env).write().await;
        let set = snapshot
            .entities
            .get_mut(entity)
            .ok_or_else(|| MigrateError::not_found(entity, id))?;
        let pos = set
            .position(&set.id_field(entity), id)
            .ok_or_else(|| MigrateError::not_found(entity, id))?;

        apply_payload(&mut set.records[pos], payload)?;
        debug!("{} {}: updated {}", env, entity, id);
        Ok(())
    }

    async fn delete(&self, env: Environment, entity: &str, id: &str) -> Result<()> {
        let mut snapshot = self.env(env).write().await;
        let set = snapshot
            .entities
            .get_mut(entity)
            .ok_or_else(|| MigrateError::not_found(entity, id))?;
        let pos = set
            .position(&set.id_field(entity), id)
            .ok_or_else(|| MigrateError::not_found(entity, id))?;

        set.records.remove(pos);
        debug!("{} {}: deleted {}", env, entity, id);
        Ok(())
    }
}
