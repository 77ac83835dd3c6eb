//! JSON snapshot files holding one environment's records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::{field_str, normalize_id, EntityMetadata, Record};
use crate::error::Result;

/// Every entity type stored for one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: BTreeMap<String, EntitySet>,
}

/// Metadata and records of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    #[serde(flatten)]
    pub metadata: EntityMetadata,

    #[serde(default)]
    pub records: Vec<Record>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot (atomic write: temp file, then rename).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Add an entity type with its records.
    pub fn with_entity(
        mut self,
        entity: &str,
        metadata: EntityMetadata,
        records: Vec<Value>,
    ) -> Self {
        let records = records
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        self.entities
            .insert(entity.to_string(), EntitySet { metadata, records });
        self
    }
}

impl EntitySet {
    /// Identifier attribute, defaulting to `<entity>id`.
    pub fn id_field(&self, entity: &str) -> String {
        self.metadata
            .primary_id_attribute
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| format!("{}id", entity))
    }

    /// Index of the record with the given identifier, compared normalized.
    pub fn position(&self, id_field: &str, id: &str) -> Option<usize> {
        let wanted = normalize_id(id);
        self.records.iter().position(|record| {
            field_str(record, id_field)
                .map(|value| normalize_id(&value) == wanted)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn test_snapshot_save_load() {
        let snapshot = Snapshot::default().with_entity(
            "account",
            EntityMetadata {
                primary_id_attribute: Some("accountid".into()),
                primary_name_attribute: Some("name".into()),
                collection_name: Some("accounts".into()),
            },
            vec![json!({"accountid": "a-1", "name": "Contoso"})],
        );

        let file = NamedTempFile::new().unwrap();
        snapshot.save(file.path()).unwrap();

        let loaded = Snapshot::load(file.path()).unwrap();
        assert_eq!(loaded, snapshot);
        let set = &loaded.entities["account"];
        assert_eq!(set.position("accountid", "{A-1}"), Some(0));
    }

    #[test]
    fn test_id_field_default() {
        let set = EntitySet::default();
        assert_eq!(set.id_field("contact"), "contactid");
    }

    #[test]
    fn test_flattened_metadata_format() {
        let raw = json!({
            "entities": {
                "team": {
                    "primary_id_attribute": "teamid",
                    "records": [{"teamid": "t-1", "name": "Sales"}]
                }
            }
        });
        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
        let team = &snapshot.entities["team"];
        assert_eq!(team.metadata.primary_id_attribute.as_deref(), Some("teamid"));
        assert_eq!(team.metadata.collection_name, None);
        assert_eq!(team.records.len(), 1);
    }
}
