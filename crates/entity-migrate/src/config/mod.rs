//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::validate_migration;

use crate::core::normalize_id;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        if config.source.name.is_empty() {
            config.source.name = "source".to_string();
        }
        if config.target.name.is_empty() {
            config.target.name = "target".to_string();
        }
        config.migration.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl MigrationConfig {
    /// Load a single entity migration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: MigrationConfig = serde_yaml::from_str(&content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Write the migration settings to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the migration settings.
    pub fn validate(&self) -> Result<()> {
        validation::validate_migration(self)
    }

    /// Normalize manual lookup tables so keys compare regardless of braces or case.
    pub fn normalize(&mut self) {
        for lookup in &mut self.lookup_mappings {
            lookup.manual_mappings = std::mem::take(&mut lookup.manual_mappings)
                .into_iter()
                .map(|(source, target)| (normalize_id(&source), normalize_id(&target)))
                .collect();
        }
    }

    /// Compute a SHA256 hash of the settings, recorded in run reports.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
source:
  snapshot: dev.json
target:
  name: prod
  snapshot: prod.json
migration:
  entity: account
  batch_size: 2
  operations: [create, update]
  field_mappings:
    - source_field: name
      target_field: name
    - source_field: ownerid
      target_field: ownerid
      field_type: owner
  lookup_mappings:
    - source_field: ownerid
      label: Owner
      target_entity: systemuser
      strategy: manual
      manual_mappings:
        "{AAA-1}": "{BBB-2}"
auto_map:
  users: true
"#;

    #[test]
    fn test_from_yaml_defaults_and_normalization() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.name, "source");
        assert_eq!(config.target.name, "prod");
        assert_eq!(config.migration.operations, vec![Operation::Create, Operation::Update]);
        assert!(config.migration.field_mappings[0].enabled);
        assert_eq!(config.migration.field_mappings[1].field_type, FieldType::Owner);

        let lookup = config.migration.lookup_for("ownerid").unwrap();
        assert_eq!(lookup.strategy, LookupStrategy::Manual);
        assert_eq!(lookup.manual_mappings.get("aaa-1").map(String::as_str), Some("bbb-2"));
        assert_eq!(config.auto_map.kinds().len(), 1);
    }

    #[test]
    fn test_invalid_batch_size_rejected() {
        let yaml = YAML.replace("batch_size: 2", "batch_size: 0");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_source_select_fields_include_identifier_and_shadow() {
        let config = Config::from_yaml(YAML).unwrap();
        let fields = config.migration.source_select_fields("accountid");
        assert_eq!(fields, vec!["accountid", "name", "ownerid", "_ownerid_value"]);
    }

    #[test]
    fn test_hash_is_stable() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.migration.hash(), config.migration.clone().hash());
        assert_eq!(config.migration.hash().len(), 64);
    }

    #[test]
    fn test_migration_save_load() {
        let config = Config::from_yaml(YAML).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        config.migration.save(file.path()).unwrap();

        let loaded = MigrationConfig::load(file.path()).unwrap();
        assert_eq!(loaded.entity, "account");
        assert_eq!(loaded.batch_size, 2);
        assert_eq!(loaded.field_mappings.len(), 2);
    }
}
