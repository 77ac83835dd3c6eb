//! Configuration validation.

use super::{Config, MigrationConfig, Operation, MAX_BATCH_SIZE};
use crate::error::{MigrateError, Result};
use std::collections::HashSet;
use tracing::warn;

/// Validate the root configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.snapshot.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.snapshot is required".into()));
    }
    if config.target.snapshot.as_os_str().is_empty() {
        return Err(MigrateError::Config("target.snapshot is required".into()));
    }

    // Cannot migrate into the environment being read
    if config.source.snapshot == config.target.snapshot {
        return Err(MigrateError::Config(
            "source and target cannot be the same environment".into(),
        ));
    }

    validate_migration(&config.migration)
}

/// Validate the settings for one entity migration.
pub fn validate_migration(migration: &MigrationConfig) -> Result<()> {
    if migration.entity.trim().is_empty() {
        return Err(MigrateError::Config("migration.entity is required".into()));
    }
    if migration.field_mappings.is_empty() {
        return Err(MigrateError::Config(
            "migration.field_mappings must contain at least one mapping".into(),
        ));
    }
    if migration.batch_size == 0 || migration.batch_size > MAX_BATCH_SIZE {
        return Err(MigrateError::Config(format!(
            "migration.batch_size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, migration.batch_size
        )));
    }
    if migration.operations.is_empty() {
        return Err(MigrateError::Config(
            "migration.operations must name at least one operation".into(),
        ));
    }

    let mut seen: HashSet<Operation> = HashSet::new();
    for op in &migration.operations {
        if !seen.insert(*op) {
            return Err(MigrateError::Config(format!(
                "migration.operations lists '{}' more than once",
                op
            )));
        }
    }

    for mapping in &migration.field_mappings {
        if mapping.source_field.is_empty() || mapping.target_field.is_empty() {
            return Err(MigrateError::Config(
                "field mappings need both source_field and target_field".into(),
            ));
        }
    }

    for mapping in migration.enabled_fields() {
        if mapping.field_type.is_reference() && migration.lookup_for(&mapping.source_field).is_none() {
            warn!(
                "{}: reference field has no lookup mapping and will be copied as-is",
                mapping.source_field
            );
        }
    }

    for lookup in &migration.lookup_mappings {
        if lookup.target_entity.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "lookup '{}' has no target_entity",
                lookup.source_field
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AutoMapConfig, EnvironmentConfig, FieldMapping, FieldType, LookupMapping, LookupStrategy,
    };
    use std::collections::BTreeMap;

    fn valid_config() -> Config {
        Config {
            source: EnvironmentConfig {
                name: "dev".to_string(),
                snapshot: "dev.json".into(),
            },
            target: EnvironmentConfig {
                name: "prod".to_string(),
                snapshot: "prod.json".into(),
            },
            migration: MigrationConfig {
                entity: "account".to_string(),
                field_mappings: vec![FieldMapping::same("name", FieldType::String)],
                lookup_mappings: vec![],
                batch_size: 10,
                operations: vec![Operation::Create],
                source_filter: None,
            },
            auto_map: AutoMapConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_same_environment_rejected() {
        let mut config = valid_config();
        config.target.snapshot = config.source.snapshot.clone();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_entity() {
        let mut config = valid_config();
        config.migration.entity = " ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_no_field_mappings() {
        let mut config = valid_config();
        config.migration.field_mappings.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
        config.migration.batch_size = MAX_BATCH_SIZE + 1;
        assert!(validate(&config).is_err());
        config.migration.batch_size = MAX_BATCH_SIZE;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_operations_required_and_unique() {
        let mut config = valid_config();
        config.migration.operations.clear();
        assert!(validate(&config).is_err());
        config.migration.operations = vec![Operation::Create, Operation::Create];
        assert!(validate(&config).is_err());
        config.migration.operations = vec![Operation::Update, Operation::Create];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_lookup_requires_target_entity() {
        let mut config = valid_config();
        config.migration.lookup_mappings.push(LookupMapping {
            source_field: "ownerid".to_string(),
            label: "Owner".to_string(),
            target_entity: String::new(),
            strategy: LookupStrategy::Auto,
            manual_mappings: BTreeMap::new(),
        });
        assert!(validate(&config).is_err());
    }
}
