//! Source record → target payload transformation.
//!
//! Plain fields are copied under their target name. Reference fields are
//! rewritten as bindings to the equivalent target record, using the
//! strategy configured on their lookup mapping.

use serde_json::Value;
use tracing::debug;

use crate::automap::{IdentityKind, IdentityMaps};
use crate::config::{LookupMapping, LookupStrategy, MigrationConfig};
use crate::core::{binding_field_name, binding_value, extract_reference, normalize_id, Record};
use crate::error::{MigrateError, Result};
use crate::naming::CollectionNameResolver;

/// Builds target payloads. Reads the identity maps, never writes them.
pub struct RecordTransformer<'a> {
    identities: &'a IdentityMaps,
    names: &'a mut CollectionNameResolver,
}

impl<'a> RecordTransformer<'a> {
    pub fn new(identities: &'a IdentityMaps, names: &'a mut CollectionNameResolver) -> Self {
        Self { identities, names }
    }

    /// Shape `source` into a target payload according to `config`.
    pub async fn transform(&mut self, source: &Record, config: &MigrationConfig) -> Result<Record> {
        let mut payload = Record::new();

        for mapping in config.enabled_fields() {
            match config.lookup_for(&mapping.source_field) {
                None => match source.get(&mapping.source_field) {
                    Some(value) if !value.is_null() => {
                        payload.insert(mapping.target_field.clone(), value.clone());
                    }
                    _ => {}
                },
                Some(lookup) if lookup.strategy == LookupStrategy::Skip => {}
                Some(lookup) => {
                    if let Some(binding) = self.bind_reference(source, lookup).await? {
                        payload.insert(
                            binding_field_name(&mapping.target_field),
                            Value::String(binding),
                        );
                    }
                }
            }
        }

        Ok(payload)
    }

    /// Binding value for a reference field, or `None` when the record has no reference.
    async fn bind_reference(
        &mut self,
        source: &Record,
        lookup: &LookupMapping,
    ) -> Result<Option<String>> {
        let field = &lookup.source_field;
        let Some(reference) = extract_reference(source, field) else {
            return Ok(None);
        };

        let source_id = normalize_id(reference.raw_id());
        let target_id = self.resolve_id(lookup, &source_id);

        if target_id.is_empty() {
            return Err(MigrateError::transform(field, "reference identifier is empty"));
        }
        if target_id.contains(['/', '(', ')']) {
            return Err(MigrateError::transform(
                field,
                format!("identifier '{}' cannot be used in a binding", target_id),
            ));
        }

        let collection = self.names.resolve(&lookup.target_entity).await;
        Ok(Some(binding_value(&collection, &target_id)))
    }

    /// Apply the lookup strategy; unresolved identifiers pass through unchanged.
    fn resolve_id(&self, lookup: &LookupMapping, source_id: &str) -> String {
        let mapped = match lookup.strategy {
            LookupStrategy::Auto => IdentityKind::from_entity(&lookup.target_entity)
                .and_then(|kind| self.identities.get(kind, source_id)),
            LookupStrategy::Manual => manual_target(lookup, source_id),
            LookupStrategy::Skip => None,
        };

        match mapped {
            Some(target_id) => normalize_id(target_id),
            None => {
                debug!(
                    "{}: no mapping for {}, keeping source identifier",
                    lookup.source_field, source_id
                );
                source_id.to_string()
            }
        }
    }
}

/// Manual table entry for a normalized source id. Tables loaded from a file
/// are already normalized; tables built in code may not be.
fn manual_target<'l>(lookup: &'l LookupMapping, source_id: &str) -> Option<&'l str> {
    lookup
        .manual_mappings
        .get(source_id)
        .or_else(|| {
            lookup
                .manual_mappings
                .iter()
                .find(|(key, _)| normalize_id(key) == source_id)
                .map(|(_, target)| target)
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldMapping, FieldType, Operation};
    use crate::core::{EntityMetadata, Environment, MetadataLookup};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct NoMetadata;

    #[async_trait]
    impl MetadataLookup for NoMetadata {
        async fn entity_metadata(&self, _env: Environment, _entity: &str) -> Result<EntityMetadata> {
            Ok(EntityMetadata::default())
        }
    }

    fn lookup(field: &str, target: &str, strategy: LookupStrategy) -> LookupMapping {
        LookupMapping {
            source_field: field.to_string(),
            label: field.to_string(),
            target_entity: target.to_string(),
            strategy,
            manual_mappings: BTreeMap::new(),
        }
    }

    fn config(lookups: Vec<LookupMapping>) -> MigrationConfig {
        let mut field_mappings = vec![
            FieldMapping::same("name", FieldType::String),
            FieldMapping {
                source_field: "revenue".to_string(),
                target_field: "revenue".to_string(),
                enabled: false,
                field_type: FieldType::Money,
            },
        ];
        for l in &lookups {
            field_mappings.push(FieldMapping::same(l.source_field.clone(), FieldType::Lookup));
        }
        MigrationConfig {
            entity: "account".to_string(),
            field_mappings,
            lookup_mappings: lookups,
            batch_size: 10,
            operations: vec![Operation::Create],
            source_filter: None,
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn run(maps: &IdentityMaps, source: &Record, config: &MigrationConfig) -> Result<Record> {
        let mut names = CollectionNameResolver::new(Arc::new(NoMetadata));
        RecordTransformer::new(maps, &mut names)
            .transform(source, config)
            .await
    }

    #[tokio::test]
    async fn test_plain_fields_copied_and_nulls_skipped() {
        let cfg = config(vec![]);
        let mut cfg_renamed = cfg.clone();
        cfg_renamed.field_mappings[0].target_field = "title".to_string();

        let source = record(json!({"name": "Contoso", "revenue": 10}));
        let payload = run(&IdentityMaps::default(), &source, &cfg_renamed).await.unwrap();
        assert_eq!(payload.get("title"), Some(&json!("Contoso")));
        assert!(!payload.contains_key("revenue"));

        let source = record(json!({"name": null}));
        let payload = run(&IdentityMaps::default(), &source, &cfg).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_auto_lookup_resolved_and_fallback() {
        let cfg = config(vec![lookup("ownerid", "systemuser", LookupStrategy::Auto)]);
        let mut maps = IdentityMaps::default();
        maps.insert(IdentityKind::User, "s-1", "t-1");

        let mapped = record(json!({"_ownerid_value": "{S-1}"}));
        let payload = run(&maps, &mapped, &cfg).await.unwrap();
        assert_eq!(payload.get("ownerid@odata.bind"), Some(&json!("/systemusers(t-1)")));
        assert!(!payload.contains_key("ownerid"));

        let unmapped = record(json!({"ownerid": {"id": "s-2"}}));
        let payload = run(&maps, &unmapped, &cfg).await.unwrap();
        assert_eq!(payload.get("ownerid@odata.bind"), Some(&json!("/systemusers(s-2)")));
    }

    #[tokio::test]
    async fn test_manual_lookup() {
        let mut manual = lookup("parentaccountid", "account", LookupStrategy::Manual);
        manual.manual_mappings.insert("a-1".to_string(), "b-1".to_string());
        let cfg = config(vec![manual]);

        let source = record(json!({"parentaccountid": "{A-1}"}));
        let payload = run(&IdentityMaps::default(), &source, &cfg).await.unwrap();
        assert_eq!(
            payload.get("parentaccountid@odata.bind"),
            Some(&json!("/accounts(b-1)"))
        );
    }

    #[tokio::test]
    async fn test_manual_table_with_raw_keys() {
        let mut manual = lookup("parentaccountid", "account", LookupStrategy::Manual);
        manual.manual_mappings.insert("{P-1}".to_string(), "{Q-9}".to_string());
        let cfg = config(vec![manual]);

        let source = record(json!({"_parentaccountid_value": "{P-1}"}));
        let payload = run(&IdentityMaps::default(), &source, &cfg).await.unwrap();
        assert_eq!(
            payload.get("parentaccountid@odata.bind"),
            Some(&json!("/accounts(q-9)"))
        );
    }

    #[tokio::test]
    async fn test_skip_lookup_and_missing_reference_omitted() {
        let cfg = config(vec![
            lookup("ownerid", "systemuser", LookupStrategy::Skip),
            lookup("parentaccountid", "account", LookupStrategy::Auto),
        ]);
        let source = record(json!({"name": "x", "_ownerid_value": "s-1"}));
        let payload = run(&IdentityMaps::default(), &source, &cfg).await.unwrap();
        assert_eq!(payload.len(), 1);
        assert!(payload.contains_key("name"));
    }

    #[tokio::test]
    async fn test_unbindable_identifier_is_error() {
        let cfg = config(vec![lookup("ownerid", "systemuser", LookupStrategy::Auto)]);
        let source = record(json!({"ownerid": "a(b)"}));
        let err = run(&IdentityMaps::default(), &source, &cfg).await.unwrap_err();
        assert!(matches!(err, MigrateError::Transform { .. }));
    }
}
