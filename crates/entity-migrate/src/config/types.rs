//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::automap::IdentityKind;

/// Largest batch a run may request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Root configuration structure used by the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Environment records are read from.
    pub source: EnvironmentConfig,

    /// Environment records are written to.
    pub target: EnvironmentConfig,

    /// Migration behavior configuration.
    pub migration: MigrationConfig,

    /// Identity kinds to auto-map before the run.
    #[serde(default)]
    pub auto_map: AutoMapConfig,
}

/// One environment of the platform, backed by a JSON snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Display name used in logs (default: "source" / "target").
    #[serde(default)]
    pub name: String,

    /// Path of the snapshot file holding the environment's records.
    pub snapshot: PathBuf,
}

/// Which system identity kinds to auto-map before migrating.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AutoMapConfig {
    #[serde(default)]
    pub users: bool,

    #[serde(default)]
    pub teams: bool,

    #[serde(default)]
    pub business_units: bool,
}

impl AutoMapConfig {
    /// Enabled kinds in a fixed order (users, teams, business units).
    pub fn kinds(&self) -> Vec<IdentityKind> {
        let mut kinds = Vec::new();
        if self.users {
            kinds.push(IdentityKind::User);
        }
        if self.teams {
            kinds.push(IdentityKind::Team);
        }
        if self.business_units {
            kinds.push(IdentityKind::BusinessUnit);
        }
        kinds
    }
}

/// Settings for migrating one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Logical entity type name, shared by source and target.
    pub entity: String,

    /// Field copies from source to target.
    pub field_mappings: Vec<FieldMapping>,

    /// Resolution rules for reference fields.
    #[serde(default)]
    pub lookup_mappings: Vec<LookupMapping>,

    /// Records per batch (default: 10, max: 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Write operations, executed in this order (default: [create]).
    #[serde(default = "default_operations")]
    pub operations: Vec<Operation>,

    /// Filter expression applied when fetching source records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<String>,
}

impl MigrationConfig {
    /// Enabled field mappings in declaration order.
    pub fn enabled_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings.iter().filter(|m| m.enabled)
    }

    /// Lookup rule governing a source field, if any.
    pub fn lookup_for(&self, source_field: &str) -> Option<&LookupMapping> {
        self.lookup_mappings
            .iter()
            .find(|l| l.source_field == source_field)
    }

    /// Source fields a candidate query must select so that every enabled
    /// mapping can be transformed. The identifier field is always included.
    pub fn source_select_fields(&self, id_field: &str) -> Vec<String> {
        let mut fields = vec![id_field.to_string()];
        for mapping in self.enabled_fields() {
            let field = &mapping.source_field;
            if !fields.contains(field) {
                fields.push(field.clone());
            }
            if self.lookup_for(field).is_some() {
                let shadow = crate::core::shadow_field_name(field);
                if !fields.contains(&shadow) {
                    fields.push(shadow);
                }
            }
        }
        fields
    }
}

/// Copy rule for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,

    pub target_field: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub field_type: FieldType,
}

impl FieldMapping {
    /// Enabled mapping with identical source and target names.
    pub fn same(field: impl Into<String>, field_type: FieldType) -> Self {
        let field = field.into();
        Self {
            source_field: field.clone(),
            target_field: field,
            enabled: true,
            field_type,
        }
    }
}

/// Declared attribute type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Memo,
    Integer,
    BigInt,
    Decimal,
    Double,
    Money,
    Boolean,
    DateTime,
    Picklist,
    Uniqueidentifier,
    Lookup,
    Customer,
    Owner,
    #[serde(other)]
    Other,
}

impl FieldType {
    /// True for attribute types that hold a reference to another record.
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Lookup | FieldType::Customer | FieldType::Owner)
    }
}

/// Resolution rule for one reference field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupMapping {
    /// Source reference field name.
    pub source_field: String,

    /// Human label shown in previews and logs.
    #[serde(default)]
    pub label: String,

    /// Entity type the reference points at in the target.
    pub target_entity: String,

    #[serde(default)]
    pub strategy: LookupStrategy,

    /// Source id -> target id table used by the manual strategy.
    /// Keys and values are normalized when the config is loaded.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manual_mappings: BTreeMap<String, String>,
}

/// How a reference value is carried to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// Use the auto-mapped identity dictionary for the target kind.
    #[default]
    Auto,

    /// Use the mapping table configured on the lookup.
    Manual,

    /// Leave the field out of the payload.
    Skip,
}

/// Write operation applied to each approved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

// Default value functions for serde
fn default_batch_size() -> usize {
    10
}

fn default_operations() -> Vec<Operation> {
    vec![Operation::Create]
}

fn default_true() -> bool {
    true
}
