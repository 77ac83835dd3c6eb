//! Core abstractions shared across the migration system.
//!
//! - [`record`]: record, environment and query types
//! - [`reference`]: reference value shapes, identifier normalization, bindings
//! - [`traits`]: the metadata and record-access seams the engine depends on

pub mod record;
pub mod reference;
pub mod traits;

pub use record::{field_str, non_empty_str, EntityMetadata, Environment, QueryRequest, Record};
pub use reference::{
    binding_field_name, binding_value, extract_reference, normalize_id, parse_binding,
    shadow_field_name, ReferenceValue, BINDING_SUFFIX,
};
pub use traits::{MetadataLookup, RecordAccess};
