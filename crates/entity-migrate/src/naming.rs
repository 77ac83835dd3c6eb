//! Entity type → collection name resolution.
//!
//! The target environment's metadata is authoritative. When it cannot answer
//! (transport failure or an empty collection name) the name is derived with
//! [`fallback_collection_name`], which is pure and needs no network.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{Environment, MetadataLookup};

/// Collection names that do not follow the plain pluralization rule, or are
/// common enough to pin down explicitly.
const KNOWN_COLLECTIONS: &[(&str, &str)] = &[
    ("systemuser", "systemusers"),
    ("team", "teams"),
    ("businessunit", "businessunits"),
    ("account", "accounts"),
    ("contact", "contacts"),
    ("lead", "leads"),
    ("opportunity", "opportunities"),
    ("incident", "incidents"),
    ("activitypointer", "activitypointers"),
    ("activityparty", "activityparties"),
    ("annotation", "annotations"),
    ("appointment", "appointments"),
    ("campaign", "campaigns"),
    ("competitor", "competitors"),
    ("contract", "contracts"),
    ("email", "emails"),
    ("entitlement", "entitlements"),
    ("goal", "goals"),
    ("invoice", "invoices"),
    ("knowledgearticle", "knowledgearticles"),
    ("list", "lists"),
    ("phonecall", "phonecalls"),
    ("pricelevel", "pricelevels"),
    ("product", "products"),
    ("queue", "queues"),
    ("quote", "quotes"),
    ("salesorder", "salesorders"),
    ("task", "tasks"),
    ("territory", "territories"),
    ("transactioncurrency", "transactioncurrencies"),
    ("uom", "uoms"),
    ("uomschedule", "uomschedules"),
];

/// Derive a collection name without consulting metadata.
///
/// Known names come from a fixed table. Anything else ending in a consonant
/// followed by `y` swaps it for `ies` (`IES` for an upper-case `Y`); all other
/// names gain an `s`.
pub fn fallback_collection_name(entity: &str) -> String {
    if let Some((_, collection)) = KNOWN_COLLECTIONS.iter().find(|(name, _)| *name == entity) {
        return (*collection).to_string();
    }

    let mut chars = entity.chars().rev();
    if let (Some(last), Some(before)) = (chars.next(), chars.next()) {
        if last.eq_ignore_ascii_case(&'y') && before.is_ascii_alphabetic() && !is_vowel(before) {
            let suffix = if last == 'Y' { "IES" } else { "ies" };
            return format!("{}{}", &entity[..entity.len() - last.len_utf8()], suffix);
        }
    }

    format!("{}s", entity)
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Resolves target collection names, caching metadata answers.
pub struct CollectionNameResolver {
    metadata: Arc<dyn MetadataLookup>,
    cache: HashMap<String, String>,
}

impl CollectionNameResolver {
    pub fn new(metadata: Arc<dyn MetadataLookup>) -> Self {
        Self {
            metadata,
            cache: HashMap::new(),
        }
    }

    /// Collection name for `entity` in the target environment. Never fails.
    pub async fn resolve(&mut self, entity: &str) -> String {
        if let Some(name) = self.cache.get(entity) {
            return name.clone();
        }

        match self.metadata.entity_metadata(Environment::Target, entity).await {
            Ok(meta) => match meta.collection_name.filter(|n| !n.is_empty()) {
                Some(name) => {
                    debug!("{}: collection name {} from metadata", entity, name);
                    self.cache.insert(entity.to_string(), name.clone());
                    return name;
                }
                None => debug!("{}: metadata has no collection name", entity),
            },
            Err(e) => warn!("{}: collection name lookup failed: {}", entity, e),
        }

        fallback_collection_name(entity)
    }
}
