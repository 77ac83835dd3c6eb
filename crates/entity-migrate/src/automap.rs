//! Identity auto-mapping for system entity kinds.
//!
//! Users, teams and business units exist independently in every environment,
//! so references to them must be translated. Each kind is matched with a
//! priority cascade; the first rule that hits decides the target record and
//! the confidence of the match. Source records without a match are left out.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{field_str, non_empty_str, normalize_id, Environment, QueryRequest, Record, RecordAccess};
use crate::error::Result;

/// System entity kinds with auto-mapped identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    User,
    Team,
    BusinessUnit,
}

impl IdentityKind {
    /// Kind addressed by a lookup's target entity name, if it is a system kind.
    pub fn from_entity(entity: &str) -> Option<Self> {
        match entity.to_ascii_lowercase().as_str() {
            "systemuser" | "user" => Some(IdentityKind::User),
            "team" => Some(IdentityKind::Team),
            "businessunit" | "organizationalunit" => Some(IdentityKind::BusinessUnit),
            _ => None,
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            IdentityKind::User => "systemuser",
            IdentityKind::Team => "team",
            IdentityKind::BusinessUnit => "businessunit",
        }
    }

    pub fn id_field(&self) -> &'static str {
        match self {
            IdentityKind::User => "systemuserid",
            IdentityKind::Team => "teamid",
            IdentityKind::BusinessUnit => "businessunitid",
        }
    }

    fn select_fields(&self) -> &'static [&'static str] {
        match self {
            IdentityKind::User => &[
                "systemuserid",
                "domainname",
                "internalemailaddress",
                "fullname",
            ],
            IdentityKind::Team => &["teamid", "name", "teamtype"],
            IdentityKind::BusinessUnit => &["businessunitid", "name"],
        }
    }
}

impl std::fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entity())
    }
}

/// Quality of an auto-mapped match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// One auto-mapped identity, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMappingResult {
    pub source_id: String,
    pub target_id: String,
    pub display_name: String,
    pub confidence: Confidence,
    /// Which rule produced the match, e.g. "domain name".
    pub matched_by: String,
}

/// Source id → target id dictionaries, one per identity kind.
///
/// Keys and values are normalized identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentityMaps {
    users: HashMap<String, String>,
    teams: HashMap<String, String>,
    business_units: HashMap<String, String>,
}

impl IdentityMaps {
    fn map(&self, kind: IdentityKind) -> &HashMap<String, String> {
        match kind {
            IdentityKind::User => &self.users,
            IdentityKind::Team => &self.teams,
            IdentityKind::BusinessUnit => &self.business_units,
        }
    }

    fn map_mut(&mut self, kind: IdentityKind) -> &mut HashMap<String, String> {
        match kind {
            IdentityKind::User => &mut self.users,
            IdentityKind::Team => &mut self.teams,
            IdentityKind::BusinessUnit => &mut self.business_units,
        }
    }

    /// Target id for a normalized source id.
    pub fn get(&self, kind: IdentityKind, source_id: &str) -> Option<&str> {
        self.map(kind).get(source_id).map(String::as_str)
    }

    pub fn len(&self, kind: IdentityKind) -> usize {
        self.map(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.teams.is_empty() && self.business_units.is_empty()
    }

    /// Record a single mapping.
    pub fn insert(&mut self, kind: IdentityKind, source_id: &str, target_id: &str) {
        self.map_mut(kind)
            .insert(normalize_id(source_id), normalize_id(target_id));
    }

    /// Record every result of an auto-mapping pass. Existing entries are overwritten.
    pub fn absorb(&mut self, kind: IdentityKind, results: &[AutoMappingResult]) {
        for result in results {
            self.insert(kind, &result.source_id, &result.target_id);
        }
    }
}

/// Index target records by a key, keeping the first record seen per key.
fn index_by<F>(records: &[Record], id_field: &str, key: F) -> HashMap<String, String>
where
    F: Fn(&Record) -> Option<String>,
{
    let mut index = HashMap::new();
    for record in records {
        if let (Some(k), Some(id)) = (key(record), field_str(record, id_field)) {
            index.entry(k).or_insert_with(|| normalize_id(&id));
        }
    }
    index
}

fn text_key(field: &'static str) -> impl Fn(&Record) -> Option<String> {
    move |record| non_empty_str(record, field).map(str::to_string)
}

fn team_key(record: &Record) -> Option<String> {
    let name = non_empty_str(record, "name")?;
    let team_type = field_str(record, "teamtype")?;
    Some(format!("{}\u{1f}{}", name, team_type))
}

/// Match users: domain name, then email, then full name.
pub fn match_users(source: &[Record], target: &[Record]) -> Vec<AutoMappingResult> {
    let id_field = IdentityKind::User.id_field();
    let tiers = [
        ("domainname", "domain name", Confidence::High),
        ("internalemailaddress", "email address", Confidence::High),
        ("fullname", "full name", Confidence::Medium),
    ];
    let indexes: Vec<_> = tiers
        .iter()
        .map(|(field, _, _)| index_by(target, id_field, text_key(field)))
        .collect();

    let mut results = Vec::new();
    for record in source {
        let Some(source_id) = field_str(record, id_field) else {
            continue;
        };
        let display_name = non_empty_str(record, "fullname")
            .or_else(|| non_empty_str(record, "domainname"))
            .unwrap_or_default()
            .to_string();

        let hit = tiers.iter().zip(&indexes).find_map(|((field, rule, confidence), index)| {
            let key = non_empty_str(record, field)?;
            index.get(key).map(|target_id| (target_id.clone(), *rule, *confidence))
        });

        if let Some((target_id, rule, confidence)) = hit {
            results.push(AutoMappingResult {
                source_id: normalize_id(&source_id),
                target_id,
                display_name,
                confidence,
                matched_by: rule.to_string(),
            });
        }
    }
    results
}

/// Match teams on name and team type together.
pub fn match_teams(source: &[Record], target: &[Record]) -> Vec<AutoMappingResult> {
    let id_field = IdentityKind::Team.id_field();
    let index = index_by(target, id_field, team_key);

    source
        .iter()
        .filter_map(|record| {
            let source_id = field_str(record, id_field)?;
            let target_id = index.get(&team_key(record)?)?;
            Some(AutoMappingResult {
                source_id: normalize_id(&source_id),
                target_id: target_id.clone(),
                display_name: non_empty_str(record, "name").unwrap_or_default().to_string(),
                confidence: Confidence::High,
                matched_by: "name and team type".to_string(),
            })
        })
        .collect()
}

/// Match business units on name.
pub fn match_business_units(source: &[Record], target: &[Record]) -> Vec<AutoMappingResult> {
    let id_field = IdentityKind::BusinessUnit.id_field();
    let index = index_by(target, id_field, text_key("name"));

    source
        .iter()
        .filter_map(|record| {
            let source_id = field_str(record, id_field)?;
            let name = non_empty_str(record, "name")?;
            let target_id = index.get(name)?;
            Some(AutoMappingResult {
                source_id: normalize_id(&source_id),
                target_id: target_id.clone(),
                display_name: name.to_string(),
                confidence: Confidence::High,
                matched_by: "name".to_string(),
            })
        })
        .collect()
}

/// Reads both environments and runs the matcher for a kind.
pub struct AutoMapper {
    records: Arc<dyn RecordAccess>,
}

impl AutoMapper {
    pub fn new(records: Arc<dyn RecordAccess>) -> Self {
        Self { records }
    }

    /// Fetch both sides of `kind` and match them.
    pub async fn run(&self, kind: IdentityKind) -> Result<Vec<AutoMappingResult>> {
        let request = QueryRequest::new(kind.entity())
            .select(kind.select_fields().iter().copied())
            .order_by(kind.id_field());

        let source = self.records.query(Environment::Source, &request).await?;
        let target = self.records.query(Environment::Target, &request).await?;
        debug!(
            "{}: auto-mapping {} source against {} target records",
            kind,
            source.len(),
            target.len()
        );

        let results = match kind {
            IdentityKind::User => match_users(&source, &target),
            IdentityKind::Team => match_teams(&source, &target),
            IdentityKind::BusinessUnit => match_business_units(&source, &target),
        };

        info!(
            "{}: auto-mapped {} of {} source records",
            kind,
            results.len(),
            source.len()
        );
        Ok(results)
    }
}
