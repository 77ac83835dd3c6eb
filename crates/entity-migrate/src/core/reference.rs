//! Reference ("lookup") value shapes and the binding wire convention.
//!
//! A source record can carry a reference in three shapes. They are tried in
//! a fixed priority order:
//!
//! 1. the shadow field `_<field>_value` holding the raw identifier
//! 2. the field itself holding the identifier as a plain string
//! 3. the field itself holding an object with the identifier under one of
//!    [`NESTED_ID_KEYS`]
//!
//! Writes address the referenced record with `<field>@odata.bind` set to
//! `/<collection>(<id>)`.

use serde_json::Value;

use super::record::Record;

/// Suffix marking a reference binding in a write payload.
pub const BINDING_SUFFIX: &str = "@odata.bind";

/// Property names tried, in order, on a nested reference object.
pub const NESTED_ID_KEYS: [&str; 5] = ["id", "Id", "ID", "value", "guid"];

/// Where a reference identifier was found on a source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceValue {
    /// `_<field>_value` companion field.
    Shadow(String),
    /// Field value is the identifier itself.
    Plain(String),
    /// Field value is an object; `key` names the property holding the identifier.
    Nested { key: &'static str, id: String },
}

impl ReferenceValue {
    /// Raw identifier, as found.
    pub fn raw_id(&self) -> &str {
        match self {
            ReferenceValue::Shadow(id) | ReferenceValue::Plain(id) => id,
            ReferenceValue::Nested { id, .. } => id,
        }
    }
}

/// Name of the shadow field carrying the raw identifier of `field`.
pub fn shadow_field_name(field: &str) -> String {
    format!("_{}_value", field)
}

/// Name of the payload key binding `field` to another record.
pub fn binding_field_name(field: &str) -> String {
    format!("{}{}", field, BINDING_SUFFIX)
}

/// Binding value addressing `id` in `collection`.
pub fn binding_value(collection: &str, id: &str) -> String {
    format!("/{}({})", collection, id)
}

/// Split a binding value back into `(collection, id)`.
pub fn parse_binding(value: &str) -> Option<(&str, &str)> {
    let rest = value.strip_prefix('/')?;
    let open = rest.find('(')?;
    let id = rest[open + 1..].strip_suffix(')')?;
    Some((&rest[..open], id))
}

/// Strip enclosing braces and whitespace, and case-fold an identifier.
///
/// Idempotent: normalizing a normalized identifier returns it unchanged.
pub fn normalize_id(id: &str) -> String {
    id.trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace())
        .to_lowercase()
}

/// Find the reference identifier for `field`, if the record carries one.
pub fn extract_reference(record: &Record, field: &str) -> Option<ReferenceValue> {
    if let Some(id) = non_blank(record.get(&shadow_field_name(field))) {
        return Some(ReferenceValue::Shadow(id));
    }

    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(ReferenceValue::Plain(s.clone())),
        Value::Object(obj) => NESTED_ID_KEYS.iter().find_map(|key| {
            non_blank(obj.get(*key)).map(|id| ReferenceValue::Nested { key: *key, id })
        }),
        _ => None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_strips_braces_and_case() {
        assert_eq!(normalize_id("{ABC-1}"), "abc-1");
        assert_eq!(normalize_id("abc-1"), "abc-1");
        assert_eq!(normalize_id("{ABC-1}"), normalize_id("abc-1"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["{A1B2}", "  {x}  ", "{ {Y} }", "plain", "{}", ""] {
            let once = normalize_id(raw);
            assert_eq!(normalize_id(&once), once);
        }
    }

    #[test]
    fn test_shadow_field_wins() {
        let r = record(json!({
            "_ownerid_value": "shadow-id",
            "ownerid": {"id": "nested-id"}
        }));
        assert_eq!(
            extract_reference(&r, "ownerid"),
            Some(ReferenceValue::Shadow("shadow-id".into()))
        );
    }

    #[test]
    fn test_plain_string_reference() {
        let r = record(json!({"ownerid": "plain-id"}));
        assert_eq!(
            extract_reference(&r, "ownerid"),
            Some(ReferenceValue::Plain("plain-id".into()))
        );
    }

    #[test]
    fn test_nested_reference_key_order() {
        let r = record(json!({"ownerid": {"value": "v-id", "Id": "upper-id"}}));
        assert_eq!(
            extract_reference(&r, "ownerid"),
            Some(ReferenceValue::Nested {
                key: "Id",
                id: "upper-id".into()
            })
        );
    }

    #[test]
    fn test_missing_or_null_reference() {
        assert_eq!(extract_reference(&record(json!({})), "ownerid"), None);
        assert_eq!(
            extract_reference(&record(json!({"ownerid": null, "_ownerid_value": null})), "ownerid"),
            None
        );
        assert_eq!(
            extract_reference(&record(json!({"ownerid": {"name": "x"}})), "ownerid"),
            None
        );
        assert_eq!(extract_reference(&record(json!({"ownerid": 42})), "ownerid"), None);
    }

    #[test]
    fn test_binding_round_trip() {
        let value = binding_value("systemusers", "abc-1");
        assert_eq!(value, "/systemusers(abc-1)");
        assert_eq!(parse_binding(&value), Some(("systemusers", "abc-1")));
        assert_eq!(parse_binding("systemusers(abc-1)"), None);
        assert_eq!(binding_field_name("ownerid"), "ownerid@odata.bind");
    }
}
