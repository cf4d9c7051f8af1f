use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{domain::BreachRecord, error::FetchError};

/// A breach entry as sent by the upstream service.
///
/// Every field is optional on the wire. Missing, null or wrong-typed values
/// fall back to the field default instead of failing the element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WireBreach {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub domain: String,
    #[serde(deserialize_with = "lenient_string")]
    pub breach_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub added_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub modified_date: String,
    #[serde(deserialize_with = "lenient_count")]
    pub pwn_count: u64,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub logo_path: String,
    #[serde(deserialize_with = "lenient_string_list")]
    pub data_classes: Vec<String>,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_verified: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_fabricated: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_sensitive: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_retired: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_spam_list: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_malware: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_subscription_free: bool,
}

impl From<WireBreach> for BreachRecord {
    fn from(wire: WireBreach) -> Self {
        Self {
            name: wire.name,
            title: wire.title,
            domain: wire.domain,
            breach_date: wire.breach_date,
            added_date: wire.added_date,
            modified_date: wire.modified_date,
            pwn_count: wire.pwn_count,
            description: wire.description,
            logo_path: wire.logo_path,
            data_classes: wire.data_classes,
            is_verified: wire.is_verified,
            is_fabricated: wire.is_fabricated,
            is_sensitive: wire.is_sensitive,
            is_retired: wire.is_retired,
            is_spam_list: wire.is_spam_list,
            is_malware: wire.is_malware,
            is_subscription_free: wire.is_subscription_free,
        }
    }
}

/// Decodes a breach-list response body.
///
/// The body must be a JSON array. Elements that are not objects are skipped.
pub fn decode_breach_list(body: &[u8]) -> Result<Vec<BreachRecord>, FetchError> {
    let items = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            return Err(FetchError::decode(format!(
                "expected a JSON array of breaches, got {}",
                json_kind(&other)
            )))
        }
        Err(err) => return Err(FetchError::decode(format!("invalid JSON body: {err}"))),
    };

    let total = items.len();
    let mut records = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!(index, kind = json_kind(&item), "skipping non-object breach entry");
            continue;
        }
        match serde_json::from_value::<WireBreach>(item) {
            Ok(wire) => records.push(BreachRecord::from(wire)),
            Err(err) => warn!(index, error = %err, "skipping undecodable breach entry"),
        }
    }
    debug!(total, decoded = records.len(), "decoded breach list");
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
