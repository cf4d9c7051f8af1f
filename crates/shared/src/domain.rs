use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One historical data-exposure incident as published by the breach service.
///
/// `name` is the identity key within a result set. Date fields are kept as the
/// opaque strings the service sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachRecord {
    pub name: String,
    pub title: String,
    pub domain: String,
    pub breach_date: String,
    pub added_date: String,
    pub modified_date: String,
    pub pwn_count: u64,
    pub description: String,
    pub logo_path: String,
    pub data_classes: Vec<String>,
    pub is_verified: bool,
    pub is_fabricated: bool,
    pub is_sensitive: bool,
    pub is_retired: bool,
    pub is_spam_list: bool,
    pub is_malware: bool,
    pub is_subscription_free: bool,
}

impl BreachRecord {
    /// `query_lower` must already be lower-cased; an empty query matches.
    pub fn matches_query(&self, query_lower: &str) -> bool {
        if query_lower.is_empty() {
            return true;
        }
        [&self.name, &self.title, &self.domain]
            .iter()
            .any(|field| field.to_lowercase().contains(query_lower))
    }

    pub fn data_class_summary(&self, limit: usize) -> String {
        let shown = self
            .data_classes
            .iter()
            .take(limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let hidden = self.data_classes.len().saturating_sub(limit);
        if hidden == 0 {
            shown
        } else if shown.is_empty() {
            format!("+{hidden} more")
        } else {
            format!("{shown} +{hidden} more")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    All,
    Verified,
    NotVerified,
}

impl FilterMode {
    pub fn admits(self, record: &BreachRecord) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Verified => record.is_verified,
            FilterMode::NotVerified => !record.is_verified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Verified => "verified",
            FilterMode::NotVerified => "not_verified",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter mode '{0}' (expected all, verified or unverified)")]
pub struct UnknownFilterMode(pub String);

impl FromStr for FilterMode {
    type Err = UnknownFilterMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "verified" => Ok(FilterMode::Verified),
            "not_verified" | "not-verified" | "unverified" => Ok(FilterMode::NotVerified),
            _ => Err(UnknownFilterMode(raw.to_string())),
        }
    }
}
