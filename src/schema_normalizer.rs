use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use log::*;

use crate::csv_ingestor::Record;

/// Semantic category a dataset is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Catalog,
    Reviews,
    Pricing,
    Competitors,
    PerformanceSignals,
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown dataset role '{0}' (expected one of: catalog, reviews, pricing, competitors, performance_signals)")]
pub struct UnknownRole(pub String);

// canonical field -> accepted source headers, first match wins
type AliasTable = &'static [(&'static str, &'static [&'static str])];

const CATALOG_ALIASES: AliasTable = &[
    ("sku", &["sku", "product_id", "asin", "item_id"]),
    ("title", &["title", "product_name", "name"]),
    ("category", &["category", "product_category"]),
    ("brand", &["brand", "manufacturer"]),
];

const REVIEWS_ALIASES: AliasTable = &[
    ("sku", &["sku", "product_id"]),
    ("rating", &["rating", "stars", "review_rating", "score"]),
    ("text", &["text", "review", "review_text", "comment", "body"]),
    ("date", &["date", "review_date", "created_at"]),
];

const PRICING_ALIASES: AliasTable = &[
    ("sku", &["sku", "product_id", "asin"]),
    ("price", &["price", "current_price", "list_price", "amount"]),
    ("currency", &["currency", "currency_code"]),
    ("date", &["date", "price_date", "timestamp"]),
];

const COMPETITORS_ALIASES: AliasTable = &[
    ("competitor", &["competitor", "competitor_name", "seller", "brand"]),
    ("sku", &["sku", "product_id", "asin"]),
    ("price", &["price", "competitor_price"]),
    ("rating", &["rating", "stars"]),
];

const PERFORMANCE_SIGNALS_ALIASES: AliasTable = &[
    ("sku", &["sku", "product_id", "asin"]),
    ("date", &["date", "day", "period"]),
    ("sessions", &["sessions", "visits", "traffic"]),
    ("conversion_rate", &["conversion_rate", "cvr", "conversion"]),
    ("units_sold", &["units_sold", "units", "orders", "sales"]),
];

impl DatasetRole {
    pub const ALL: [DatasetRole; 5] = [
        DatasetRole::Catalog,
        DatasetRole::Reviews,
        DatasetRole::Pricing,
        DatasetRole::Competitors,
        DatasetRole::PerformanceSignals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetRole::Catalog => "catalog",
            DatasetRole::Reviews => "reviews",
            DatasetRole::Pricing => "pricing",
            DatasetRole::Competitors => "competitors",
            DatasetRole::PerformanceSignals => "performance_signals",
        }
    }

    pub fn aliases(&self) -> AliasTable {
        match self {
            DatasetRole::Catalog => CATALOG_ALIASES,
            DatasetRole::Reviews => REVIEWS_ALIASES,
            DatasetRole::Pricing => PRICING_ALIASES,
            DatasetRole::Competitors => COMPETITORS_ALIASES,
            DatasetRole::PerformanceSignals => PERFORMANCE_SIGNALS_ALIASES,
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            DatasetRole::Catalog => &["sku", "title"],
            DatasetRole::Reviews => &["rating", "text"],
            DatasetRole::Pricing => &["sku", "price"],
            DatasetRole::Competitors => &["competitor", "price"],
            DatasetRole::PerformanceSignals => &["sku", "date"],
        }
    }
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        DatasetRole::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOutcome {
    pub role: DatasetRole,
    pub records: Vec<Record>,
    pub missing_fields: Vec<String>,
}

impl NormalizationOutcome {
    /// One combined, non-blocking message naming the role and every missing
    /// required field.
    pub fn warning(&self) -> Option<String> {
        if self.missing_fields.is_empty() {
            return None;
        }
        Some(format!(
            "{} dataset is missing required fields: {}",
            self.role,
            self.missing_fields.join(", ")
        ))
    }
}

/// Copies alias columns into the role's canonical field names. Existing keys
/// are never removed or overwritten, so running this again for the same role
/// changes nothing.
pub fn normalize_record(record: &Record, role: DatasetRole) -> Record {
    let mut normalized = record.clone();
    for (canonical, aliases) in role.aliases() {
        if normalized.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = aliases.iter().find_map(|alias| record.get(*alias)) {
            normalized.insert(canonical.to_string(), value.clone());
        }
    }
    normalized
}

pub fn normalize_records(records: &[Record], role: DatasetRole) -> NormalizationOutcome {
    let records: Vec<Record> = records.iter().map(|r| normalize_record(r, role)).collect();

    // schema-level check: the first row stands in for the whole file
    let missing_fields: Vec<String> = role
        .required_fields()
        .iter()
        .filter(|field| records.first().map_or(true, |first| !first.contains_key(**field)))
        .map(|field| field.to_string())
        .collect();

    let outcome = NormalizationOutcome { role, records, missing_fields };
    if let Some(warning) = outcome.warning() {
        warn!("{}", warning);
    }
    outcome
}
