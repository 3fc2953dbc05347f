use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Database entity models (columns keep their Spanish names, aliased in queries)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Book {
    pub id: i64,
    pub legacy_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub location: Option<String>,
    pub stock: i32,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A book about to be catalogued; its legacy code is allocated on insert
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub location: String,
    #[serde(default)]
    pub stock: i32,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LocationRecord {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CodeSample {
    pub legacy_id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DuplicateCode {
    pub legacy_id: String,
    pub occurrences: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub total: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockBucket {
    pub bucket: String,
    pub total: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataQuality {
    pub missing_title: i64,
    pub missing_author: i64,
    pub missing_price: i64,
    pub missing_location: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Uniqueness {
    pub unique_ids: i64,
    pub total_records: i64,
}

impl Uniqueness {
    pub fn all_unique(&self) -> bool {
        self.unique_ids == self.total_records
    }
}

/// Rows touched by one location cleanup rule
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationStep {
    pub rule: String,
    pub rows_affected: u64,
}
