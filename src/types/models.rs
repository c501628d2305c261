use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LogLevel, TargetKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub auto_add_sources: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub raw_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub slug: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// Returns the `(owner, repo)` pair encoded in the source URL.
    #[must_use]
    pub fn repository(&self) -> Option<(&str, &str)> {
        crate::store::slug::repository_path(&self.url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "type")]
    pub service_type: String,
    /// 1 is the highest priority, 10 the lowest.
    pub priority: i64,
    pub active: bool,
    pub source_id: String,
    pub meta: Value,
    pub events: Value,
    /// The last synchronized descriptor, verbatim.
    pub raw_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: i64,
    pub target_kind: TargetKind,
    pub target_slug: String,
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

