use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, SchemaError};
use crate::platform::RepoRef;

/// One fetched descriptor file: its repository-relative path and parsed contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub path: String,
    pub contents: Value,
}

/// The typed view of a validated descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub priority: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "empty_object")]
    pub meta: Value,
    #[serde(default = "empty_array")]
    pub events: Value,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

fn default_active() -> bool {
    true
}

fn empty_object() -> Value {
    json!({})
}

fn empty_array() -> Value {
    json!([])
}

impl CatalogEntry {
    /// Fails when the contents do not fit the shape the engine needs, which a
    /// permissive custom schema may let through.
    pub fn from_descriptor(descriptor: &Descriptor) -> Result<Self> {
        serde_json::from_value(descriptor.contents.clone()).map_err(|e| {
            SchemaError::Invalid {
                path: descriptor.path.clone(),
                errors: vec![e.to_string()],
            }
            .into()
        })
    }
}

/// Renders a starter descriptor for a repository that has none yet. The
/// output is JSON5 with a leading comment and satisfies the bundled schema.
pub fn starter_descriptor(repo: &RepoRef, catalog_url: Option<&str>) -> String {
    let document = json!({
        "name": repo.name,
        "type": "application",
        "priority": 5,
        "description": repo.description.clone().unwrap_or_default(),
        "meta": {
            "github": repo.url,
            "issues": format!("{}/issues", repo.url),
        },
    });

    let origin = match catalog_url {
        Some(url) => format!("This file was created automatically by the catalog at: {url}"),
        None => "This file was created automatically by the catalog.".to_string(),
    };

    format!(
        "/*\n{origin}\nThe file is JSON5 (https://json5.org/), so it can contain comments and trailing commas.\nPriority runs from 1 (highest) to 10 (lowest).\n*/\n{document:#}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults() {
        let descriptor = Descriptor {
            path: "catalog.json".to_string(),
            contents: json!({"name": "billing", "type": "application", "priority": 2}),
        };
        let entry = CatalogEntry::from_descriptor(&descriptor).unwrap();

        assert_eq!(entry.name, "billing");
        assert_eq!(entry.priority, 2);
        assert_eq!(entry.description, "");
        assert!(entry.active);
        assert_eq!(entry.meta, json!({}));
        assert_eq!(entry.events, json!([]));
        assert!(entry.dependencies.is_empty());
    }

    #[test]
    fn test_entry_shape_mismatch() {
        let descriptor = Descriptor {
            path: "service.json".to_string(),
            contents: json!({"name": "billing", "type": "application", "priority": "high"}),
        };
        let err = CatalogEntry::from_descriptor(&descriptor).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Schema(SchemaError::Invalid { ref path, .. }) if path == "service.json"
        ));
    }

    #[test]
    fn test_starter_descriptor_is_json5() {
        let repo = RepoRef {
            owner: "acme".to_string(),
            name: "billing".to_string(),
            url: "https://github.com/acme/billing".to_string(),
            description: Some("Invoices".to_string()),
            archived: false,
        };
        let text = starter_descriptor(&repo, Some("https://catalog.example.com"));
        assert!(text.starts_with("/*"));
        assert!(text.contains("https://catalog.example.com"));

        let parsed: Value = json5::from_str(&text).unwrap();
        assert_eq!(parsed["name"], "billing");
        assert_eq!(parsed["priority"], 5);
        assert_eq!(parsed["meta"]["issues"], "https://github.com/acme/billing/issues");
    }
}
