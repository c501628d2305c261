use std::fs;
use std::path::Path;

use serde_json::Value;

use super::Descriptor;
use crate::error::{Error, Result, SchemaError};

const BUNDLED_SCHEMA: &str = include_str!("service.schema.json");

/// Validates descriptor contents against a JSON Schema.
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn from_value(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| Error::Config(format!("invalid JSON schema: {e}")))?;
        Ok(Self { validator })
    }

    /// The schema shipped with the crate.
    pub fn bundled() -> Result<Self> {
        let schema: Value = serde_json::from_str(BUNDLED_SCHEMA)
            .map_err(|e| Error::Config(format!("bundled schema is not JSON: {e}")))?;
        Self::from_value(&schema)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let schema: Value = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("schema {} is not JSON: {e}", path.display())))?;
        Self::from_value(&schema)
    }

    /// Loads the schema at `path`, or the bundled one when no path is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::bundled(),
        }
    }

    #[must_use]
    pub fn bundled_source() -> &'static str {
        BUNDLED_SCHEMA
    }

    /// Every validation failure in `contents`, one message each.
    #[must_use]
    pub fn errors(&self, contents: &Value) -> Vec<String> {
        self.validator
            .iter_errors(contents)
            .map(|e| e.to_string())
            .collect()
    }

    pub fn validate(&self, descriptor: &Descriptor) -> Result<()> {
        let errors = self.errors(&descriptor.contents);
        if errors.is_empty() {
            return Ok(());
        }
        Err(SchemaError::Invalid {
            path: descriptor.path.clone(),
            errors,
        }
        .into())
    }

    /// Validates every descriptor, stopping at the first invalid one.
    pub fn validate_all(&self, descriptors: &[Descriptor]) -> Result<()> {
        descriptors.iter().try_for_each(|d| self.validate(d))
    }
}
