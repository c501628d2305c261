use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "catalog.toml";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub data_dir: PathBuf,
    /// JSON Schema every descriptor must satisfy. The bundled schema is used
    /// when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
    /// Upper bound on sources synchronized at the same time.
    pub max_concurrency: usize,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// Never written back to disk; prefer `CATALOG_GITHUB_TOKEN`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Also list repositories granted to an app installation token, which may
    /// surface repositories already seen through the organization listing.
    pub include_installation_repos: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            schema_path: None,
            max_concurrency: 4,
            github: GithubConfig::default(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            token: None,
            include_installation_repos: false,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Loads `explicit` if given, otherwise `catalog.toml` in `data_dir` when it
    /// exists, otherwise defaults. The data directory always comes from the
    /// caller, then environment overrides are applied.
    pub fn resolve(data_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let default_path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if default_path.exists() => Self::load(&default_path)?,
            None => Self::default(),
        };
        config.data_dir = data_dir.to_path_buf();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("CATALOG_GITHUB_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.github.token = Some(token.trim().to_string());
        }
        if let Some(url) = lookup("CATALOG_GITHUB_API_URL").filter(|u| !u.trim().is_empty()) {
            self.github.api_url = url.trim().to_string();
        }
        if let Some(schema) = lookup("CATALOG_SCHEMA").filter(|s| !s.trim().is_empty()) {
            self.schema_path = Some(PathBuf::from(schema.trim()));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if !self.github.api_url.starts_with("http://") && !self.github.api_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "github.api_url must be an http(s) URL: {}",
                self.github.api_url
            )));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("could not serialize configuration: {e}")))?;
        fs::write(self.config_path(), content)?;
        Ok(())
    }
}
