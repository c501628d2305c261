//! Access to the hosted source-code platform.
//!
//! Credentials are resolved by whoever constructs a [`Platform`]; the
//! synchronization engine only ever sees authenticated handles.

mod github;
#[cfg(any(test, feature = "testing"))]
mod memory;

pub use github::GithubPlatform;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryPlatform;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// An organization visible to the integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgRef {
    pub login: String,
    pub url: String,
    #[serde(default)]
    pub raw: Value,
}

/// A repository visible to the integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl RepoRef {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// An authenticated handle on one repository.
pub trait RepositoryHandle: Send + Sync {
    fn full_name(&self) -> String;

    /// Returns the raw bytes of `path`, or `Error::FileNotFound` if the
    /// repository has no such file.
    fn get_contents(&self, path: &str) -> Result<Vec<u8>>;
}

pub trait Platform: Send + Sync {
    fn list_organizations(&self) -> Result<Vec<OrgRef>>;

    /// Lists repositories under `organization`. The same repository may be
    /// returned more than once when it is reachable through several
    /// installation paths.
    fn list_repositories(&self, organization: &str) -> Result<Vec<RepoRef>>;

    /// Fails with `Error::NoRepository` if the repository does not exist or
    /// is not accessible.
    fn repository(&self, owner: &str, name: &str) -> Result<Box<dyn RepositoryHandle>>;
}
