//! In-memory [`Platform`] for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use super::{OrgRef, Platform, RepoRef, RepositoryHandle};
use crate::error::{Error, Result};

#[derive(Default)]
struct MemoryState {
    organizations: Vec<OrgRef>,
    repositories: Vec<RepoRef>,
    inaccessible: HashSet<String>,
    files: HashMap<(String, String), Vec<u8>>,
    transient: HashSet<(String, String)>,
    fetches: Vec<(String, String)>,
}

#[derive(Clone, Default)]
pub struct MemoryPlatform {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_organization(&self, login: &str) -> OrgRef {
        let org = OrgRef {
            login: login.to_string(),
            url: format!("https://github.com/{login}"),
            raw: json!({"login": login}),
        };
        lock(&self.state).organizations.push(org.clone());
        org
    }

    /// Registers a repository. Adding the same repository twice makes it show
    /// up twice in listings, like a repository reachable through two
    /// installations.
    pub fn add_repository(&self, owner: &str, name: &str) -> RepoRef {
        let repo = RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
            url: format!("https://github.com/{owner}/{name}"),
            description: None,
            archived: false,
        };
        lock(&self.state).repositories.push(repo.clone());
        repo
    }

    /// Makes a listed repository fail to open, as if access had been revoked.
    pub fn revoke_repository(&self, full_name: &str) {
        lock(&self.state).inaccessible.insert(full_name.to_string());
    }

    pub fn put_file(&self, full_name: &str, path: &str, contents: &str) {
        lock(&self.state).files.insert(
            (full_name.to_string(), path.to_string()),
            contents.as_bytes().to_vec(),
        );
    }

    pub fn put_bytes(&self, full_name: &str, path: &str, contents: Vec<u8>) {
        lock(&self.state)
            .files
            .insert((full_name.to_string(), path.to_string()), contents);
    }

    pub fn remove_file(&self, full_name: &str, path: &str) {
        lock(&self.state)
            .files
            .remove(&(full_name.to_string(), path.to_string()));
    }

    /// Makes every fetch of `path` fail with a transient error.
    pub fn fail_file(&self, full_name: &str, path: &str) {
        lock(&self.state)
            .transient
            .insert((full_name.to_string(), path.to_string()));
    }

    /// Paths fetched from `full_name`, in order, including misses.
    #[must_use]
    pub fn fetches(&self, full_name: &str) -> Vec<String> {
        lock(&self.state)
            .fetches
            .iter()
            .filter(|(repo, _)| repo == full_name)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

impl Platform for MemoryPlatform {
    fn list_organizations(&self) -> Result<Vec<OrgRef>> {
        Ok(lock(&self.state).organizations.clone())
    }

    fn list_repositories(&self, organization: &str) -> Result<Vec<RepoRef>> {
        let state = lock(&self.state);
        if !state
            .organizations
            .iter()
            .any(|o| o.login.eq_ignore_ascii_case(organization))
        {
            return Err(Error::NoRepository(organization.to_string()));
        }
        Ok(state
            .repositories
            .iter()
            .filter(|r| r.owner.eq_ignore_ascii_case(organization))
            .cloned()
            .collect())
    }

    fn repository(&self, owner: &str, name: &str) -> Result<Box<dyn RepositoryHandle>> {
        let full_name = format!("{owner}/{name}");
        let state = lock(&self.state);
        let known = state
            .repositories
            .iter()
            .any(|r| r.full_name().eq_ignore_ascii_case(&full_name));
        if !known || state.inaccessible.contains(&full_name) {
            return Err(Error::NoRepository(full_name));
        }

        Ok(Box::new(MemoryRepository {
            state: Arc::clone(&self.state),
            full_name,
        }))
    }
}

struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    full_name: String,
}

impl RepositoryHandle for MemoryRepository {
    fn full_name(&self) -> String {
        self.full_name.clone()
    }

    fn get_contents(&self, path: &str) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        let key = (self.full_name.clone(), path.to_string());
        state.fetches.push(key.clone());

        if state.transient.contains(&key) {
            return Err(Error::Transient(format!(
                "simulated failure fetching {path} from {}",
                self.full_name
            )));
        }

        state
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::FileNotFound {
                repository: self.full_name.clone(),
                path: path.to_string(),
            })
    }
}
