use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use super::{Descriptor, fetch};
use crate::error::{Error, Result};
use crate::platform::RepositoryHandle;

/// Root descriptor locations, tried in order. The first one that exists wins,
/// so reordering changes which file existing repositories resolve to.
pub const CANDIDATE_PATHS: &[&str] = &[
    "catalog.json",
    "service.json",
    ".catalog/catalog.json",
    ".github/catalog.json",
    ".github/service.json",
];

/// Normalizes a repository-relative path: strips leading `./` and `/`,
/// collapses repeated slashes and drops `.` segments. Returns `None` for
/// empty paths and for paths that climb out of the repository.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.trim().split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// The `files` array of a descriptor. Entries that are not strings are ignored.
pub fn referenced_files(contents: &Value) -> Vec<String> {
    contents
        .get("files")
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Worklist state for following `files` references.
///
/// Every path is fetched at most once: a path already seen, including the
/// root, is skipped when referenced again. This is what guarantees
/// termination when descriptors reference each other in a cycle.
#[derive(Debug, Default)]
pub struct Resolution {
    pending: VecDeque<String>,
    seen: HashSet<String>,
    descriptors: Vec<Descriptor>,
}

impl Resolution {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `path` unless it was seen before. Returns true if queued.
    pub fn enqueue(&mut self, path: &str) -> bool {
        let Some(normalized) = normalize_path(path) else {
            tracing::warn!("Ignoring invalid descriptor path: {path:?}");
            return false;
        };
        if !self.seen.insert(normalized.clone()) {
            tracing::debug!("Skipping already fetched descriptor: {normalized}");
            return false;
        }
        self.pending.push_back(normalized);
        true
    }

    pub fn next_path(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Records a fetched descriptor and queues the files it references.
    pub fn accept(&mut self, descriptor: Descriptor) {
        // Mark the path itself seen, for roots that were tried rather than queued.
        if let Some(normalized) = normalize_path(&descriptor.path) {
            self.seen.insert(normalized);
        }
        for file in referenced_files(&descriptor.contents) {
            self.enqueue(&file);
        }
        self.descriptors.push(descriptor);
    }

    #[must_use]
    pub fn is_seen(&self, path: &str) -> bool {
        normalize_path(path).is_some_and(|p| self.seen.contains(&p))
    }

    #[must_use]
    pub fn finish(self) -> Vec<Descriptor> {
        self.descriptors
    }
}

fn find_root(repo: &dyn RepositoryHandle) -> Result<Descriptor> {
    for path in CANDIDATE_PATHS {
        match fetch(repo, path) {
            Ok(descriptor) => return Ok(descriptor),
            Err(Error::FileNotFound { .. }) => {
                tracing::info!("File not found: {path} in {}", repo.full_name());
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::NoEntryFound {
        repository: repo.full_name(),
        tried: CANDIDATE_PATHS.iter().map(|p| p.to_string()).collect(),
    })
}

/// Resolves every descriptor of a repository: the root first, then the files
/// it references transitively, in breadth-first order.
///
/// Any failure fetching a referenced file aborts the whole resolution; the
/// catalog entry is incomplete without it.
pub fn resolve(repo: &dyn RepositoryHandle) -> Result<Vec<Descriptor>> {
    let mut resolution = Resolution::new();
    resolution.accept(find_root(repo)?);

    while let Some(path) = resolution.next_path() {
        let descriptor = fetch(repo, &path)?;
        resolution.accept(descriptor);
    }

    Ok(resolution.finish())
}
