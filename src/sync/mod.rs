//! The synchronization engine.
//!
//! A run for one source resolves its descriptors on the platform, validates
//! all of them, and only then reconciles them into the store. Failures are
//! recorded against the source and reported; they never abort other sources.

mod discovery;
mod reconcile;

pub use reconcile::{LogEntry, ReconcileOutcome, Reconciler, ServiceFields};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{CatalogEntry, SchemaValidator, resolve};
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::store::Store;
use crate::types::{LogLevel, Source, TargetKind};

/// Outcome of synchronizing one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub source: String,
    pub ok: bool,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    #[must_use]
    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ok: false,
            created: 0,
            updated: 0,
            unchanged: 0,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn services(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

#[derive(Default)]
struct Counts {
    created: usize,
    updated: usize,
    unchanged: usize,
}

pub struct Engine {
    store: Arc<dyn Store>,
    platform: Arc<dyn Platform>,
    validator: Arc<SchemaValidator>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        platform: Arc<dyn Platform>,
        validator: Arc<SchemaValidator>,
    ) -> Self {
        Self {
            store,
            platform,
            validator,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Writes a log line through `tracing` and persists it as a system log.
    /// A failure to persist is traced and otherwise ignored.
    pub fn log(&self, target_kind: TargetKind, target_slug: &str, level: LogLevel, message: &str) {
        let entry = LogEntry {
            level,
            target_kind,
            target_slug: target_slug.to_string(),
            message: message.to_string(),
        };
        self.record(&entry);
    }

    fn record(&self, entry: &LogEntry) {
        entry.trace();
        if let Err(e) = self.store.add_log(
            entry.target_kind,
            &entry.target_slug,
            entry.level,
            &entry.message,
        ) {
            tracing::error!("Failed to persist log for {}: {e}", entry.target_slug);
        }
    }

    /// Synchronizes one source. Every failure is caught, logged against the
    /// source and returned as a failed report.
    pub fn synchronize_source(&self, source: &Source) -> SyncReport {
        tracing::debug!("Synchronizing source {}", source.slug);

        match self.try_synchronize(source) {
            Ok(counts) => {
                self.log(
                    TargetKind::Source,
                    &source.slug,
                    LogLevel::Success,
                    &format!(
                        "Synchronized {} services ({} created, {} updated)",
                        counts.created + counts.updated + counts.unchanged,
                        counts.created,
                        counts.updated
                    ),
                );
                SyncReport {
                    source: source.slug.clone(),
                    ok: true,
                    created: counts.created,
                    updated: counts.updated,
                    unchanged: counts.unchanged,
                    error: None,
                }
            }
            Err(e) => {
                self.log(
                    TargetKind::Source,
                    &source.slug,
                    LogLevel::Error,
                    &format!("Synchronization failed: {e}"),
                );
                SyncReport::failed(&source.slug, e.to_string())
            }
        }
    }

    fn try_synchronize(&self, source: &Source) -> Result<Counts> {
        let (owner, name) = source.repository().ok_or_else(|| {
            Error::BadRequest(format!(
                "source URL has no owner/repository path: {}",
                source.url
            ))
        })?;

        let repo = self.platform.repository(owner, name)?;
        let descriptors = resolve(repo.as_ref())?;

        // Nothing is written unless every descriptor of the source is valid.
        self.validator.validate_all(&descriptors)?;
        let entries = descriptors
            .iter()
            .map(CatalogEntry::from_descriptor)
            .collect::<Result<Vec<_>>>()?;

        let reconciler = Reconciler::new(self.store.as_ref());
        let mut counts = Counts::default();
        let mut services = Vec::with_capacity(entries.len());

        for (descriptor, entry) in descriptors.iter().zip(&entries) {
            let outcome = reconciler.upsert(descriptor, entry, source)?;
            if outcome.created {
                counts.created += 1;
            } else if outcome.updated {
                counts.updated += 1;
            } else {
                counts.unchanged += 1;
            }
            outcome.logs.iter().for_each(|log| self.record(log));
            services.push(outcome.service);
        }

        // Dependencies run after every service of the source exists, so
        // services may depend on siblings declared later in the same run.
        for (service, entry) in services.iter().zip(&entries) {
            let logs = reconciler.reconcile_dependencies(service, &entry.dependencies)?;
            logs.iter().for_each(|log| self.record(log));
        }

        Ok(counts)
    }

    /// The sources a full refresh synchronizes: discovered sources of every
    /// auto-adding organization plus every pre-existing active source, each
    /// exactly once, ordered by slug.
    pub fn plan_refresh(&self) -> Result<Vec<Source>> {
        if let Err(e) = self.discover_organizations() {
            if !e.is_catalog_error() {
                return Err(e);
            }
            tracing::warn!("Organization discovery failed: {e}");
        }

        let mut planned = BTreeMap::new();
        for organization in self.store.list_auto_add_organizations()? {
            for source in self.discover_organization_sources(&organization)? {
                if source.active {
                    planned.entry(source.slug.clone()).or_insert(source);
                }
            }
        }

        for source in self.store.list_sources(true)? {
            planned.entry(source.slug.clone()).or_insert(source);
        }

        Ok(planned.into_values().collect())
    }

    /// Discovers and synchronizes everything, one source at a time.
    pub fn refresh_everything(&self) -> Result<Vec<SyncReport>> {
        let sources = self.plan_refresh()?;
        tracing::info!("Refreshing {} sources", sources.len());
        Ok(sources
            .iter()
            .map(|source| self.synchronize_source(source))
            .collect())
    }
}
