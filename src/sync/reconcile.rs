use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::{CatalogEntry, Descriptor};
use crate::error::{Error, Result, SchemaError};
use crate::store::Store;
use crate::store::slug::slugify;
use crate::types::{LogLevel, Service, Source, TargetKind};

/// A log line produced while reconciling, attached to a catalog record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub target_kind: TargetKind,
    pub target_slug: String,
    pub message: String,
}

impl LogEntry {
    fn service(level: LogLevel, slug: &str, message: String) -> Self {
        Self {
            level,
            target_kind: TargetKind::Service,
            target_slug: slug.to_string(),
            message,
        }
    }

    /// Emits the entry through `tracing` at the matching level.
    pub fn trace(&self) {
        let target = format!("{}:{}", self.target_kind, self.target_slug);
        match self.level {
            LogLevel::Debug => tracing::debug!(%target, "{}", self.message),
            LogLevel::Info | LogLevel::Success => tracing::info!(%target, "{}", self.message),
            LogLevel::Warning => tracing::warn!(%target, "{}", self.message),
            LogLevel::Error => tracing::error!(%target, "{}", self.message),
        }
    }
}

/// The reconciled subset of a service: the fields a descriptor controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFields {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub priority: i64,
    pub meta: Value,
    pub active: bool,
    pub events: Value,
}

impl ServiceFields {
    #[must_use]
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            service_type: entry.service_type.clone(),
            priority: entry.priority,
            meta: entry.meta.clone(),
            active: entry.active,
            events: entry.events.clone(),
        }
    }

    #[must_use]
    pub fn from_service(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            description: service.description.clone(),
            service_type: service.service_type.clone(),
            priority: service.priority,
            meta: service.meta.clone(),
            active: service.active,
            events: service.events.clone(),
        }
    }

    /// Names of the fields whose values differ, in declaration order.
    #[must_use]
    pub fn diff(&self, other: &ServiceFields) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.name != other.name {
            changed.push("name");
        }
        if self.description != other.description {
            changed.push("description");
        }
        if self.service_type != other.service_type {
            changed.push("type");
        }
        if self.priority != other.priority {
            changed.push("priority");
        }
        if self.meta != other.meta {
            changed.push("meta");
        }
        if self.active != other.active {
            changed.push("active");
        }
        if self.events != other.events {
            changed.push("events");
        }
        changed
    }

    /// Writes the fields onto `service`, recomputing its slug from the name.
    pub fn apply(self, service: &mut Service) {
        service.slug = slugify(&self.name);
        service.name = self.name;
        service.description = self.description;
        service.service_type = self.service_type;
        service.priority = self.priority;
        service.meta = self.meta;
        service.active = self.active;
        service.events = self.events;
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub created: bool,
    pub updated: bool,
    pub service: Service,
    pub logs: Vec<LogEntry>,
}

/// Converges stored services to the latest descriptors.
pub struct Reconciler<'a> {
    store: &'a dyn Store,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Upserts the service and then converges its dependency edges.
    pub fn reconcile(&self, descriptor: &Descriptor, source: &Source) -> Result<ReconcileOutcome> {
        let entry = CatalogEntry::from_descriptor(descriptor)?;
        let mut outcome = self.upsert(descriptor, &entry, source)?;
        let logs = self.reconcile_dependencies(&outcome.service, &entry.dependencies)?;
        outcome.logs.extend(logs);
        Ok(outcome)
    }

    /// Creates the service named by `entry`, or updates the changed fields of
    /// the existing one. An unchanged descriptor performs no writes.
    pub fn upsert(
        &self,
        descriptor: &Descriptor,
        entry: &CatalogEntry,
        source: &Source,
    ) -> Result<ReconcileOutcome> {
        let slug = slugify(&entry.name);
        if slug.is_empty() {
            return Err(SchemaError::Invalid {
                path: descriptor.path.clone(),
                errors: vec![format!("name {:?} does not produce a slug", entry.name)],
            }
            .into());
        }

        match self.store.get_service_by_slug(&slug)? {
            Some(service) => self.update(descriptor, entry, source, service),
            None => self.create(descriptor, entry, source, slug),
        }
    }

    fn update(
        &self,
        descriptor: &Descriptor,
        entry: &CatalogEntry,
        source: &Source,
        mut service: Service,
    ) -> Result<ReconcileOutcome> {
        let slug = service.slug.clone();
        let mut logs = Vec::new();
        if service.source_id != source.id {
            logs.push(LogEntry::service(
                LogLevel::Warning,
                &slug,
                format!(
                    "Service `{slug}` is declared by another source; updating it from `{}` ({})",
                    source.slug, descriptor.path
                ),
            ));
        }

        let wanted = ServiceFields::from_entry(entry);
        let changed = wanted.diff(&ServiceFields::from_service(&service));
        let updated = !changed.is_empty();
        if updated {
            wanted.apply(&mut service);
            service.updated_at = Utc::now();
            self.store.update_service(&service)?;
            logs.push(LogEntry::service(
                LogLevel::Info,
                &service.slug,
                format!(
                    "Service `{}` updated from `{}` ({}): {}",
                    service.slug,
                    source.slug,
                    descriptor.path,
                    changed.join(", ")
                ),
            ));
        }

        if service.raw_data != descriptor.contents {
            self.store
                .update_service_raw_data(&service.id, &descriptor.contents)?;
            service.raw_data = descriptor.contents.clone();
        }

        Ok(ReconcileOutcome {
            created: false,
            updated,
            service,
            logs,
        })
    }

    fn create(
        &self,
        descriptor: &Descriptor,
        entry: &CatalogEntry,
        source: &Source,
        slug: String,
    ) -> Result<ReconcileOutcome> {
        let now = Utc::now();
        let service = Service {
            id: Uuid::new_v4().to_string(),
            name: entry.name.clone(),
            slug,
            description: entry.description.clone(),
            service_type: entry.service_type.clone(),
            priority: entry.priority,
            active: entry.active,
            source_id: source.id.clone(),
            meta: entry.meta.clone(),
            events: entry.events.clone(),
            raw_data: descriptor.contents.clone(),
            created_at: now,
            updated_at: now,
        };
        match self.store.create_service(&service) {
            Ok(()) => {}
            Err(Error::AlreadyExists) => {
                // Another run created the service after our lookup.
                let existing = self
                    .store
                    .get_service_by_slug(&service.slug)?
                    .ok_or(Error::NotFound)?;
                tracing::debug!("Service {} created concurrently, updating", existing.slug);
                return self.update(descriptor, entry, source, existing);
            }
            Err(e) => return Err(e),
        }

        let log = LogEntry::service(
            LogLevel::Info,
            &service.slug,
            format!(
                "Service `{}` created from `{}` ({})",
                service.slug, source.slug, descriptor.path
            ),
        );
        Ok(ReconcileOutcome {
            created: true,
            updated: false,
            service,
            logs: vec![log],
        })
    }

    /// Makes the stored dependency edges of `service` equal to the declared
    /// services that exist. Declared services that do not exist are skipped
    /// with a warning; no placeholder rows are created.
    pub fn reconcile_dependencies(
        &self,
        service: &Service,
        declared: &[String],
    ) -> Result<Vec<LogEntry>> {
        let mut logs = Vec::new();
        let mut wanted = BTreeSet::new();

        for name in declared {
            let slug = slugify(name);
            if slug.is_empty() || !wanted.insert(slug.clone()) {
                continue;
            }

            match self.store.get_service_by_slug(&slug)? {
                Some(dependency) => {
                    if self
                        .store
                        .add_service_dependency(&service.id, &dependency.id)?
                    {
                        logs.push(LogEntry::service(
                            LogLevel::Info,
                            &service.slug,
                            format!("Dependency `{slug}` added to `{}`", service.slug),
                        ));
                    }
                }
                None => logs.push(LogEntry::service(
                    LogLevel::Warning,
                    &service.slug,
                    format!("Dependency `{slug}` skipped, does not exist"),
                )),
            }
        }

        for dependency in self.store.list_service_dependencies(&service.id)? {
            if wanted.contains(&dependency.slug) {
                continue;
            }
            self.store
                .remove_service_dependency(&service.id, &dependency.id)?;
            logs.push(LogEntry::service(
                LogLevel::Info,
                &service.slug,
                format!(
                    "Dependency `{}` removed from `{}`",
                    dependency.slug, service.slug
                ),
            ));
        }

        Ok(logs)
    }
}
