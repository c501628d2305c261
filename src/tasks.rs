//! Async entry points for scheduled and on-demand refreshes.
//!
//! Engine work is blocking (SQLite, blocking HTTP), so every unit runs on the
//! blocking pool. Per-source units run concurrently up to a fixed limit.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::sync::{Engine, SyncReport};
use crate::types::Source;

#[derive(Clone)]
pub struct TaskRunner {
    engine: Arc<Engine>,
    limit: Arc<Semaphore>,
}

impl TaskRunner {
    pub fn new(engine: Arc<Engine>, max_concurrency: usize) -> Self {
        Self {
            engine,
            limit: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> Result<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    /// Synchronizes the active source `slug`.
    pub async fn refresh_source(&self, slug: &str) -> Result<SyncReport> {
        let slug = slug.to_string();
        let source = self
            .blocking(move |engine| engine.store().get_source_by_slug(&slug))
            .await?
            .filter(|source| source.active)
            .ok_or(Error::NotFound)?;

        let mut reports = self.synchronize(vec![source]).await;
        reports.pop().ok_or_else(|| Error::Task("no report produced".to_string()))
    }

    /// Synchronizes every active source.
    pub async fn refresh_all_sources(&self) -> Result<Vec<SyncReport>> {
        let sources = self
            .blocking(|engine| engine.store().list_sources(true))
            .await?;
        Ok(self.synchronize(sources).await)
    }

    /// Discovers the repositories of one organization and synchronizes the
    /// active sources among them.
    pub async fn refresh_organization(&self, slug: &str) -> Result<Vec<SyncReport>> {
        let slug = slug.to_string();
        let sources = self
            .blocking(move |engine| {
                let organization = engine
                    .store()
                    .get_organization_by_slug(&slug)?
                    .ok_or(Error::NotFound)?;
                engine.discover_sources(&organization)
            })
            .await?;

        let active = sources.into_iter().filter(|s| s.active).collect();
        Ok(self.synchronize(active).await)
    }

    /// Discovers organizations and their repositories, then synchronizes
    /// every active source exactly once.
    pub async fn refresh_all_organizations(&self) -> Result<Vec<SyncReport>> {
        let sources = self.blocking(Engine::plan_refresh).await?;
        Ok(self.synchronize(sources).await)
    }

    /// Runs one synchronization per source, bounded by the concurrency
    /// limit. Reports are ordered by source slug.
    pub async fn synchronize(&self, sources: Vec<Source>) -> Vec<SyncReport> {
        let mut tasks = JoinSet::new();

        for source in sources {
            let engine = Arc::clone(&self.engine);
            let limit = Arc::clone(&self.limit);
            tasks.spawn(async move {
                let slug = source.slug.clone();
                let _permit = match limit.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return SyncReport::failed(slug, e.to_string()),
                };
                tokio::task::spawn_blocking(move || engine.synchronize_source(&source))
                    .await
                    .unwrap_or_else(|e| SyncReport::failed(slug, format!("task failed: {e}")))
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!("Synchronization task failed: {e}"),
            }
        }

        reports.sort_by(|a, b| a.source.cmp(&b.source));
        reports
    }
}
