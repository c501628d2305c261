use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::Engine;
use crate::error::{Error, Result};
use crate::store::slug::{
    canonical_url, qualified_source_slug, same_repository, slugify, source_slug,
};
use crate::types::{LogLevel, Organization, Source, TargetKind};

impl Engine {
    /// Creates every organization visible on the platform that the store
    /// does not know yet. Returns the number created.
    pub fn discover_organizations(&self) -> Result<usize> {
        let mut created = 0;

        for org in self.platform.list_organizations()? {
            let slug = slugify(&org.login);
            if slug.is_empty() {
                tracing::warn!("Skipping organization with unusable name: {:?}", org.login);
                continue;
            }
            if self.store.get_organization_by_name(&org.login)?.is_some()
                || self.store.get_organization_by_slug(&slug)?.is_some()
            {
                continue;
            }

            let now = Utc::now();
            let organization = Organization {
                id: Uuid::new_v4().to_string(),
                name: org.login.clone(),
                slug,
                url: org.url.clone(),
                auto_add_sources: true,
                active: true,
                raw_data: org.raw.clone(),
                created_at: now,
                updated_at: now,
            };

            match self.store.create_organization(&organization) {
                Ok(()) => {
                    created += 1;
                    self.log(
                        TargetKind::Organization,
                        &organization.slug,
                        LogLevel::Info,
                        &format!("Organization `{}` discovered", organization.name),
                    );
                }
                Err(Error::AlreadyExists) => {
                    tracing::debug!("Organization {} created concurrently", organization.name);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(created)
    }

    /// Registers the repositories of `organization` as sources and returns
    /// them, each once. Existing sources are reused; their owning
    /// organization is filled in only when missing. Every repository gets
    /// its own source, even when its plain slug is taken by another one.
    pub fn discover_sources(&self, organization: &Organization) -> Result<Vec<Source>> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for repo in self.platform.list_repositories(&organization.name)? {
            if repo.archived {
                tracing::debug!("Skipping archived repository {}", repo.full_name());
                continue;
            }

            let url = canonical_url(&repo.url);
            let slug = match source_slug(&url) {
                Ok(slug) => slug,
                Err(e) => {
                    tracing::warn!("Skipping repository {}: {e}", repo.full_name());
                    continue;
                }
            };
            if !seen.insert(url.to_lowercase()) {
                tracing::debug!("Repository {} listed more than once", repo.full_name());
                continue;
            }

            let mut source = match self.store.get_source_by_url(&url)? {
                Some(source) => source,
                None => match self.find_or_create_source(url, slug, organization) {
                    Ok(source) => source,
                    Err(Error::AlreadyExists) => {
                        tracing::warn!("No free slug for repository {}", repo.full_name());
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            if source.organization_id.is_none()
                && self
                    .store
                    .set_source_organization(&source.id, &organization.id)?
            {
                source.organization_id = Some(organization.id.clone());
                tracing::info!(
                    "Source {} attached to organization {}",
                    source.slug,
                    organization.slug
                );
            }

            sources.push(source);
        }

        Ok(sources)
    }

    /// Like [`Engine::discover_sources`], but a platform failure is logged
    /// against the organization and yields no sources.
    pub(super) fn discover_organization_sources(
        &self,
        organization: &Organization,
    ) -> Result<Vec<Source>> {
        match self.discover_sources(organization) {
            Ok(sources) => Ok(sources),
            Err(e) if e.is_catalog_error() => {
                self.log(
                    TargetKind::Organization,
                    &organization.slug,
                    LogLevel::Error,
                    &format!("Source discovery failed: {e}"),
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Looks a repository up by slug, accepting only a source for the same
    /// repository. A slug held by another repository is replaced by the
    /// qualified slug.
    fn find_or_create_source(
        &self,
        url: String,
        slug: String,
        organization: &Organization,
    ) -> Result<Source> {
        let slug = match self.store.get_source_by_slug(&slug)? {
            None => slug,
            Some(existing) if same_repository(&existing.url, &url) => return Ok(existing),
            Some(existing) => {
                let qualified = qualified_source_slug(&url)?;
                tracing::warn!(
                    "Slug {slug} belongs to {}, using {qualified} for {url}",
                    existing.url
                );
                match self.store.get_source_by_slug(&qualified)? {
                    None => qualified,
                    Some(existing) if same_repository(&existing.url, &url) => return Ok(existing),
                    Some(_) => return Err(Error::AlreadyExists),
                }
            }
        };

        self.create_source(url, slug, organization)
    }

    fn create_source(&self, url: String, slug: String, organization: &Organization) -> Result<Source> {
        let now = Utc::now();
        let source = Source {
            id: Uuid::new_v4().to_string(),
            url,
            slug,
            active: true,
            organization_id: Some(organization.id.clone()),
            created_at: now,
            updated_at: now,
        };

        match self.store.create_source(&source) {
            Ok(()) => {
                self.log(
                    TargetKind::Source,
                    &source.slug,
                    LogLevel::Info,
                    &format!("Source `{}` added from {}", source.slug, organization.name),
                );
                Ok(source)
            }
            Err(Error::AlreadyExists) => {
                // Created concurrently; only the same repository may be reused.
                let existing = match self.store.get_source_by_url(&source.url)? {
                    Some(existing) => Some(existing),
                    None => self.store.get_source_by_slug(&source.slug)?,
                };
                existing
                    .filter(|existing| same_repository(&existing.url, &source.url))
                    .ok_or(Error::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }
}
