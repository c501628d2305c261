mod schema;
pub mod slug;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Organization operations
    fn create_organization(&self, org: &Organization) -> Result<()>;
    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>>;
    fn get_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>>;
    fn list_organizations(&self) -> Result<Vec<Organization>>;
    /// Active organizations whose repositories are added automatically.
    fn list_auto_add_organizations(&self) -> Result<Vec<Organization>>;

    // Source operations
    fn create_source(&self, source: &Source) -> Result<()>;
    fn get_source_by_slug(&self, slug: &str) -> Result<Option<Source>>;
    fn get_source_by_url(&self, url: &str) -> Result<Option<Source>>;
    fn list_sources(&self, active_only: bool) -> Result<Vec<Source>>;
    /// Assigns the owning organization only if the source has none yet.
    /// Returns true if the source was updated.
    fn set_source_organization(&self, id: &str, organization_id: &str) -> Result<bool>;
    /// Fails with `Error::Protected` while any service references the source.
    fn delete_source(&self, id: &str) -> Result<bool>;

    // Service operations
    fn create_service(&self, service: &Service) -> Result<()>;
    fn get_service_by_slug(&self, slug: &str) -> Result<Option<Service>>;
    fn list_source_services(&self, source_id: &str) -> Result<Vec<Service>>;
    fn update_service(&self, service: &Service) -> Result<()>;
    fn update_service_raw_data(&self, id: &str, raw_data: &Value) -> Result<()>;
    fn delete_service(&self, id: &str) -> Result<bool>;

    // Service dependency operations (asymmetric many-to-many)
    /// Returns true if the edge did not exist before.
    fn add_service_dependency(&self, service_id: &str, dependency_id: &str) -> Result<bool>;
    fn remove_service_dependency(&self, service_id: &str, dependency_id: &str) -> Result<bool>;
    fn list_service_dependencies(&self, service_id: &str) -> Result<Vec<Service>>;

    // System log operations
    fn add_log(
        &self,
        target_kind: TargetKind,
        target_slug: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<SystemLog>;
    /// Newest first.
    fn list_logs(
        &self,
        target_kind: TargetKind,
        target_slug: &str,
        limit: i64,
    ) -> Result<Vec<SystemLog>>;
    /// Deletes every log entry created before `older_than`. Returns the
    /// number deleted.
    fn truncate_logs(&self, older_than: DateTime<Utc>) -> Result<usize>;
}
