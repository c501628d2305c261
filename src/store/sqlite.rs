use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const ORGANIZATION_COLUMNS: &str =
    "id, name, slug, url, auto_add_sources, active, raw_data, created_at, updated_at";
const SOURCE_COLUMNS: &str = "id, url, slug, active, organization_id, created_at, updated_at";
const SERVICE_COLUMNS: &str = "s.id, s.name, s.slug, s.description, s.type, s.priority, s.active, \
     s.source_id, s.meta, s.events, s.raw_data, s.created_at, s.updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database, mostly useful for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_json(s: Option<String>) -> Value {
    let Some(s) = s else {
        return Value::Null;
    };
    serde_json::from_str(&s).unwrap_or_else(|e| {
        tracing::error!("Invalid JSON in database: '{}' - {}", s, e);
        Value::Null
    })
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        constraint_code(err),
        Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    constraint_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        url: row.get(3)?,
        auto_add_sources: row.get(4)?,
        active: row.get(5)?,
        raw_data: parse_json(row.get(6)?),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        url: row.get(1)?,
        slug: row.get(2)?,
        active: row.get(3)?,
        organization_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        service_type: row.get(4)?,
        priority: row.get(5)?,
        active: row.get(6)?,
        source_id: row.get(7)?,
        meta: parse_json(row.get(8)?),
        events: parse_json(row.get(9)?),
        raw_data: parse_json(row.get(10)?),
        created_at: parse_datetime(&row.get::<_, String>(11)?),
        updated_at: parse_datetime(&row.get::<_, String>(12)?),
    })
}

fn system_log_from_row(row: &Row<'_>) -> rusqlite::Result<SystemLog> {
    let kind: String = row.get(1)?;
    let level: i64 = row.get(3)?;
    Ok(SystemLog {
        id: row.get(0)?,
        target_kind: TargetKind::parse(&kind).unwrap_or(TargetKind::Source),
        target_slug: row.get(2)?,
        level: LogLevel::from_value(level).unwrap_or(LogLevel::Info),
        message: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Organization operations

    fn create_organization(&self, org: &Organization) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO organizations (id, name, slug, url, auto_add_sources, active, raw_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                org.id,
                org.name,
                org.slug,
                org.url,
                org.auto_add_sources,
                org.active,
                org.raw_data.to_string(),
                format_datetime(&org.created_at),
                format_datetime(&org.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_organization_by_name(&self, name: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE name = ?1"),
            params![name],
            organization_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE slug = ?1"),
            params![slug],
            organization_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_organizations(&self) -> Result<Vec<Organization>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations ORDER BY name"
        ))?;

        let rows = stmt.query_map([], organization_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_auto_add_organizations(&self) -> Result<Vec<Organization>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations
             WHERE active = 1 AND auto_add_sources = 1 ORDER BY name"
        ))?;

        let rows = stmt.query_map([], organization_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Source operations

    fn create_source(&self, source: &Source) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sources (id, url, slug, active, organization_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                source.id,
                source.url,
                source.slug,
                source.active,
                source.organization_id,
                format_datetime(&source.created_at),
                format_datetime(&source.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_source_by_slug(&self, slug: &str) -> Result<Option<Source>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE slug = ?1"),
            params![slug],
            source_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE url = ?1"),
            params![url],
            source_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_sources(&self, active_only: bool) -> Result<Vec<Source>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources WHERE active = 1 OR ?1 = 0 ORDER BY slug"
        ))?;

        let rows = stmt.query_map(params![active_only], source_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_source_organization(&self, id: &str, organization_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE sources SET organization_id = ?1, updated_at = ?2
             WHERE id = ?3 AND organization_id IS NULL",
            params![organization_id, format_datetime(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    fn delete_source(&self, id: &str) -> Result<bool> {
        let result = self
            .conn()
            .execute("DELETE FROM sources WHERE id = ?1", params![id]);

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(e) if is_foreign_key_violation(&e) => Err(Error::Protected(
                "source is still referenced by services".to_string(),
            )),
            Err(e) => Err(Error::from(e)),
        }
    }

    // Service operations

    fn create_service(&self, service: &Service) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO services (id, name, slug, description, type, priority, active, source_id, meta, events, raw_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                service.id,
                service.name,
                service.slug,
                service.description,
                service.service_type,
                service.priority,
                service.active,
                service.source_id,
                service.meta.to_string(),
                service.events.to_string(),
                service.raw_data.to_string(),
                format_datetime(&service.created_at),
                format_datetime(&service.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_service_by_slug(&self, slug: &str) -> Result<Option<Service>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services s WHERE s.slug = ?1"),
            params![slug],
            service_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_source_services(&self, source_id: &str) -> Result<Vec<Service>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services s WHERE s.source_id = ?1 ORDER BY s.slug"
        ))?;

        let rows = stmt.query_map(params![source_id], service_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_service(&self, service: &Service) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE services SET name = ?1, slug = ?2, description = ?3, type = ?4, priority = ?5,
                 active = ?6, meta = ?7, events = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                service.name,
                service.slug,
                service.description,
                service.service_type,
                service.priority,
                service.active,
                service.meta.to_string(),
                service.events.to_string(),
                format_datetime(&service.updated_at),
                service.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_service_raw_data(&self, id: &str, raw_data: &Value) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE services SET raw_data = ?1 WHERE id = ?2",
            params![raw_data.to_string(), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_service(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM services WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Service dependency operations

    fn add_service_dependency(&self, service_id: &str, dependency_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO service_dependencies (service_id, dependency_id) VALUES (?1, ?2)",
            params![service_id, dependency_id],
        )?;
        Ok(rows > 0)
    }

    fn remove_service_dependency(&self, service_id: &str, dependency_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM service_dependencies WHERE service_id = ?1 AND dependency_id = ?2",
            params![service_id, dependency_id],
        )?;
        Ok(rows > 0)
    }

    fn list_service_dependencies(&self, service_id: &str) -> Result<Vec<Service>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SERVICE_COLUMNS}
             FROM services s
             JOIN service_dependencies d ON s.id = d.dependency_id
             WHERE d.service_id = ?1
             ORDER BY s.slug"
        ))?;

        let rows = stmt.query_map(params![service_id], service_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // System log operations

    fn add_log(
        &self,
        target_kind: TargetKind,
        target_slug: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<SystemLog> {
        let created_at = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO system_logs (target_kind, target_slug, level, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                target_kind.as_str(),
                target_slug,
                level.value(),
                message,
                format_datetime(&created_at),
            ],
        )?;

        Ok(SystemLog {
            id: conn.last_insert_rowid(),
            target_kind,
            target_slug: target_slug.to_string(),
            level,
            message: message.to_string(),
            created_at,
        })
    }

    fn list_logs(
        &self,
        target_kind: TargetKind,
        target_slug: &str,
        limit: i64,
    ) -> Result<Vec<SystemLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, target_kind, target_slug, level, message, created_at
             FROM system_logs WHERE target_kind = ?1 AND target_slug = ?2
             ORDER BY id DESC LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![target_kind.as_str(), target_slug, limit],
            system_log_from_row,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn truncate_logs(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM system_logs WHERE created_at < ?1",
            params![format_datetime(&older_than)],
        )?;
        Ok(deleted)
    }
}
