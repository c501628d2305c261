pub const SCHEMA: &str = r#"
-- Organizations visible to the integration
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    auto_add_sources INTEGER NOT NULL DEFAULT 1,
    active INTEGER NOT NULL DEFAULT 1,

    -- Platform metadata (opaque to the catalog)
    raw_data TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Sources: one per hosted repository
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,       -- canonical, no trailing slash
    slug TEXT NOT NULL UNIQUE,      -- derived from url
    active INTEGER NOT NULL DEFAULT 1,

    -- Owning organization (set once, when first discovered)
    organization_id TEXT REFERENCES organizations(id) ON DELETE SET NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Services described by catalog descriptors
CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,      -- derived from name
    description TEXT NOT NULL DEFAULT '',
    type TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 10 CHECK (priority BETWEEN 1 AND 10),
    active INTEGER NOT NULL DEFAULT 1,

    -- A source cannot be deleted while services reference it
    source_id TEXT NOT NULL REFERENCES sources(id) ON DELETE RESTRICT,

    meta TEXT NOT NULL DEFAULT '{}',
    events TEXT NOT NULL DEFAULT '[]',
    raw_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Asymmetric dependency edges: service_id depends on dependency_id
CREATE TABLE IF NOT EXISTS service_dependencies (
    service_id TEXT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
    dependency_id TEXT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
    PRIMARY KEY (service_id, dependency_id)
);

-- Structured log entries attached to catalog records
CREATE TABLE IF NOT EXISTS system_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_kind TEXT NOT NULL,
    target_slug TEXT NOT NULL,
    level INTEGER NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_sources_organization ON sources(organization_id);
CREATE INDEX IF NOT EXISTS idx_services_source ON services(source_id);
CREATE INDEX IF NOT EXISTS idx_service_dependencies_dependency ON service_dependencies(dependency_id);
CREATE INDEX IF NOT EXISTS idx_system_logs_target ON system_logs(target_kind, target_slug);
"#;
