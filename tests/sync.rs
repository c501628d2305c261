//! Engine integration tests against an in-memory platform and database.

use std::sync::Arc;

use catalog::catalog::{CANDIDATE_PATHS, SchemaValidator};
use catalog::error::Error;
use catalog::platform::MemoryPlatform;
use catalog::store::{SqliteStore, Store};
use catalog::sync::Engine;
use catalog::tasks::TaskRunner;
use catalog::types::{LogLevel, Service, Source, TargetKind};
use chrono::Utc;

struct Harness {
    platform: MemoryPlatform,
    engine: Arc<Engine>,
}

impl Harness {
    fn new() -> Self {
        let store = SqliteStore::open_in_memory().expect("failed to open store");
        store.initialize().expect("failed to initialize store");

        let platform = MemoryPlatform::new();
        let engine = Engine::new(
            Arc::new(store),
            Arc::new(platform.clone()),
            Arc::new(SchemaValidator::bundled().expect("bundled schema")),
        );

        Self {
            platform,
            engine: Arc::new(engine),
        }
    }

    fn store(&self) -> &dyn Store {
        self.engine.store()
    }

    /// Registers `acme/<name>` on the platform and as an active source.
    fn add_source(&self, name: &str) -> Source {
        self.platform.add_repository("acme", name);
        let now = Utc::now();
        let source = Source {
            id: format!("source-{name}"),
            url: format!("https://github.com/acme/{name}"),
            slug: format!("acme-{name}"),
            active: true,
            organization_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store().create_source(&source).unwrap();
        source
    }

    fn put(&self, repo: &str, path: &str, contents: &str) {
        self.platform.put_file(&format!("acme/{repo}"), path, contents);
    }

    fn service(&self, slug: &str) -> Service {
        self.store()
            .get_service_by_slug(slug)
            .unwrap()
            .unwrap_or_else(|| panic!("service {slug} missing"))
    }

    fn dependencies(&self, slug: &str) -> Vec<String> {
        let service = self.service(slug);
        self.store()
            .list_service_dependencies(&service.id)
            .unwrap()
            .into_iter()
            .map(|s| s.slug)
            .collect()
    }

    fn source_logs(&self, slug: &str) -> Vec<(LogLevel, String)> {
        self.store()
            .list_logs(TargetKind::Source, slug, 50)
            .unwrap()
            .into_iter()
            .map(|l| (l.level, l.message))
            .collect()
    }
}

#[test]
fn test_sync_creates_services_and_sibling_dependencies() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.put(
        "platform",
        "catalog.json",
        r#"{
            // billing depends on a service declared in a later file
            name: "billing",
            type: "application",
            priority: 2,
            dependencies: ["auth"],
            files: ["services/auth.json"],
        }"#,
    );
    h.put(
        "platform",
        "services/auth.json",
        r#"{"name": "auth", "type": "application", "priority": 1}"#,
    );

    let report = h.engine.synchronize_source(&source);
    assert!(report.ok, "{report:?}");
    assert_eq!(report.created, 2);
    assert_eq!(report.services(), 2);

    assert_eq!(h.dependencies("billing"), vec!["auth"]);
    assert!(h.dependencies("auth").is_empty());
    assert_eq!(h.service("auth").source_id, source.id);

    let logs = h.source_logs("acme-platform");
    assert_eq!(logs[0].0, LogLevel::Success);
}

#[test]
fn test_second_sync_is_a_no_op() {
    let h = Harness::new();
    let source = h.add_source("billing");
    h.add_source("auth");
    h.put("auth", "catalog.json", r#"{"name": "auth", "type": "application", "priority": 1}"#);
    h.put(
        "billing",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2, "dependencies": ["auth"]}"#,
    );

    h.engine.refresh_everything().unwrap();
    let before = h.service("billing");
    let service_logs = h
        .store()
        .list_logs(TargetKind::Service, "billing", 50)
        .unwrap()
        .len();

    let report = h.engine.synchronize_source(&source);
    assert!(report.ok);
    assert_eq!((report.created, report.updated, report.unchanged), (0, 0, 1));

    let after = h.service("billing");
    assert_eq!(before.updated_at, after.updated_at);
    assert_eq!(h.dependencies("billing"), vec!["auth"]);
    assert_eq!(
        h.store()
            .list_logs(TargetKind::Service, "billing", 50)
            .unwrap()
            .len(),
        service_logs
    );
}

#[test]
fn test_billing_depends_on_auth_across_sources() {
    let h = Harness::new();
    let billing = h.add_source("billing");
    let auth = h.add_source("auth");
    h.put(
        "billing",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2, "dependencies": ["auth"]}"#,
    );
    h.put("auth", "catalog.json", r#"{"name": "auth", "type": "application", "priority": 1}"#);

    // auth does not exist yet: the edge is skipped, not invented
    assert!(h.engine.synchronize_source(&billing).ok);
    assert!(h.dependencies("billing").is_empty());
    assert!(h.store().get_service_by_slug("auth").unwrap().is_none());
    let warnings = h.store().list_logs(TargetKind::Service, "billing", 50).unwrap();
    assert!(
        warnings
            .iter()
            .any(|l| l.level == LogLevel::Warning && l.message.contains("`auth` skipped"))
    );

    assert!(h.engine.synchronize_source(&auth).ok);
    assert!(h.engine.synchronize_source(&billing).ok);
    assert_eq!(h.dependencies("billing"), vec!["auth"]);

    h.put(
        "billing",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 1, "dependencies": ["auth"]}"#,
    );
    let report = h.engine.synchronize_source(&billing);
    assert_eq!(report.updated, 1);
    assert_eq!(h.service("billing").priority, 1);
    assert_eq!(h.service("billing").raw_data["priority"], 1);
}

#[test]
fn test_dependencies_converge_to_declared_set() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.put(
        "platform",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2,
            "dependencies": ["a", "b", "c"], "files": ["deps.json"]}"#,
    );
    h.put(
        "platform",
        "deps.json",
        r#"{"name": "deps", "type": "library", "priority": 9, "files": ["a.json", "b.json", "c.json"]}"#,
    );
    for name in ["a", "b", "c"] {
        h.put(
            "platform",
            &format!("{name}.json"),
            &format!(r#"{{"name": "{name}", "type": "library", "priority": 5}}"#),
        );
    }

    assert!(h.engine.synchronize_source(&source).ok);
    assert_eq!(h.dependencies("billing"), vec!["a", "b", "c"]);

    h.put(
        "platform",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2,
            "dependencies": ["a", "d"], "files": ["deps.json"]}"#,
    );
    assert!(h.engine.synchronize_source(&source).ok);
    assert_eq!(h.dependencies("billing"), vec!["a"]);
    assert!(h.store().get_service_by_slug("d").unwrap().is_none());
}

#[test]
fn test_file_cycle_fetches_each_path_once() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.put(
        "platform",
        "catalog.json",
        r#"{"name": "root", "type": "application", "priority": 1, "files": ["a.json"]}"#,
    );
    h.put(
        "platform",
        "a.json",
        r#"{"name": "a", "type": "application", "priority": 1, "files": ["./catalog.json", "a.json"]}"#,
    );

    let report = h.engine.synchronize_source(&source);
    assert!(report.ok);
    assert_eq!(report.created, 2);
    assert_eq!(h.platform.fetches("acme/platform"), vec!["catalog.json", "a.json"]);
}

#[test]
fn test_invalid_descriptor_rejects_whole_source() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.put(
        "platform",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2, "files": ["auth.json"]}"#,
    );
    h.put("platform", "auth.json", r#"{"name": "auth", "type": "application"}"#);

    let report = h.engine.synchronize_source(&source);
    assert!(!report.ok);
    let error = report.error.unwrap();
    assert!(error.contains("auth.json"), "{error}");
    assert!(error.contains("priority"), "{error}");

    assert!(h.store().list_source_services(&source.id).unwrap().is_empty());
    let logs = h.source_logs("acme-platform");
    assert_eq!(logs[0].0, LogLevel::Error);
}

#[test]
fn test_malformed_descriptor_fails_source() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.platform
        .put_bytes("acme/platform", "catalog.json", vec![0xff, 0xfe, b'{']);

    let report = h.engine.synchronize_source(&source);
    assert!(!report.ok);
    assert!(report.error.unwrap().contains("malformed descriptor"));
}

#[test]
fn test_missing_entry_names_every_candidate() {
    let h = Harness::new();
    let source = h.add_source("platform");

    let report = h.engine.synchronize_source(&source);
    assert!(!report.ok);
    let error = report.error.unwrap();
    for path in CANDIDATE_PATHS {
        assert!(error.contains(path), "{error} does not mention {path}");
    }
}

#[test]
fn test_removed_secondary_file_keeps_existing_services() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.put(
        "platform",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2, "files": ["auth.json"]}"#,
    );
    h.put("platform", "auth.json", r#"{"name": "auth", "type": "application", "priority": 1}"#);
    assert!(h.engine.synchronize_source(&source).ok);

    h.platform.remove_file("acme/platform", "auth.json");
    let report = h.engine.synchronize_source(&source);
    assert!(!report.ok);
    assert!(report.error.unwrap().contains("auth.json"));
    assert_eq!(h.store().list_source_services(&source.id).unwrap().len(), 2);
}

#[test]
fn test_revoked_repository_is_reported() {
    let h = Harness::new();
    let source = h.add_source("platform");
    h.platform.revoke_repository("acme/platform");

    let report = h.engine.synchronize_source(&source);
    assert!(!report.ok);
    assert!(report.error.unwrap().contains("acme/platform"));
}

#[test]
fn test_discovery_dedups_repositories() {
    let h = Harness::new();
    h.platform.add_organization("acme");
    h.platform.add_repository("acme", "billing");
    h.platform.add_repository("acme", "billing");
    h.put(
        "billing",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2}"#,
    );

    let reports = h.engine.refresh_everything().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].source, "acme-billing");
    assert!(reports[0].ok);

    let sources = h.store().list_sources(false).unwrap();
    assert_eq!(sources.len(), 1);
    let organization = h.store().get_organization_by_slug("acme").unwrap().unwrap();
    assert!(organization.auto_add_sources);
    assert_eq!(sources[0].organization_id.as_ref(), Some(&organization.id));
    assert_eq!(h.platform.fetches("acme/billing"), vec!["catalog.json"]);

    // a second round discovers nothing new
    assert_eq!(h.engine.discover_organizations().unwrap(), 0);
    assert_eq!(h.engine.refresh_everything().unwrap().len(), 1);
    assert_eq!(h.store().list_organizations().unwrap().len(), 1);
}

#[test]
fn test_repositories_with_colliding_slugs_get_their_own_sources() {
    let h = Harness::new();
    h.platform.add_organization("acme");
    h.platform.add_organization("acme-billing");
    h.platform.add_repository("acme", "billing-x");
    h.platform.add_repository("acme-billing", "x");
    h.platform.put_file(
        "acme/billing-x",
        "catalog.json",
        r#"{"name": "one", "type": "application", "priority": 2}"#,
    );
    h.platform.put_file(
        "acme-billing/x",
        "catalog.json",
        r#"{"name": "two", "type": "application", "priority": 2}"#,
    );

    let reports = h.engine.refresh_everything().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.ok), "{reports:?}");

    let sources = h.store().list_sources(false).unwrap();
    assert_eq!(sources.len(), 2);
    assert_ne!(sources[0].slug, sources[1].slug);
    assert!(sources.iter().any(|s| s.slug == "acme-billing-x"));
    let mut urls: Vec<_> = sources.iter().map(|s| s.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(
        urls,
        vec![
            "https://github.com/acme-billing/x",
            "https://github.com/acme/billing-x"
        ]
    );

    assert_eq!(h.platform.fetches("acme-billing/x"), vec!["catalog.json"]);
    assert_ne!(h.service("one").source_id, h.service("two").source_id);

    // a second round reuses both sources
    assert_eq!(h.engine.refresh_everything().unwrap().len(), 2);
    assert_eq!(h.store().list_sources(false).unwrap().len(), 2);
}

#[test]
fn test_discovery_attaches_orphan_source_once() {
    let h = Harness::new();
    let orphan = h.add_source("billing");
    h.platform.add_organization("acme");
    h.engine.discover_organizations().unwrap();
    let organization = h.store().get_organization_by_slug("acme").unwrap().unwrap();

    let sources = h.engine.discover_sources(&organization).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].id, orphan.id);
    assert_eq!(sources[0].organization_id.as_ref(), Some(&organization.id));
}

#[test]
fn test_refresh_skips_inactive_sources() {
    let h = Harness::new();
    h.platform.add_organization("acme");
    h.platform.add_repository("acme", "legacy");
    let now = Utc::now();
    h.store()
        .create_source(&Source {
            id: "legacy".to_string(),
            url: "https://github.com/acme/legacy".to_string(),
            slug: "acme-legacy".to_string(),
            active: false,
            organization_id: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    assert!(h.engine.refresh_everything().unwrap().is_empty());
    assert!(h.platform.fetches("acme/legacy").is_empty());
}

#[test]
fn test_failures_are_isolated_per_source() {
    let h = Harness::new();
    h.platform.add_organization("acme");
    h.platform.add_repository("acme", "billing");
    h.platform.add_repository("acme", "auth");
    h.put(
        "billing",
        "catalog.json",
        r#"{"name": "billing", "type": "application", "priority": 2}"#,
    );
    h.platform.fail_file("acme/auth", "catalog.json");

    let reports = h.engine.refresh_everything().unwrap();
    let summary: Vec<_> = reports.iter().map(|r| (r.source.as_str(), r.ok)).collect();
    assert_eq!(summary, vec![("acme-auth", false), ("acme-billing", true)]);
    assert!(h.store().get_service_by_slug("billing").unwrap().is_some());
}

#[tokio::test]
async fn test_task_runner_refreshes_concurrently() {
    let h = Harness::new();
    h.platform.add_organization("acme");
    for name in ["auth", "billing", "search"] {
        h.platform.add_repository("acme", name);
        h.put(
            name,
            "catalog.json",
            &format!(r#"{{"name": "{name}", "type": "application", "priority": 3}}"#),
        );
    }
    let runner = TaskRunner::new(Arc::clone(&h.engine), 2);

    let reports = runner.refresh_all_organizations().await.unwrap();
    let slugs: Vec<_> = reports.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(slugs, vec!["acme-auth", "acme-billing", "acme-search"]);
    assert!(reports.iter().all(|r| r.ok && r.created == 1));

    let reports = runner.refresh_all_sources().await.unwrap();
    assert!(reports.iter().all(|r| r.ok && r.unchanged == 1));

    let report = runner.refresh_source("acme-billing").await.unwrap();
    assert_eq!(report.source, "acme-billing");

    let reports = runner.refresh_organization("acme").await.unwrap();
    assert_eq!(reports.len(), 3);
}

#[tokio::test]
async fn test_task_runner_unknown_targets() {
    let h = Harness::new();
    let runner = TaskRunner::new(Arc::clone(&h.engine), 1);

    assert!(matches!(
        runner.refresh_source("missing").await,
        Err(Error::NotFound)
    ));
    assert!(matches!(
        runner.refresh_organization("missing").await,
        Err(Error::NotFound)
    ));
}
