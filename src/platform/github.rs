use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{OrgRef, Platform, RepoRef, RepositoryHandle};
use crate::config::GithubConfig;
use crate::error::{Error, Result};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 50;
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    owner: ApiOwner,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    archived: bool,
}

impl From<ApiRepository> for RepoRef {
    fn from(repo: ApiRepository) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            url: repo.html_url,
            description: repo.description,
            archived: repo.archived,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstallationRepositories {
    repositories: Vec<ApiRepository>,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

struct GithubClient {
    client: Client,
    api_url: String,
    web_url: String,
    token: String,
    include_installation_repos: bool,
}

/// GitHub REST implementation of [`Platform`], authenticated with a single
/// token (personal, OAuth or app installation).
#[derive(Clone)]
pub struct GithubPlatform {
    inner: Arc<GithubClient>,
}

impl GithubPlatform {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let token = config.token.clone().ok_or_else(|| {
            Error::Config("a GitHub token is required (set CATALOG_GITHUB_TOKEN)".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("could not build HTTP client: {e}")))?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        Ok(Self {
            inner: Arc::new(GithubClient {
                client,
                web_url: web_url_for(&api_url),
                api_url,
                token,
                include_installation_repos: config.include_installation_repos,
            }),
        })
    }
}

/// Maps an API base URL to the matching web URL. GitHub Enterprise serves the
/// API under `/api/v3` on the web host.
fn web_url_for(api_url: &str) -> String {
    if api_url == "https://api.github.com" {
        return "https://github.com".to_string();
    }
    api_url.trim_end_matches("/api/v3").to_string()
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_rate_limited(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0")
}

/// Classifies a failed response: missing or forbidden resources are not
/// retryable, rate limits and server errors are.
fn status_error(status: StatusCode, headers: &HeaderMap, what: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
        || (status == StatusCode::FORBIDDEN && is_rate_limited(headers))
    {
        return Error::Transient(format!("GitHub returned {status} for {what}"));
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::NoRepository(format!("{what} ({status})"))
        }
        _ => Error::Transient(format!("unexpected status {status} for {what}")),
    }
}

fn transport_error(e: reqwest::Error, what: &str) -> Error {
    Error::Transient(format!("request for {what} failed: {e}"))
}

impl GithubClient {
    fn get(&self, path: &str, accept: &str) -> Result<Response> {
        let url = format!("{}{}", self.api_url, path);
        tracing::debug!("GET {url}");
        self.client
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .map_err(|e| transport_error(e, path))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.get(path, JSON_MEDIA_TYPE)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), resp.headers(), path));
        }
        resp.json().map_err(|e| transport_error(e, path))
    }

    /// Walks `?page=` until a short page is returned.
    fn get_paginated<T, F>(&self, path: &str, mut extract: F) -> Result<Vec<T>>
    where
        F: FnMut(Value) -> Result<Vec<T>>,
    {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let page_path = format!("{path}{separator}per_page={PER_PAGE}&page={page}");
            let body: Value = self.get_json(&page_path)?;
            let batch = extract(body)?;
            let count = batch.len();
            items.extend(batch);
            if count < PER_PAGE {
                return Ok(items);
            }
        }

        tracing::warn!("Stopped paginating {path} after {MAX_PAGES} pages");
        Ok(items)
    }

    fn installation_repositories(&self) -> Result<Vec<ApiRepository>> {
        self.get_paginated("/installation/repositories", |body| {
            serde_json::from_value::<InstallationRepositories>(body)
                .map(|r| r.repositories)
                .map_err(|e| Error::Transient(format!("unexpected installation listing: {e}")))
        })
    }

    fn org_ref(&self, raw: Value) -> Option<OrgRef> {
        let login = raw.get("login")?.as_str()?.to_string();
        Some(OrgRef {
            url: format!("{}/{}", self.web_url, login),
            login,
            raw,
        })
    }
}

impl Platform for GithubPlatform {
    fn list_organizations(&self) -> Result<Vec<OrgRef>> {
        let inner = &self.inner;
        let mut orgs: Vec<OrgRef> = inner.get_paginated("/user/orgs", |body| match body {
            Value::Array(items) => Ok(items.into_iter().filter_map(|v| inner.org_ref(v)).collect()),
            other => Err(Error::Transient(format!("unexpected organization listing: {other}"))),
        })?;

        if inner.include_installation_repos {
            let mut seen: HashSet<String> = orgs.iter().map(|o| o.login.to_lowercase()).collect();
            for repo in inner.installation_repositories()? {
                if repo.owner.kind != "Organization" || !seen.insert(repo.owner.login.to_lowercase()) {
                    continue;
                }
                let raw = serde_json::json!({"login": repo.owner.login, "type": repo.owner.kind});
                orgs.extend(inner.org_ref(raw));
            }
        }

        Ok(orgs)
    }

    fn list_repositories(&self, organization: &str) -> Result<Vec<RepoRef>> {
        let inner = &self.inner;
        let path = format!("/orgs/{}/repos?type=all", urlencoding::encode(organization));
        let mut repos: Vec<RepoRef> = inner.get_paginated(&path, |body| {
            serde_json::from_value::<Vec<ApiRepository>>(body)
                .map(|repos| repos.into_iter().map(RepoRef::from).collect())
                .map_err(|e| Error::Transient(format!("unexpected repository listing: {e}")))
        })?;

        if inner.include_installation_repos {
            repos.extend(
                inner
                    .installation_repositories()?
                    .into_iter()
                    .filter(|r| r.owner.login.eq_ignore_ascii_case(organization))
                    .map(RepoRef::from),
            );
        }

        Ok(repos)
    }

    fn repository(&self, owner: &str, name: &str) -> Result<Box<dyn RepositoryHandle>> {
        let path = format!(
            "/repos/{}/{}",
            urlencoding::encode(owner),
            urlencoding::encode(name)
        );
        let _: Value = self.inner.get_json(&path).map_err(|e| match e {
            Error::NoRepository(_) => Error::NoRepository(format!("{owner}/{name}")),
            other => other,
        })?;

        Ok(Box::new(GithubRepository {
            client: Arc::clone(&self.inner),
            owner: owner.to_string(),
            name: name.to_string(),
        }))
    }
}

struct GithubRepository {
    client: Arc<GithubClient>,
    owner: String,
    name: String,
}

impl GithubRepository {
    fn contents_path(&self, path: &str) -> String {
        format!(
            "/repos/{}/{}/contents/{}",
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.name),
            encode_path(path)
        )
    }

    fn not_found(&self, path: &str) -> Error {
        Error::FileNotFound {
            repository: self.full_name(),
            path: path.to_string(),
        }
    }

    /// Files over the inline size limit come back with `encoding: none`;
    /// those are fetched again through the raw media type.
    fn get_raw(&self, path: &str) -> Result<Vec<u8>> {
        let api_path = self.contents_path(path);
        let resp = self.client.get(&api_path, RAW_MEDIA_TYPE)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(self.not_found(path));
        }
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), resp.headers(), &api_path));
        }
        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| transport_error(e, &api_path))
    }
}

impl RepositoryHandle for GithubRepository {
    fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    fn get_contents(&self, path: &str) -> Result<Vec<u8>> {
        let api_path = self.contents_path(path);
        let resp = self.client.get(&api_path, JSON_MEDIA_TYPE)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(self.not_found(path));
        }
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), resp.headers(), &api_path));
        }

        // Directories are listed as arrays; treat them as a missing file.
        let body: Value = resp.json().map_err(|e| transport_error(e, &api_path))?;
        if body.is_array() {
            return Err(self.not_found(path));
        }
        let file: ContentFile = serde_json::from_value(body)
            .map_err(|e| Error::Transient(format!("unexpected contents payload for {path}: {e}")))?;
        if file.kind != "file" {
            return Err(self.not_found(path));
        }

        match (file.encoding.as_deref(), file.content) {
            (Some("base64"), Some(content)) => decode_content(&content).ok_or_else(|| {
                Error::Transient(format!("could not decode base64 contents of {path}"))
            }),
            _ => self.get_raw(path),
        }
    }
}

/// GitHub wraps base64 payloads at 60 columns.
fn decode_content(content: &str) -> Option<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_web_url_for() {
        assert_eq!(web_url_for("https://api.github.com"), "https://github.com");
        assert_eq!(
            web_url_for("https://git.example.com/api/v3"),
            "https://git.example.com"
        );
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path(".github/catalog.json"), ".github/catalog.json");
        assert_eq!(encode_path("docs/my service.json"), "docs/my%20service.json");
        assert_eq!(encode_path("/a//b"), "a/b");
    }

    #[test]
    fn test_decode_content_with_line_breaks() {
        let encoded = "eyJuYW1lIjog\nImJpbGxpbmcifQ==\n";
        assert_eq!(
            decode_content(encoded).unwrap(),
            br#"{"name": "billing"}"#.to_vec()
        );
        assert!(decode_content("not base64!").is_none());
    }

    #[test]
    fn test_status_error_classification() {
        let empty = HeaderMap::new();
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, &empty, "/repos/a/b"),
            Error::NoRepository(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, &empty, "/repos/a/b"),
            Error::NoRepository(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, &empty, "/x"),
            Error::Transient(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, &empty, "/x"),
            Error::Transient(_)
        ));

        let mut limited = HeaderMap::new();
        limited.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, &limited, "/x"),
            Error::Transient(_)
        ));
    }

    #[test]
    fn test_new_requires_token() {
        let config = GithubConfig::default();
        assert!(matches!(GithubPlatform::new(&config), Err(Error::Config(_))));
    }
}
