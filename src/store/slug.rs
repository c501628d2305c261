//! Slug and URL derivation for catalog records.
//!
//! Slugs are never user-supplied: services derive theirs from the declared
//! name, sources from the repository path of their URL.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Converts `value` to a slug: lowercase ASCII alphanumerics, underscores and
/// hyphens, with runs of whitespace and hyphens collapsed to a single hyphen.
/// Accented letters are folded to their base letter first.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;

    for c in value.nfkd() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '-' || c.is_whitespace() {
            pending_separator = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Strips whitespace and any trailing slashes from a repository URL.
pub fn canonical_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Returns the `(owner, repo)` segments of a repository URL such as
/// `https://github.com/acme/billing`.
pub fn repository_path(url: &str) -> Option<(&str, &str)> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let mut segments = without_scheme
        .trim_end_matches('/')
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty());

    let owner = segments.next()?;
    let repo = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    Some((owner, repo.strip_suffix(".git").unwrap_or(repo)))
}

/// Derives the slug for a source from its URL: `acme/billing` becomes
/// `acme-billing`.
pub fn source_slug(url: &str) -> Result<String> {
    let canonical = canonical_url(url);
    let (owner, repo) = repository_path(&canonical).ok_or_else(|| {
        Error::BadRequest(format!(
            "source URL must point at an owner/repository path: {canonical}"
        ))
    })?;

    let slug = slugify(&format!("{owner} {repo}"));
    if slug.is_empty() {
        return Err(Error::BadRequest(format!(
            "source URL produces an empty slug: {canonical}"
        )));
    }
    Ok(slug)
}

/// A source slug that also encodes a hash of the repository path, for when
/// the plain slug of `url` already belongs to a different repository.
/// `acme/billing-x` and `acme-billing/x` share a plain slug but not this one.
pub fn qualified_source_slug(url: &str) -> Result<String> {
    let slug = source_slug(url)?;
    let canonical = canonical_url(url);
    let (owner, repo) = repository_path(&canonical).ok_or_else(|| {
        Error::BadRequest(format!(
            "source URL must point at an owner/repository path: {canonical}"
        ))
    })?;

    let digest = Sha256::digest(format!("{owner}/{repo}").to_lowercase().as_bytes());
    Ok(format!("{slug}-{}", &hex::encode(digest)[..8]))
}

/// Repository URLs compare without regard to case or trailing slashes.
pub fn same_repository(a: &str, b: &str) -> bool {
    canonical_url(a).eq_ignore_ascii_case(&canonical_url(b))
}
