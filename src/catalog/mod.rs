//! Locating, parsing and validating catalog descriptors.

mod descriptor;
mod fetch;
mod resolve;
mod schema;

pub use descriptor::{CatalogEntry, Descriptor, starter_descriptor};
pub use fetch::{fetch, parse_contents};
pub use resolve::{CANDIDATE_PATHS, Resolution, normalize_path, referenced_files, resolve};
pub use schema::SchemaValidator;
