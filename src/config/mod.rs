mod sync;

pub use sync::{GithubConfig, SyncConfig};
