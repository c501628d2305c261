mod level;
mod models;

pub use level::{LogLevel, TargetKind};
pub use models::*;
