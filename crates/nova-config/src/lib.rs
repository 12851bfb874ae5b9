//! Configuration for the embedding host.
//!
//! The core itself never reads environment variables or files — it is handed
//! a fully-resolved [`CoreConfig`]. This crate only exists to give embedding
//! hosts a conventional way to build one (YAML file, `~`-expansion, defaults).

mod loader;
mod schema;

pub use loader::load;
pub use schema::{AclDefault, CoreConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
