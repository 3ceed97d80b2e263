pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::{Cli, Command};
pub use crate::config::ForgeConfig;

pub use crate::adapters::{GitHubClient, LocalStorage};
pub use crate::core::{Catalog, GistExporter, GistSynchronizer, Planner, Provisioner, TemplateSet};
pub use crate::utils::error::{ForgeError, Result};
