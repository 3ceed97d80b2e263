pub mod catalog;
pub mod export;
pub mod gists;
pub mod plan;
pub mod provisioner;
pub mod report;
pub mod scaffold;
pub mod template;

pub use crate::domain::ports::{ConfigProvider, GitHubApi, Storage};
pub use crate::utils::error::Result;
pub use catalog::Catalog;
pub use export::GistExporter;
pub use gists::{GistSynchronizer, SyncOutcome};
pub use plan::Planner;
pub use provisioner::Provisioner;
pub use scaffold::TemplateSet;
