// Adapters layer: concrete implementations for external systems (GitHub REST, local files).

pub mod github;
pub mod storage;

pub use github::GitHubClient;
pub use storage::LocalStorage;
