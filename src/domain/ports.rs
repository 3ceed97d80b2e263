use crate::domain::model::{
    Environment, GistPayload, NewRepository, PlannedFile, RemoteGist, RemoteRepository,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn environment(&self) -> Environment;
    fn owner(&self) -> &str;
    fn repositories(&self) -> &[String];
    fn max_repositories(&self) -> usize;
    fn commit_message(&self) -> &str;
    fn default_branch(&self) -> &str;
    fn license(&self) -> &str;
    fn author(&self) -> &str;
}

/// Result of writing one file through the contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileWrite {
    Created,
    Updated,
    Unchanged,
}

#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Option<RemoteRepository>>;
    async fn create_repository(&self, owner: &str, repo: &NewRepository) -> Result<RemoteRepository>;
    async fn replace_topics(&self, owner: &str, name: &str, topics: &[String]) -> Result<()>;
    async fn write_file(
        &self,
        owner: &str,
        name: &str,
        file: &PlannedFile,
        branch: &str,
        message: &str,
    ) -> Result<FileWrite>;

    async fn list_gists(&self, page: u32, per_page: u32) -> Result<Vec<RemoteGist>>;
    async fn fetch_raw(&self, raw_url: &str) -> Result<String>;
    async fn create_gist(&self, payload: &GistPayload) -> Result<RemoteGist>;
    async fn update_gist(&self, id: &str, payload: &GistPayload) -> Result<RemoteGist>;
    async fn delete_gist(&self, id: &str) -> Result<()>;
}
