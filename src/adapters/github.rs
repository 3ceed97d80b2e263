use crate::domain::model::{
    GistPayload, NewRepository, OwnerKind, PlannedFile, RemoteGist, RemoteRepository,
};
use crate::domain::ports::{FileWrite, GitHubApi};
use crate::utils::error::{ForgeError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("workshop-forge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

/// REST client for the parts of the GitHub API the forge uses.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    owner_kind: OwnerKind,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            owner_kind: OwnerKind::User,
        })
    }

    pub fn with_owner_kind(mut self, owner_kind: OwnerKind) -> Self {
        self.owner_kind = owner_kind;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("token {}", token)),
            None => builder,
        }
    }

    async fn get_contents(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<ContentsResponse>> {
        let url = self.url(&format!("/repos/{}/{}/contents/{}", owner, name, path));
        let response = self
            .request(Method::GET, &url)
            .query(&[("ref", branch)])
            .send()
            .await?;

        // 空倉庫或檔案不存在都回 404
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success("read repository file", response).await?;
        Ok(Some(response.json().await?))
    }
}

/// Turns a non-2xx response into `GitHubApiError`, keeping GitHub's `message` field.
async fn ensure_success(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);

    tracing::debug!("GitHub {} failed with {}: {}", operation, status, message);

    Err(ForgeError::GitHubApiError {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

fn decode_content(encoded: &str) -> Option<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Option<RemoteRepository>> {
        let url = self.url(&format!("/repos/{}/{}", owner, name));
        let response = self.request(Method::GET, &url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success("get repository", response).await?;
        Ok(Some(response.json().await?))
    }

    async fn create_repository(&self, owner: &str, repo: &NewRepository) -> Result<RemoteRepository> {
        let url = match self.owner_kind {
            OwnerKind::User => self.url("/user/repos"),
            OwnerKind::Organization => self.url(&format!("/orgs/{}/repos", owner)),
        };

        let mut body = repo.clone();
        if self.owner_kind == OwnerKind::User {
            // 個人帳號的建立 API 不接受 visibility
            body.visibility = None;
        }

        let response = self.request(Method::POST, &url).json(&body).send().await?;
        let response = ensure_success("create repository", response).await?;
        Ok(response.json().await?)
    }

    async fn replace_topics(&self, owner: &str, name: &str, topics: &[String]) -> Result<()> {
        let url = self.url(&format!("/repos/{}/{}/topics", owner, name));
        let response = self
            .request(Method::PUT, &url)
            .json(&serde_json::json!({ "names": topics }))
            .send()
            .await?;
        ensure_success("replace topics", response).await?;
        Ok(())
    }

    async fn write_file(
        &self,
        owner: &str,
        name: &str,
        file: &PlannedFile,
        branch: &str,
        message: &str,
    ) -> Result<FileWrite> {
        let existing = self.get_contents(owner, name, &file.path, branch).await?;

        if let Some(current) = &existing {
            let unchanged = current
                .content
                .as_deref()
                .and_then(decode_content)
                .is_some_and(|bytes| bytes == file.content.as_bytes());
            if unchanged {
                return Ok(FileWrite::Unchanged);
            }
        }

        let mut body = serde_json::json!({
            "message": message,
            "content": STANDARD.encode(file.content.as_bytes()),
            "branch": branch,
        });
        if let Some(current) = &existing {
            body["sha"] = serde_json::Value::String(current.sha.clone());
        }

        let url = self.url(&format!("/repos/{}/{}/contents/{}", owner, name, file.path));
        let response = self.request(Method::PUT, &url).json(&body).send().await?;
        ensure_success("write repository file", response).await?;

        Ok(if existing.is_some() {
            FileWrite::Updated
        } else {
            FileWrite::Created
        })
    }

    async fn list_gists(&self, page: u32, per_page: u32) -> Result<Vec<RemoteGist>> {
        let url = self.url("/gists");
        let response = self
            .request(Method::GET, &url)
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await?;
        let response = ensure_success("list gists", response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_raw(&self, raw_url: &str) -> Result<String> {
        let response = self.request(Method::GET, raw_url).send().await?;
        let response = ensure_success("fetch gist content", response).await?;
        Ok(response.text().await?)
    }

    async fn create_gist(&self, payload: &GistPayload) -> Result<RemoteGist> {
        let url = self.url("/gists");
        let response = self.request(Method::POST, &url).json(payload).send().await?;
        let response = ensure_success("create gist", response).await?;
        Ok(response.json().await?)
    }

    async fn update_gist(&self, id: &str, payload: &GistPayload) -> Result<RemoteGist> {
        let url = self.url(&format!("/gists/{}", id));
        let response = self.request(Method::PATCH, &url).json(payload).send().await?;
        let response = ensure_success("update gist", response).await?;
        Ok(response.json().await?)
    }

    async fn delete_gist(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/gists/{}", id));
        let response = self.request(Method::DELETE, &url).send().await?;
        ensure_success("delete gist", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(&server.base_url(), Some("secret".to_string()), Duration::from_secs(5))
            .unwrap()
    }

    fn readme() -> PlannedFile {
        PlannedFile {
            path: "README.md".to_string(),
            content: "# Workshop\n".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_repository_not_found_is_none() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octo/missing")
                .header("authorization", "token secret");
            then.status(404).json_body(serde_json::json!({"message": "Not Found"}));
        });

        let result = client(&server).get_repository("octo", "missing").await.unwrap();

        api_mock.assert();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_repository_for_organization_uses_org_endpoint() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/orgs/acme/repos")
                .json_body_partial(r#"{"name": "lab", "visibility": "internal"}"#);
            then.status(201)
                .json_body(serde_json::json!({"name": "lab", "full_name": "acme/lab", "private": true}));
        });

        let repo = NewRepository {
            name: "lab".to_string(),
            description: "Lab".to_string(),
            private: true,
            visibility: Some("internal".to_string()),
            homepage: None,
            auto_init: false,
            has_issues: true,
        };
        let created = client(&server)
            .with_owner_kind(OwnerKind::Organization)
            .create_repository("acme", &repo)
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(created.full_name.as_deref(), Some("acme/lab"));
    }

    #[tokio::test]
    async fn test_write_file_creates_missing_file() {
        let server = MockServer::start();
        let get_mock = server.mock(|when, then| {
            when.method(GET).path("/repos/octo/lab/contents/README.md");
            then.status(404);
        });
        let put_mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/repos/octo/lab/contents/README.md")
                .json_body_partial(r#"{"content": "IyBXb3Jrc2hvcAo=", "branch": "main"}"#);
            then.status(201).json_body(serde_json::json!({}));
        });

        let outcome = client(&server)
            .write_file("octo", "lab", &readme(), "main", "scaffold")
            .await
            .unwrap();

        get_mock.assert();
        put_mock.assert();
        assert_eq!(outcome, FileWrite::Created);
    }

    #[tokio::test]
    async fn test_write_file_skips_identical_content() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/lab/contents/README.md");
            then.status(200)
                .json_body(serde_json::json!({"sha": "abc", "content": "IyBXb3Jr\nc2hvcAo=\n"}));
        });
        let put_mock = server.mock(|when, then| {
            when.method(PUT).path("/repos/octo/lab/contents/README.md");
            then.status(200);
        });

        let outcome = client(&server)
            .write_file("octo", "lab", &readme(), "main", "scaffold")
            .await
            .unwrap();

        assert_eq!(outcome, FileWrite::Unchanged);
        put_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_write_file_updates_with_sha() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/lab/contents/README.md");
            then.status(200)
                .json_body(serde_json::json!({"sha": "abc", "content": "b2xkCg=="}));
        });
        let put_mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/repos/octo/lab/contents/README.md")
                .json_body_partial(r#"{"sha": "abc"}"#);
            then.status(200).json_body(serde_json::json!({}));
        });

        let outcome = client(&server)
            .write_file("octo", "lab", &readme(), "main", "scaffold")
            .await
            .unwrap();

        put_mock.assert();
        assert_eq!(outcome, FileWrite::Updated);
    }

    #[tokio::test]
    async fn test_error_status_keeps_github_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/gists/g1");
            then.status(403)
                .json_body(serde_json::json!({"message": "API rate limit exceeded"}));
        });

        let err = client(&server).delete_gist("g1").await.unwrap_err();

        match &err {
            ForgeError::GitHubApiError { status, message, .. } => {
                assert_eq!(*status, 403);
                assert_eq!(message, "API rate limit exceeded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_rate_limited());
    }
}
