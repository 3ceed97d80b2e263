#[cfg(feature = "cli")]
pub mod cli;

use crate::adapters::github::{GitHubClient, DEFAULT_API_BASE_URL};
use crate::domain::model::{Environment, OwnerKind};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ForgeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::utils::validation::{MAX_REPOSITORY_CAP, MIN_REPOSITORY_CAP};
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_COMMIT_MESSAGE: &str = "chore: scaffold workshop repository";
const DEFAULT_LICENSE: &str = "MIT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_max_repositories")]
    pub max_repositories: usize,
    #[serde(default)]
    pub repositories: Vec<String>,
    pub github: GitHubConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub scaffold: ScaffoldConfig,
    /// 設定檔所在目錄，相對路徑以此為基準
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    #[serde(default)]
    pub owner_kind: OwnerKind,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub gist_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
    pub gist_ids_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    pub template_dir: Option<String>,
    pub default_branch: Option<String>,
    pub commit_message: Option<String>,
    pub license: Option<String>,
    pub author: Option<String>,
}

fn default_max_repositories() -> usize {
    MIN_REPOSITORY_CAP
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// A `${VAR}` left in place by substitution means the variable was not set.
fn is_unresolved(value: &str) -> bool {
    value.contains("${")
}

impl ForgeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ForgeError::IoError)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.as_ref().parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ForgeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GITHUB_OWNER})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ForgeError::config("toml_parsing", e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_repository_cap("max_repositories", self.max_repositories)?;

        if self.repositories.len() > self.max_repositories {
            return Err(ForgeError::config(
                "repositories",
                format!(
                    "{} repositories requested but max_repositories is {}",
                    self.repositories.len(),
                    self.max_repositories
                ),
            ));
        }
        for name in &self.repositories {
            validation::validate_repository_name("repositories", name)?;
        }

        if is_unresolved(&self.github.owner) {
            return Err(ForgeError::config(
                "github.owner",
                format!("environment variable in '{}' is not set", self.github.owner),
            ));
        }
        validation::validate_owner("github.owner", &self.github.owner)?;
        if let Some(username) = &self.github.gist_username {
            validation::validate_owner("github.gist_username", username)?;
        }

        validation::validate_api_base_url("github.api_base_url", &self.github.api_base_url)?;

        if let Some(timeout) = self.github.timeout_seconds {
            validation::validate_timeout_seconds("github.timeout_seconds", timeout)?;
        }

        validation::validate_path("catalog.path", &self.catalog.path)?;
        if let Some(path) = &self.catalog.gist_ids_path {
            validation::validate_path("catalog.gist_ids_path", path)?;
        }
        if let Some(dir) = &self.scaffold.template_dir {
            validation::validate_path("scaffold.template_dir", dir)?;
        }
        if let Some(branch) = &self.scaffold.default_branch {
            validation::validate_branch_name("scaffold.default_branch", branch)?;
        }

        Ok(())
    }

    /// Resolves a configured path against the config file's directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.resolve_path(&self.catalog.path)
    }

    pub fn gist_ids_path(&self) -> Option<PathBuf> {
        self.catalog.gist_ids_path.as_deref().map(|p| self.resolve_path(p))
    }

    pub fn template_dir(&self) -> Option<PathBuf> {
        self.scaffold.template_dir.as_deref().map(|p| self.resolve_path(p))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.github.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// `explicit` (the command line) wins over the config file.
    pub fn token(&self, explicit: Option<&str>) -> Result<Option<String>> {
        let configured = self.github.token.as_deref().filter(|t| !is_unresolved(t));
        resolve_token(explicit.or(configured))
    }

    pub fn github_client(&self, token: Option<String>) -> Result<GitHubClient> {
        Ok(GitHubClient::new(&self.github.api_base_url, token, self.timeout())?
            .with_owner_kind(self.github.owner_kind))
    }
}

/// Client for commands that run without a configuration file.
pub fn default_github_client(token: Option<String>) -> Result<GitHubClient> {
    GitHubClient::new(
        DEFAULT_API_BASE_URL,
        token,
        Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
    )
}

/// Token precedence: explicit value, then `GITHUB_TOKEN`. A value naming a file is read from it.
pub fn resolve_token(explicit: Option<&str>) -> Result<Option<String>> {
    let value = match explicit {
        Some(value) => Some(value.to_string()),
        None => std::env::var("GITHUB_TOKEN").ok(),
    };

    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let candidate = Path::new(&value);
    if candidate.is_file() {
        let token = std::fs::read_to_string(candidate)?.trim().to_string();
        return Ok(Some(token).filter(|t| !t.is_empty()));
    }

    Ok(Some(value))
}

impl ConfigProvider for ForgeConfig {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn owner(&self) -> &str {
        &self.github.owner
    }

    fn repositories(&self) -> &[String] {
        &self.repositories
    }

    fn max_repositories(&self) -> usize {
        self.max_repositories
    }

    fn commit_message(&self) -> &str {
        self.scaffold
            .commit_message
            .as_deref()
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
    }

    fn default_branch(&self) -> &str {
        self.scaffold.default_branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    fn license(&self) -> &str {
        self.scaffold.license.as_deref().unwrap_or(DEFAULT_LICENSE)
    }

    fn author(&self) -> &str {
        self.scaffold.author.as_deref().unwrap_or(&self.github.owner)
    }
}

impl Validate for ForgeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
environment = "prod"
max_repositories = 20
repositories = ["azure-storage-workshop"]

[github]
owner = "octo"
owner_kind = "organization"

[catalog]
path = "github-repo.json"
gist_ids_path = "gist-id.json"

[scaffold]
license = "Apache-2.0"
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = ForgeConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.environment, Environment::Prod);
        assert_eq!(config.max_repositories, 20);
        assert_eq!(config.github.owner_kind, OwnerKind::Organization);
        assert_eq!(config.github.api_base_url, "https://api.github.com");
        assert_eq!(config.license(), "Apache-2.0");
        assert_eq!(config.default_branch(), "main");
        assert_eq!(config.author(), "octo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let config = ForgeConfig::from_toml_str(
            r#"
[github]
owner = "octo"

[catalog]
path = "github-repo.json"
"#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.max_repositories, 10);
        assert!(config.repositories.is_empty());
        assert_eq!(config.commit_message(), "chore: scaffold workshop repository");
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_unset_owner_variable_fails_validation() {
        let config = ForgeConfig::from_toml_str(
            r#"
[github]
owner = "${FORGE_TEST_OWNER_NEVER_SET}"

[catalog]
path = "github-repo.json"
"#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_repository_cap_bounds() {
        let mut config = ForgeConfig::from_toml_str(BASIC).unwrap();

        config.max_repositories = 9;
        assert!(config.validate().is_err());

        config.max_repositories = 1001;
        assert!(config.validate().is_err());

        config.max_repositories = 10;
        config.repositories = (0..11).map(|i| format!("repo-{}", i)).collect();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_branch_follows_git_ref_rules() {
        let mut config = ForgeConfig::from_toml_str(BASIC).unwrap();

        config.scaffold.default_branch = Some("rel]x{y".to_string());
        assert!(config.validate().is_ok());

        config.scaffold.default_branch = Some("wip[1]".to_string());
        assert!(matches!(
            config.validate(),
            Err(ForgeError::InvalidConfigValueError { field, .. }) if field == "scaffold.default_branch"
        ));
    }

    #[test]
    fn test_github_section_checks() {
        let mut config = ForgeConfig::from_toml_str(BASIC).unwrap();
        config.github.timeout_seconds = Some(301);
        assert!(config.validate().is_err());

        let mut config = ForgeConfig::from_toml_str(BASIC).unwrap();
        config.github.api_base_url = "https://ghe.example.com/api/v3?x=1".to_string();
        assert!(config.validate().is_err());

        let mut config = ForgeConfig::from_toml_str(BASIC).unwrap();
        config.github.owner = "octo/workshops".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_environment_is_parse_error() {
        let result = ForgeConfig::from_toml_str(
            r#"
environment = "staging"

[github]
owner = "octo"

[catalog]
path = "github-repo.json"
"#,
        );
        assert!(matches!(result, Err(ForgeError::ConfigValidationError { .. })));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("forge.toml");
        std::fs::write(&path, BASIC).unwrap();

        let config = ForgeConfig::from_file(&path).unwrap();
        assert_eq!(config.catalog_path(), dir.path().join("github-repo.json"));
        assert_eq!(config.gist_ids_path(), Some(dir.path().join("gist-id.json")));
    }

    #[test]
    fn test_token_can_be_read_from_file() {
        let mut token_file = NamedTempFile::new().unwrap();
        writeln!(token_file, "ghp_from_file").unwrap();

        let token = resolve_token(token_file.path().to_str()).unwrap();
        assert_eq!(token.as_deref(), Some("ghp_from_file"));

        let literal = resolve_token(Some("ghp_literal")).unwrap();
        assert_eq!(literal.as_deref(), Some("ghp_literal"));
    }
}
