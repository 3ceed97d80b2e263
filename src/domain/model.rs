use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// 變數
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("unknown environment '{}', expected dev or prod", other)),
        }
    }
}

/// The declarative language a workshop's infrastructure is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfraType {
    Terraform,
    Bicep,
}

impl InfraType {
    pub const ALL: [InfraType; 2] = [InfraType::Terraform, InfraType::Bicep];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfraType::Terraform => "terraform",
            InfraType::Bicep => "bicep",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InfraType::Terraform => "Terraform",
            InfraType::Bicep => "Bicep",
        }
    }

    pub fn workflow_path(&self) -> String {
        format!(".github/workflows/{}.yml", self.as_str())
    }
}

impl fmt::Display for InfraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfraType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terraform" => Ok(InfraType::Terraform),
            "bicep" => Ok(InfraType::Bicep),
            other => Err(format!("unknown infra type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }

    pub fn is_private(&self) -> bool {
        !matches!(self, Visibility::Public)
    }
}

/// Whether repositories are created under a user account or an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    #[default]
    User,
    Organization,
}

// ---------------------------------------------------------------------------
// 目錄
// ---------------------------------------------------------------------------

/// One workshop record of the catalog JSON. `category` may be a string or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "category", deserialize_with = "one_or_many")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub priority: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub iac: Vec<InfraType>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

fn scalar_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(value)) => Some(value),
        Some(other) => Some(other.to_string()),
    })
}

/// One (catalog-id, category, infra-type) triple of the flattened catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkshopKey {
    pub workshop_id: String,
    pub name: String,
    pub category: String,
    pub infra: InfraType,
}

impl WorkshopKey {
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.workshop_id, self.category, self.infra)
    }

    pub fn gist_filename(&self) -> String {
        format!("{}.json", self.key())
    }
}

// ---------------------------------------------------------------------------
// Gist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GistOperation {
    Create,
    Update,
    Delete,
    Fetched,
    Other(String),
}

impl From<String> for GistOperation {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => GistOperation::Create,
            "update" => GistOperation::Update,
            "delete" => GistOperation::Delete,
            "fetched" => GistOperation::Fetched,
            _ => GistOperation::Other(value),
        }
    }
}

impl From<GistOperation> for String {
    fn from(value: GistOperation) -> Self {
        match value {
            GistOperation::Create => "create".to_string(),
            GistOperation::Update => "update".to_string(),
            GistOperation::Delete => "delete".to_string(),
            GistOperation::Fetched => "fetched".to_string(),
            GistOperation::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistRevision {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<String>,
}

/// A gist work item, as read from and written to the gist JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub operation: Option<GistOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<GistRevision>,
}

impl GistEntry {
    /// 空字串 id 視為沒有 id
    pub fn gist_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn default_description(&self) -> String {
        format!("Gist for {}", self.filename)
    }

    /// Text written into the gist file: strings verbatim, everything else pretty JSON.
    pub fn file_content(&self) -> serde_json::Result<String> {
        match &self.content {
            serde_json::Value::String(text) => Ok(text.clone()),
            other => serde_json::to_string_pretty(other),
        }
    }
}

/// shields.io endpoint badge document stored inside workshop gists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeContent {
    pub schema_version: u8,
    pub label: String,
    pub message: String,
    pub color: String,
    pub style: String,
}

impl BadgeContent {
    pub fn for_status(status: Option<&str>) -> Self {
        let message = status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("not started")
            .to_string();
        let color = match message.to_ascii_lowercase().as_str() {
            "not started" => "red",
            "in progress" => "yellow",
            "done" | "completed" => "green",
            _ => "lightgrey",
        };

        Self {
            schema_version: 1,
            label: "status".to_string(),
            message,
            color: color.to_string(),
            style: "flat".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistRef {
    pub id: String,
    pub raw_url: String,
}

/// Gist filename -> gist reference.
pub type GistIdMap = BTreeMap<String, GistRef>;

// ---------------------------------------------------------------------------
// 佈建計畫
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryPlan {
    pub workshop_id: String,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub homepage: Option<String>,
    pub topics: Vec<String>,
    pub infra_types: Vec<InfraType>,
    pub files: Vec<PlannedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionPlan {
    pub environment: Environment,
    pub owner: String,
    pub commit_message: String,
    pub repositories: Vec<RepositoryPlan>,
}

impl ProvisionPlan {
    pub fn file_count(&self) -> usize {
        self.repositories.iter().map(|r| r.files.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// GitHub REST 傳輸型別
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub description: String,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub auto_init: bool,
    pub has_issues: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteGistFile {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub raw_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteGist {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<String, RemoteGistFile>,
    #[serde(default)]
    pub history: Vec<GistRevision>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GistFilePayload {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GistPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    pub files: BTreeMap<String, GistFilePayload>,
}
