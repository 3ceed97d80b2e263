use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Catalog error: {message}")]
    CatalogError { message: String },

    #[error("Duplicate workshop key '{key}'")]
    DuplicateKeyError { key: String },

    #[error("Template '{template}' failed: {message}")]
    TemplateError { template: String, message: String },

    #[error("GitHub API returned {status} for {operation}: {message}")]
    GitHubApiError {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Catalog,
    Template,
    Network,
    RateLimit,
    Remote,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ForgeError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::CatalogError {
            message: message.into(),
        }
    }

    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateError {
            template: template.into(),
            message: message.into(),
        }
    }

    /// GitHub 以 403/429 表示速率限制
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::GitHubApiError { status: 403, .. } | Self::GitHubApiError { status: 429, .. }
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::CatalogError { .. } | Self::DuplicateKeyError { .. } => ErrorCategory::Catalog,
            Self::TemplateError { .. } => ErrorCategory::Template,
            Self::ApiError(_) => ErrorCategory::Network,
            Self::GitHubApiError { .. } if self.is_rate_limited() => ErrorCategory::RateLimit,
            Self::GitHubApiError { .. } => ErrorCategory::Remote,
            Self::IoError(_) | Self::ZipError(_) | Self::CsvError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) | Self::ValidationError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::RateLimit => ErrorSeverity::Medium,
            ErrorCategory::Configuration
            | ErrorCategory::Catalog
            | ErrorCategory::Template
            | ErrorCategory::Remote
            | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. } => {
                format!("Check the '{}' entry in forge.toml", field)
            }
            Self::MissingConfigError { field } => {
                format!("Add '{}' to forge.toml or pass it on the command line", field)
            }
            Self::CatalogError { .. } => {
                "Check the catalog JSON: every entry needs a name and a category".to_string()
            }
            Self::DuplicateKeyError { .. } => {
                "Remove repeated categories or infra types, and avoid '-' in catalog ids".to_string()
            }
            Self::TemplateError { .. } => {
                "Check the template for unknown {{ placeholders }} or invalid syntax".to_string()
            }
            Self::ApiError(_) => "Check network connectivity and the GitHub API URL".to_string(),
            Self::GitHubApiError { status: 401, .. } => {
                "Set GITHUB_TOKEN or pass --token with a valid personal access token".to_string()
            }
            Self::GitHubApiError { .. } if self.is_rate_limited() => {
                "GitHub rate limit reached; wait for the limit window to reset".to_string()
            }
            Self::GitHubApiError { status: 404, .. } => {
                "Check the owner name and that the token can see the resource".to_string()
            }
            Self::GitHubApiError { .. } => "Inspect the GitHub response message above".to_string(),
            Self::IoError(_) => "Check that the path exists and is writable".to_string(),
            Self::ZipError(_) => "Check free disk space for the archive".to_string(),
            Self::CsvError(_) => "Check the report output path".to_string(),
            Self::SerializationError(_) => "Check that the input file is valid JSON".to_string(),
            Self::ValidationError { .. } => "Fix the reported value and run again".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Catalog => format!("Workshop catalog problem: {}", self),
            ErrorCategory::Template => format!("Scaffold template problem: {}", self),
            ErrorCategory::Network => format!("Could not reach GitHub: {}", self),
            ErrorCategory::RateLimit => format!("GitHub rate limit hit: {}", self),
            ErrorCategory::Remote => format!("GitHub rejected the request: {}", self),
            ErrorCategory::Storage => format!("Local file problem: {}", self),
            ErrorCategory::Data => format!("Invalid data: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> ForgeError {
        ForgeError::GitHubApiError {
            operation: "create repository".to_string(),
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_rate_limit_statuses_are_medium_severity() {
        assert_eq!(api_error(429).category(), ErrorCategory::RateLimit);
        assert_eq!(api_error(403).severity(), ErrorSeverity::Medium);
        assert_eq!(api_error(422).category(), ErrorCategory::Remote);
        assert_eq!(api_error(422).severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_recovery_suggestion_names_field() {
        let err = ForgeError::config("max_repositories", "too large");
        assert!(err.recovery_suggestion().contains("max_repositories"));
        assert!(err.user_friendly_message().starts_with("Configuration problem"));
    }
}
