use crate::utils::error::{ForgeError, Result};
use url::Url;

/// 一次可佈建的倉庫數量上下限
pub const MIN_REPOSITORY_CAP: usize = 10;
pub const MAX_REPOSITORY_CAP: usize = 1000;

pub const MAX_TIMEOUT_SECONDS: u64 = 300;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> ForgeError {
    ForgeError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// API paths such as `/user/repos` are appended to this URL verbatim.
pub fn validate_api_base_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
        return Err(invalid(field_name, url_str, "GitHub API base URL is empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("GitHub API base URL does not parse: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field_name,
            url_str,
            format!("GitHub API base URL must be http or https, not {}", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(invalid(field_name, url_str, "GitHub API base URL has no host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(
            field_name,
            url_str,
            "GitHub API base URL cannot carry a query or fragment",
        ));
    }

    Ok(())
}

/// Catalog, template and output locations.
pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field_name, path, "no file or directory given"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "file paths cannot contain NUL bytes"));
    }
    Ok(())
}

pub fn validate_timeout_seconds(field_name: &str, seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TIMEOUT_SECONDS {
        return Err(invalid(
            field_name,
            seconds,
            format!("GitHub request timeout must be 1 to {} seconds", MAX_TIMEOUT_SECONDS),
        ));
    }
    Ok(())
}

pub fn validate_repository_cap(field_name: &str, cap: usize) -> Result<()> {
    if !(MIN_REPOSITORY_CAP..=MAX_REPOSITORY_CAP).contains(&cap) {
        return Err(invalid(
            field_name,
            cap,
            format!(
                "repository cap must be between {} and {}",
                MIN_REPOSITORY_CAP, MAX_REPOSITORY_CAP
            ),
        ));
    }
    Ok(())
}

/// Every command that writes to GitHub needs a token.
pub fn require_token(token: &Option<String>) -> Result<&str> {
    match token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ForgeError::MissingConfigError {
            field: "github.token".to_string(),
        }),
    }
}

/// GitHub 帳號或組織名稱：最多 39 字元，英數字、`-`、`_`，不可以 `-` 開頭或結尾
pub fn validate_owner(field_name: &str, owner: &str) -> Result<()> {
    let reason = if owner.trim().is_empty() {
        Some("GitHub owner is empty".to_string())
    } else if owner.len() > 39 {
        Some("GitHub logins are limited to 39 characters".to_string())
    } else if owner.starts_with('-') || owner.ends_with('-') {
        Some("GitHub logins cannot start or end with '-'".to_string())
    } else if owner.contains("--") {
        Some("GitHub logins cannot contain '--'".to_string())
    } else {
        owner
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
            .map(|c| format!("Character '{}' is not allowed in GitHub logins", c))
    };

    match reason {
        Some(reason) => Err(invalid(field_name, owner, reason)),
        None => Ok(()),
    }
}

/// Branch names follow `git check-ref-format --branch`.
pub fn validate_branch_name(field_name: &str, branch: &str) -> Result<()> {
    let reason = if branch.is_empty() {
        Some("branch name is empty".to_string())
    } else if branch == "@" || branch.contains("@{") {
        Some("branch name cannot be '@' or contain '@{'".to_string())
    } else if branch.starts_with('-') {
        Some("branch name cannot start with '-'".to_string())
    } else if branch.starts_with('/') || branch.ends_with('/') || branch.contains("//") {
        Some("branch name has an empty path component".to_string())
    } else if branch.ends_with('.') || branch.ends_with(".lock") {
        Some("branch name cannot end with '.' or '.lock'".to_string())
    } else if branch.contains("..") || branch.split('/').any(|part| part.starts_with('.')) {
        Some("branch name components cannot start with '.' or contain '..'".to_string())
    } else {
        branch
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
            .map(|c| format!("Character {:?} is not allowed in branch names", c))
    };

    match reason {
        Some(reason) => Err(invalid(field_name, branch, reason)),
        None => Ok(()),
    }
}

/// GitHub 倉庫名稱：最多 100 字元，只允許英數字、`.`、`_`、`-`
pub fn validate_repository_name(field_name: &str, name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("repository name is empty".to_string())
    } else if name.len() > 100 {
        Some("Repository names are limited to 100 characters".to_string())
    } else if name == "." || name == ".." {
        Some("Repository name cannot be '.' or '..'".to_string())
    } else {
        name.chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
            .map(|c| format!("Character '{}' is not allowed in repository names", c))
    };

    match reason {
        Some(reason) => Err(invalid(field_name, name, reason)),
        None => Ok(()),
    }
}
