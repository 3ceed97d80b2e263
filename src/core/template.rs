use crate::utils::error::{ForgeError, Result};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};

/// `{{ name }}` placeholders. A leading `$` marks a GitHub Actions expression,
/// which is left untouched.
const PLACEHOLDER_PATTERN: &str = r"(\$?)\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

/// How substituted values are escaped for the target file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    None,
    /// Values land inside JSON string literals.
    Json,
    /// Values land inside double-quoted YAML scalars.
    Yaml,
}

impl Escape {
    pub fn for_path(path: &str) -> Self {
        if path.ends_with(".json") {
            Escape::Json
        } else if path.ends_with(".yml") || path.ends_with(".yaml") {
            Escape::Yaml
        } else {
            Escape::None
        }
    }
}

/// Variable bindings for one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
    /// Pre-built fragments inserted without escaping.
    raw: BTreeSet<String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.raw.remove(&name);
        self.values.insert(name, value.into());
        self
    }

    /// Binds a fragment that is already valid in the target format.
    pub fn set_raw(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.raw.insert(name.clone());
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn is_raw(&self, name: &str) -> bool {
        self.raw.contains(name)
    }
}

fn placeholder_regex(template_name: &str) -> Result<Regex> {
    Regex::new(PLACEHOLDER_PATTERN).map_err(|e| ForgeError::template(template_name, e.to_string()))
}

fn escape_value(value: &str, escape: Escape) -> Result<String> {
    match escape {
        Escape::None => Ok(value.to_string()),
        Escape::Json | Escape::Yaml => {
            let quoted = serde_json::to_string(value)?;
            Ok(quoted[1..quoted.len() - 1].to_string())
        }
    }
}

/// Substitutes every placeholder. Unknown names are an error listing all of them.
pub fn render(template_name: &str, template: &str, vars: &TemplateVars, escape: Escape) -> Result<String> {
    let re = placeholder_regex(template_name)?;
    let mut missing: Vec<String> = Vec::new();
    let mut escape_failure: Option<ForgeError> = None;

    let rendered = re.replace_all(template, |caps: &Captures| {
        let whole = caps[0].to_string();
        if !caps[1].is_empty() {
            return whole;
        }

        let name = &caps[2];
        match vars.get(name) {
            Some(value) if vars.is_raw(name) => value.to_string(),
            Some(value) => match escape_value(value, escape) {
                Ok(escaped) => escaped,
                Err(e) => {
                    escape_failure.get_or_insert(e);
                    whole
                }
            },
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                whole
            }
        }
    });

    if let Some(e) = escape_failure {
        return Err(e);
    }
    if !missing.is_empty() {
        return Err(ForgeError::template(
            template_name,
            format!("unknown placeholder(s): {}", missing.join(", ")),
        ));
    }

    let mut output = rendered.into_owned();
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

/// Checks that a rendered file is syntactically usable for its extension.
pub fn validate_output(path: &str, content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(ForgeError::template(path, "rendered output is empty"));
    }

    let re = placeholder_regex(path)?;
    if let Some(caps) = re.captures_iter(content).find(|caps| caps[1].is_empty()) {
        return Err(ForgeError::template(
            path,
            format!("unrendered placeholder '{}'", &caps[0]),
        ));
    }

    if path.ends_with(".json") {
        serde_json::from_str::<serde_json::Value>(content)
            .map_err(|e| ForgeError::template(path, format!("invalid JSON: {}", e)))?;
    } else if path.ends_with(".yml") || path.ends_with(".yaml") {
        validate_yaml_shape(path, content)?;
    }

    Ok(())
}

/// YAML 基本檢查：縮排不可用 tab，`${{` 必須在同一行關閉，
/// 單行的 `[...]` / `{...}` 必須成對且之後不可再有文字
fn validate_yaml_shape(path: &str, content: &str) -> Result<()> {
    let mut block_indent: Option<usize> = None;

    for (index, line) in content.lines().enumerate() {
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        if indent.contains('\t') {
            return Err(ForgeError::template(
                path,
                format!("line {} is indented with a tab", index + 1),
            ));
        }

        let mut rest = line;
        while let Some(start) = rest.find("${{") {
            let after = &rest[start + 3..];
            match after.find("}}") {
                Some(end) => rest = &after[end + 2..],
                None => {
                    return Err(ForgeError::template(
                        path,
                        format!("line {} has an unclosed expression", index + 1),
                    ))
                }
            }
        }

        // 區塊純量 (`run: |`) 的內容是 shell，不檢查
        if let Some(block) = block_indent {
            if line.trim().is_empty() || indent.len() > block {
                continue;
            }
            block_indent = None;
        }

        let Some(value) = yaml_value(line) else {
            continue;
        };
        if value.starts_with('[') || value.starts_with('{') {
            check_flow_collection(value)
                .map_err(|reason| ForgeError::template(path, format!("line {} {}", index + 1, reason)))?;
        } else if is_block_scalar(value) {
            block_indent = Some(indent.len());
        }
    }

    Ok(())
}

/// Value part of a `key: value` or `- value` line.
fn yaml_value(line: &str) -> Option<&str> {
    let mut rest = line.trim();
    if rest.starts_with('#') {
        return None;
    }
    while let Some(item) = rest.strip_prefix("- ") {
        rest = item.trim_start();
    }

    if rest.starts_with(|c: char| matches!(c, '[' | '{' | '|' | '>')) {
        return Some(rest);
    }
    rest.split_once(": ").map(|(_, value)| value.trim())
}

fn is_block_scalar(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some('|' | '>'))
        && chars
            .as_str()
            .trim_start_matches(|c: char| c == '-' || c == '+' || c.is_ascii_digit())
            .trim()
            .is_empty()
}

fn check_flow_collection(value: &str) -> std::result::Result<(), &'static str> {
    let chars: Vec<char> = value.chars().collect();
    let mut closers: Vec<char> = Vec::new();
    let mut node_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' if node_start => {
                i = closing_quote(&chars, i).ok_or("has an unterminated quoted string")?;
                node_start = false;
            }
            '$' if chars[i + 1..].starts_with(&['{', '{']) => {
                i = (i + 3..chars.len().saturating_sub(1))
                    .find(|&j| chars[j] == '}' && chars[j + 1] == '}')
                    .ok_or("has an unclosed expression")?
                    + 1;
                node_start = false;
            }
            '[' => {
                closers.push(']');
                node_start = true;
            }
            '{' => {
                closers.push('}');
                node_start = true;
            }
            ']' | '}' => {
                if closers.pop() != Some(c) {
                    return Err("has an unbalanced flow collection");
                }
                if closers.is_empty() {
                    let trailing: String = chars[i + 1..].iter().collect();
                    let trailing = trailing.trim();
                    return if trailing.is_empty() || trailing.starts_with('#') {
                        Ok(())
                    } else {
                        Err("has text after a flow collection")
                    };
                }
                node_start = false;
            }
            ',' | ':' => node_start = true,
            c if c.is_whitespace() => {}
            _ => node_start = false,
        }
        i += 1;
    }

    Err("has an unclosed flow collection")
}

/// Index of the quote closing the scalar opened at `start`.
fn closing_quote(chars: &[char], start: usize) -> Option<usize> {
    let quote = chars[start];
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' if quote == '"' => i += 1,
            c if c == quote => {
                // 單引號字串以 '' 表示一個 '
                if quote == '\'' && chars.get(i + 1) == Some(&'\'') {
                    i += 1;
                } else {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}
