use crate::core::template::{render, validate_output, Escape, TemplateVars};
use crate::domain::model::{CatalogEntry, Environment, GistIdMap, InfraType, PlannedFile};
use crate::utils::error::{ForgeError, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;

pub const README: &str = "README.md";
pub const CONTRIBUTING: &str = "CONTRIBUTING.md";
pub const CHANGELOG: &str = "CHANGELOG.md";
pub const PACKAGE_MANIFEST: &str = "package.json";
pub const RELEASE_WORKFLOW: &str = "release.yml";
pub const DEPENDABOT: &str = "dependabot.yml";

const BUILTIN: [(&str, &str); 8] = [
    (README, include_str!("../../templates/README.md.tmpl")),
    (CONTRIBUTING, include_str!("../../templates/CONTRIBUTING.md.tmpl")),
    (CHANGELOG, include_str!("../../templates/CHANGELOG.md.tmpl")),
    (PACKAGE_MANIFEST, include_str!("../../templates/package.json.tmpl")),
    ("terraform.yml", include_str!("../../templates/terraform.yml.tmpl")),
    ("bicep.yml", include_str!("../../templates/bicep.yml.tmpl")),
    (RELEASE_WORKFLOW, include_str!("../../templates/release.yml.tmpl")),
    (DEPENDABOT, include_str!("../../templates/dependabot.yml.tmpl")),
];

/// Scaffold templates, built in, optionally overridden from a directory of `<name>.tmpl` files.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: BTreeMap<String, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateSet {
    pub fn builtin() -> Self {
        Self {
            templates: BUILTIN
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect(),
        }
    }

    /// 目錄中存在的同名 `.tmpl` 檔覆蓋內建模板
    pub fn with_overrides<P: AsRef<Path>>(mut self, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ForgeError::config(
                "scaffold.template_dir",
                format!("'{}' is not a directory", dir.display()),
            ));
        }

        for (name, body) in self.templates.iter_mut() {
            let candidate = dir.join(format!("{}.tmpl", name));
            if candidate.is_file() {
                tracing::debug!("Using template override {}", candidate.display());
                *body = std::fs::read_to_string(&candidate)?;
            }
        }

        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ForgeError::template(name, "no such template"))
    }

    pub fn insert(&mut self, name: &str, body: impl Into<String>) {
        self.templates.insert(name.to_string(), body.into());
    }
}

/// Everything one repository's scaffold depends on.
#[derive(Debug, Clone)]
pub struct ScaffoldContext<'a> {
    pub workshop_id: &'a str,
    pub repo_name: &'a str,
    pub entry: &'a CatalogEntry,
    pub environment: Environment,
    pub owner: &'a str,
    pub default_branch: &'a str,
    pub license: &'a str,
    pub author: &'a str,
    pub gist_ids: &'a GistIdMap,
    pub date: NaiveDate,
}

impl ScaffoldContext<'_> {
    pub fn repository_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo_name)
    }

    /// One shields.io endpoint badge per (category, infra) key that has a gist.
    pub fn badges(&self) -> Vec<String> {
        let mut badges = Vec::new();

        for category in &self.entry.categories {
            for infra in &self.entry.iac {
                let key = format!("{}-{}-{}", self.workshop_id, category, infra);
                let gist = self
                    .gist_ids
                    .get(&format!("{}.json", key))
                    .or_else(|| self.gist_ids.get(&key));

                if let Some(gist) = gist {
                    let encoded: String =
                        url::form_urlencoded::byte_serialize(gist.raw_url.as_bytes()).collect();
                    let label = if self.entry.categories.len() > 1 {
                        format!("{} {}", infra.display_name(), category)
                    } else {
                        infra.display_name().to_string()
                    };
                    badges.push(format!(
                        "![{} status](https://img.shields.io/endpoint?url={})",
                        label, encoded
                    ));
                }
            }
        }

        badges
    }

    pub fn vars(&self) -> TemplateVars {
        let infra_names: Vec<&str> = self.entry.iac.iter().map(|i| i.display_name()).collect();
        let infra_folders: Vec<String> =
            self.entry.iac.iter().map(|i| format!("`{}/`", i.as_str())).collect();
        let homepage_line = match &self.entry.url {
            Some(url) if !url.trim().is_empty() => format!("Workshop material: <{}>", url),
            _ => String::new(),
        };

        let mut vars = TemplateVars::new();
        vars.set("repo_name", self.repo_name)
            .set("package_name", self.repo_name.to_ascii_lowercase())
            .set("workshop_id", self.workshop_id)
            .set("description", self.entry.description.as_str())
            .set("category", self.entry.categories.join(", "))
            .set("environment", self.environment.as_str())
            .set("owner", self.owner)
            .set("repository_url", self.repository_url())
            .set("status", self.entry.status.as_deref().unwrap_or("not started"))
            .set("priority", self.entry.priority.as_deref().unwrap_or("-"))
            .set("infra_types", if infra_names.is_empty() { "none".to_string() } else { infra_names.join(", ") })
            .set("infra_folders", if infra_folders.is_empty() { "none".to_string() } else { infra_folders.join(", ") })
            .set("badges", self.badges().join("\n"))
            .set("homepage_line", homepage_line)
            .set("default_branch", self.default_branch)
            .set("license", self.license)
            .set("author", self.author)
            .set("date", self.date.format("%Y-%m-%d").to_string())
            .set("year", self.date.year().to_string())
            .set_raw("dependabot_updates", dependabot_updates(&self.entry.iac));
        vars
    }
}

/// Dependabot 生態系：terraform 專案才加 terraform
fn dependabot_updates(infra_types: &[InfraType]) -> String {
    let mut ecosystems = vec!["github-actions", "npm"];
    if infra_types.contains(&InfraType::Terraform) {
        ecosystems.push("terraform");
    }

    ecosystems
        .iter()
        .map(|ecosystem| {
            let directory = if *ecosystem == "terraform" { "/terraform" } else { "/" };
            format!(
                "  - package-ecosystem: \"{}\"\n    directory: \"{}\"\n    schedule:\n      interval: \"weekly\"",
                ecosystem, directory
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Repository path and template name of every file a workshop repository gets.
pub fn scaffold_layout(infra_types: &[InfraType]) -> Vec<(String, String)> {
    let mut layout = vec![
        (README.to_string(), README.to_string()),
        (CONTRIBUTING.to_string(), CONTRIBUTING.to_string()),
        (CHANGELOG.to_string(), CHANGELOG.to_string()),
        (PACKAGE_MANIFEST.to_string(), PACKAGE_MANIFEST.to_string()),
    ];

    let mut seen = Vec::new();
    for infra in infra_types {
        if !seen.contains(infra) {
            seen.push(*infra);
            layout.push((infra.workflow_path(), format!("{}.yml", infra.as_str())));
        }
    }

    layout.push((
        format!(".github/workflows/{}", RELEASE_WORKFLOW),
        RELEASE_WORKFLOW.to_string(),
    ));
    layout.push((format!(".github/{}", DEPENDABOT), DEPENDABOT.to_string()));
    layout
}

/// Renders and validates every scaffold file for one repository.
pub fn scaffold_files(templates: &TemplateSet, ctx: &ScaffoldContext<'_>) -> Result<Vec<PlannedFile>> {
    let vars = ctx.vars();

    scaffold_layout(&ctx.entry.iac)
        .into_iter()
        .map(|(path, template_name)| {
            let template = templates.get(&template_name)?;
            let content = render(&template_name, template, &vars, Escape::for_path(&path))?;
            validate_output(&path, &content)?;
            Ok(PlannedFile { path, content })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{GistRef, Visibility};

    fn entry(iac: Vec<InfraType>) -> CatalogEntry {
        CatalogEntry {
            name: "azure-storage-workshop".to_string(),
            categories: vec!["storage".to_string()],
            description: "Blob & queue \"basics\"".to_string(),
            visibility: Visibility::Public,
            status: Some("in progress".to_string()),
            priority: Some("high".to_string()),
            url: Some("https://workshops.example.com/storage".to_string()),
            iac,
        }
    }

    fn gist_ids() -> GistIdMap {
        let mut map = GistIdMap::new();
        map.insert(
            "0001-storage-terraform.json".to_string(),
            GistRef {
                id: "abc123".to_string(),
                raw_url: "https://gist.githubusercontent.com/octo/abc123/raw/0001-storage-terraform.json"
                    .to_string(),
            },
        );
        map
    }

    fn render_all(iac: Vec<InfraType>) -> Vec<PlannedFile> {
        let entry = entry(iac);
        let gist_ids = gist_ids();
        let ctx = ScaffoldContext {
            workshop_id: "0001",
            repo_name: "azure-storage-workshop",
            entry: &entry,
            environment: Environment::Prod,
            owner: "octo",
            default_branch: "main",
            license: "MIT",
            author: "Workshop Team",
            gist_ids: &gist_ids,
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        };
        scaffold_files(&TemplateSet::builtin(), &ctx).unwrap()
    }

    fn file<'a>(files: &'a [PlannedFile], path: &str) -> &'a PlannedFile {
        files.iter().find(|f| f.path == path).unwrap()
    }

    #[test]
    fn test_terraform_and_bicep_layout() {
        let files = render_all(vec![InfraType::Terraform, InfraType::Bicep]);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(
            paths,
            vec![
                "README.md",
                "CONTRIBUTING.md",
                "CHANGELOG.md",
                "package.json",
                ".github/workflows/terraform.yml",
                ".github/workflows/bicep.yml",
                ".github/workflows/release.yml",
                ".github/dependabot.yml",
            ]
        );
    }

    #[test]
    fn test_bicep_only_has_no_terraform_ecosystem() {
        let files = render_all(vec![InfraType::Bicep]);

        assert!(files.iter().all(|f| f.path != ".github/workflows/terraform.yml"));
        let dependabot = &file(&files, ".github/dependabot.yml").content;
        assert!(dependabot.contains("\"github-actions\""));
        assert!(!dependabot.contains("\"terraform\""));

        let tf_files = render_all(vec![InfraType::Terraform]);
        assert!(file(&tf_files, ".github/dependabot.yml")
            .content
            .contains("package-ecosystem: \"terraform\""));
    }

    #[test]
    fn test_readme_has_badge_only_for_known_gists() {
        let files = render_all(vec![InfraType::Terraform, InfraType::Bicep]);
        let readme = &file(&files, "README.md").content;

        assert!(readme.starts_with("# azure-storage-workshop\n"));
        assert!(readme.contains("![Terraform status](https://img.shields.io/endpoint?url=https%3A%2F%2Fgist.githubusercontent.com%2Focto%2Fabc123%2Fraw%2F0001-storage-terraform.json)"));
        assert!(!readme.contains("![Bicep status]"));
        assert!(readme.contains("| 0001 | storage | Terraform, Bicep | in progress | high |"));
        assert!(readme.contains("Workshop material: <https://workshops.example.com/storage>"));
    }

    #[test]
    fn test_package_manifest_is_valid_json() {
        let files = render_all(vec![InfraType::Terraform]);
        let manifest: serde_json::Value =
            serde_json::from_str(&file(&files, "package.json").content).unwrap();

        assert_eq!(manifest["name"], "azure-storage-workshop");
        assert_eq!(manifest["description"], "Blob & queue \"basics\"");
        assert_eq!(manifest["repository"]["url"], "git+https://github.com/octo/azure-storage-workshop.git");
        assert_eq!(manifest["release"]["branches"][0], "main");
    }

    #[test]
    fn test_release_workflow_keeps_secret_expression() {
        let files = render_all(vec![InfraType::Terraform]);
        let release = &file(&files, ".github/workflows/release.yml").content;
        assert!(release.contains("GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}"));
        assert!(release.contains("branches: [\"main\"]"));
    }

    #[test]
    fn test_branch_with_flow_characters_stays_valid_yaml() {
        let entry = entry(vec![InfraType::Terraform, InfraType::Bicep]);
        let gist_ids = GistIdMap::new();
        let ctx = ScaffoldContext {
            workshop_id: "0001",
            repo_name: "azure-storage-workshop",
            entry: &entry,
            environment: Environment::Dev,
            owner: "octo",
            default_branch: "rel]x{y",
            license: "MIT",
            author: "Workshop Team",
            gist_ids: &gist_ids,
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };

        let files = scaffold_files(&TemplateSet::builtin(), &ctx).unwrap();
        for path in [
            ".github/workflows/terraform.yml",
            ".github/workflows/bicep.yml",
            ".github/workflows/release.yml",
        ] {
            let workflow = &file(&files, path).content;
            assert!(workflow.contains(r#"branches: ["rel]x{y"]"#), "{}", path);
        }
        assert!(file(&files, ".github/dependabot.yml")
            .content
            .contains("  - package-ecosystem: \"github-actions\"\n"));

        let mut templates = TemplateSet::builtin();
        templates.insert(RELEASE_WORKFLOW, "on:\n  push:\n    branches: [{{ default_branch }}]\n");
        assert!(matches!(
            scaffold_files(&templates, &ctx),
            Err(ForgeError::TemplateError { .. })
        ));
    }

    #[test]
    fn test_changelog_uses_context_date() {
        let files = render_all(vec![InfraType::Bicep]);
        assert!(file(&files, "CHANGELOG.md")
            .content
            .contains("workshop 0001 (Bicep), 2026-10-16."));
    }

    #[test]
    fn test_override_directory_replaces_single_template() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("README.md.tmpl"), "# {{ repo_name }} (custom)\n").unwrap();

        let templates = TemplateSet::builtin().with_overrides(temp_dir.path()).unwrap();
        assert_eq!(templates.get(README).unwrap(), "# {{ repo_name }} (custom)\n");
        assert_eq!(
            templates.get(CHANGELOG).unwrap(),
            TemplateSet::builtin().get(CHANGELOG).unwrap()
        );

        assert!(TemplateSet::builtin()
            .with_overrides(temp_dir.path().join("missing"))
            .is_err());
    }

    #[test]
    fn test_unknown_placeholder_in_override_fails() {
        let mut templates = TemplateSet::builtin();
        templates.insert(CONTRIBUTING, "{{ maintainer }}");
        let entry = entry(vec![InfraType::Terraform]);
        let gist_ids = GistIdMap::new();
        let ctx = ScaffoldContext {
            workshop_id: "0001",
            repo_name: "azure-storage-workshop",
            entry: &entry,
            environment: Environment::Dev,
            owner: "octo",
            default_branch: "main",
            license: "MIT",
            author: "Workshop Team",
            gist_ids: &gist_ids,
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };

        assert!(matches!(
            scaffold_files(&templates, &ctx),
            Err(ForgeError::TemplateError { .. })
        ));
    }
}
