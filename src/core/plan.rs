use crate::core::catalog::Catalog;
use crate::core::scaffold::{scaffold_files, ScaffoldContext, TemplateSet};
use crate::domain::model::{
    CatalogEntry, Environment, GistIdMap, ProvisionPlan, RepositoryPlan, Visibility,
};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ForgeError, Result};
use crate::utils::validation;
use chrono::NaiveDate;

/// Repository name for an environment: dev copies get a `-dev` suffix.
pub fn repository_name(name: &str, environment: Environment) -> String {
    match environment {
        Environment::Prod => name.to_string(),
        Environment::Dev => format!("{}-dev", name),
    }
}

/// dev 一律私有
pub fn repository_visibility(visibility: Visibility, environment: Environment) -> Visibility {
    match environment {
        Environment::Prod => visibility,
        Environment::Dev => Visibility::Private,
    }
}

/// GitHub topics: lowercase, `[a-z0-9-]`, at most 50 characters.
pub fn topic_slug(raw: &str) -> Option<String> {
    let slug: String = raw
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let slug: String = slug.chars().take(50).collect();
    let slug = slug.trim_end_matches('-').to_string();

    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

fn topics_for(entry: &CatalogEntry) -> Vec<String> {
    let mut topics = Vec::new();
    let raw = entry
        .categories
        .iter()
        .map(String::as_str)
        .chain(entry.iac.iter().map(|i| i.as_str()));

    for topic in raw.filter_map(topic_slug) {
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    topics
}

pub struct Planner<'a, C: ConfigProvider> {
    config: &'a C,
    catalog: &'a Catalog,
    gist_ids: &'a GistIdMap,
    templates: &'a TemplateSet,
    date: NaiveDate,
}

impl<'a, C: ConfigProvider> Planner<'a, C> {
    pub fn new(
        config: &'a C,
        catalog: &'a Catalog,
        gist_ids: &'a GistIdMap,
        templates: &'a TemplateSet,
    ) -> Self {
        Self {
            config,
            catalog,
            gist_ids,
            templates,
            date: chrono::Utc::now().date_naive(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// 靜態檢查先於任何 API 呼叫
    fn check_bounds(&self, selected: usize) -> Result<()> {
        let cap = self.config.max_repositories();
        validation::validate_repository_cap("max_repositories", cap)?;

        if selected > cap {
            return Err(ForgeError::ValidationError {
                message: format!(
                    "{} repositories selected but at most {} may be provisioned",
                    selected, cap
                ),
            });
        }
        Ok(())
    }

    pub fn build(&self) -> Result<ProvisionPlan> {
        let environment = self.config.environment();
        let owner = self.config.owner();
        validation::validate_owner("github.owner", owner)?;

        let selected = self.catalog.select(self.config.repositories())?;
        self.check_bounds(selected.len())?;

        tracing::info!(
            "🗂️ Planning {} repositories for environment '{}'",
            selected.len(),
            environment
        );

        let mut repositories = Vec::with_capacity(selected.len());
        for (workshop_id, entry) in selected {
            let name = repository_name(&entry.name, environment);
            validation::validate_repository_name(&format!("catalog.{}.name", workshop_id), &name)?;

            let ctx = ScaffoldContext {
                workshop_id,
                repo_name: &name,
                entry,
                environment,
                owner,
                default_branch: self.config.default_branch(),
                license: self.config.license(),
                author: self.config.author(),
                gist_ids: self.gist_ids,
                date: self.date,
            };
            let files = scaffold_files(self.templates, &ctx)?;
            tracing::debug!("📄 {}: {} scaffold files rendered", name, files.len());

            repositories.push(RepositoryPlan {
                workshop_id: workshop_id.to_string(),
                name,
                description: entry.description.clone(),
                visibility: repository_visibility(entry.visibility, environment),
                homepage: entry.url.clone().filter(|u| !u.trim().is_empty()),
                topics: topics_for(entry),
                infra_types: entry.iac.clone(),
                files,
            });
        }

        Ok(ProvisionPlan {
            environment,
            owner: owner.to_string(),
            commit_message: self.config.commit_message().to_string(),
            repositories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockConfig {
        environment: Environment,
        repositories: Vec<String>,
        max_repositories: usize,
    }

    impl MockConfig {
        fn new(environment: Environment) -> Self {
            Self {
                environment,
                repositories: vec![],
                max_repositories: 10,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn environment(&self) -> Environment {
            self.environment
        }

        fn owner(&self) -> &str {
            "octo"
        }

        fn repositories(&self) -> &[String] {
            &self.repositories
        }

        fn max_repositories(&self) -> usize {
            self.max_repositories
        }

        fn commit_message(&self) -> &str {
            "chore: scaffold"
        }

        fn default_branch(&self) -> &str {
            "main"
        }

        fn license(&self) -> &str {
            "MIT"
        }

        fn author(&self) -> &str {
            "Workshop Team"
        }
    }

    fn catalog_with(count: usize) -> Catalog {
        let entries: serde_json::Map<String, serde_json::Value> = (1..=count)
            .map(|i| {
                (
                    format!("{:04}", i),
                    serde_json::json!({
                        "name": format!("workshop-{}", i),
                        "category": "Storage_Accounts",
                        "visibility": "public",
                        "iac": ["terraform"]
                    }),
                )
            })
            .collect();
        Catalog::from_json_str(&serde_json::Value::Object(entries).to_string()).unwrap()
    }

    fn plan(config: &MockConfig, catalog: &Catalog) -> Result<ProvisionPlan> {
        let gist_ids = GistIdMap::new();
        let templates = TemplateSet::builtin();
        Planner::new(config, catalog, &gist_ids, &templates)
            .with_date(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
            .build()
    }

    #[test]
    fn test_dev_plan_suffixes_names_and_forces_private() {
        let catalog = catalog_with(2);
        let plan = plan(&MockConfig::new(Environment::Dev), &catalog).unwrap();

        assert_eq!(plan.repositories.len(), 2);
        assert_eq!(plan.repositories[0].name, "workshop-1-dev");
        assert_eq!(plan.repositories[0].visibility, Visibility::Private);
        assert_eq!(plan.owner, "octo");
        assert_eq!(plan.file_count(), 2 * 7);
    }

    #[test]
    fn test_prod_plan_keeps_catalog_visibility() {
        let catalog = catalog_with(1);
        let plan = plan(&MockConfig::new(Environment::Prod), &catalog).unwrap();

        let repo = &plan.repositories[0];
        assert_eq!(repo.name, "workshop-1");
        assert_eq!(repo.visibility, Visibility::Public);
        assert_eq!(repo.topics, vec!["storage-accounts", "terraform"]);
    }

    #[test]
    fn test_selection_over_cap_is_rejected() {
        let catalog = catalog_with(11);
        let result = plan(&MockConfig::new(Environment::Prod), &catalog);
        assert!(matches!(result, Err(ForgeError::ValidationError { .. })));

        let mut config = MockConfig::new(Environment::Prod);
        config.max_repositories = 20;
        assert_eq!(plan(&config, &catalog).unwrap().repositories.len(), 11);
    }

    #[test]
    fn test_selected_subset() {
        let catalog = catalog_with(3);
        let mut config = MockConfig::new(Environment::Prod);
        config.repositories = vec!["workshop-3".to_string()];

        let plan = plan(&config, &catalog).unwrap();
        assert_eq!(plan.repositories.len(), 1);
        assert_eq!(plan.repositories[0].workshop_id, "0003");
    }

    #[test]
    fn test_topic_slug() {
        assert_eq!(topic_slug("Storage Accounts").as_deref(), Some("storage-accounts"));
        assert_eq!(topic_slug("--AKS--").as_deref(), Some("aks"));
        assert_eq!(topic_slug("!!!"), None);
        assert_eq!(topic_slug(&"x".repeat(60)).map(|s| s.len()), Some(50));
    }
}
