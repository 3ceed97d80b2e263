use crate::domain::model::{NewRepository, ProvisionPlan, RepositoryPlan};
use crate::domain::ports::{FileWrite, GitHubApi};
use crate::utils::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryOutcome {
    pub name: String,
    pub created: bool,
    pub files: Vec<FileOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub repositories: Vec<RepositoryOutcome>,
}

impl ApplySummary {
    pub fn created_repositories(&self) -> usize {
        self.repositories.iter().filter(|r| r.created).count()
    }

    pub fn count_files(&self, action: &str) -> usize {
        self.repositories
            .iter()
            .flat_map(|r| r.files.iter())
            .filter(|f| f.action == action)
            .count()
    }
}

fn action_name(write: FileWrite) -> &'static str {
    match write {
        FileWrite::Created => "created",
        FileWrite::Updated => "updated",
        FileWrite::Unchanged => "unchanged",
    }
}

/// Applies a plan in one synchronous pass; the first API failure stops the run.
pub struct Provisioner<G: GitHubApi> {
    github: G,
    branch: String,
}

impl<G: GitHubApi> Provisioner<G> {
    pub fn new(github: G, branch: impl Into<String>) -> Self {
        Self {
            github,
            branch: branch.into(),
        }
    }

    pub async fn apply(&self, plan: &ProvisionPlan) -> Result<ApplySummary> {
        tracing::info!(
            "🚀 Applying plan: {} repositories, {} files ({} environment)",
            plan.repositories.len(),
            plan.file_count(),
            plan.environment
        );

        let mut summary = ApplySummary::default();
        for repo in &plan.repositories {
            let outcome = self
                .apply_repository(&plan.owner, repo, &plan.commit_message)
                .await?;
            summary.repositories.push(outcome);
        }

        tracing::info!(
            "✅ Apply finished: {} repositories created, {} files created, {} updated, {} unchanged",
            summary.created_repositories(),
            summary.count_files("created"),
            summary.count_files("updated"),
            summary.count_files("unchanged")
        );
        Ok(summary)
    }

    async fn apply_repository(
        &self,
        owner: &str,
        repo: &RepositoryPlan,
        commit_message: &str,
    ) -> Result<RepositoryOutcome> {
        let created = match self.github.get_repository(owner, &repo.name).await? {
            Some(existing) => {
                tracing::info!("📦 {}/{} already exists", owner, existing.name);
                false
            }
            None => {
                let request = NewRepository {
                    name: repo.name.clone(),
                    description: repo.description.clone(),
                    private: repo.visibility.is_private(),
                    visibility: Some(repo.visibility.as_str().to_string()),
                    homepage: repo.homepage.clone(),
                    auto_init: false,
                    has_issues: true,
                };
                let created = self.github.create_repository(owner, &request).await?;
                tracing::info!(
                    "📦 Created {} ({})",
                    created.full_name.as_deref().unwrap_or(&created.name),
                    repo.visibility.as_str()
                );
                true
            }
        };

        if !repo.topics.is_empty() {
            self.github
                .replace_topics(owner, &repo.name, &repo.topics)
                .await?;
        }

        let mut files = Vec::with_capacity(repo.files.len());
        for file in &repo.files {
            let write = self
                .github
                .write_file(owner, &repo.name, file, &self.branch, commit_message)
                .await?;
            tracing::debug!("📝 {}/{}: {}", repo.name, file.path, action_name(write));
            files.push(FileOutcome {
                path: file.path.clone(),
                action: action_name(write),
            });
        }

        Ok(RepositoryOutcome {
            name: repo.name.clone(),
            created,
            files,
        })
    }
}
