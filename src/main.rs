use anyhow::Context;
use clap::Parser;
use std::path::Path;
use workshop_forge::config::cli::{Cli, Command, LogFormat};
use workshop_forge::config::{default_github_client, resolve_token, ForgeConfig};
use workshop_forge::core::catalog::load_gist_ids;
use workshop_forge::core::export::{write_export, ExportOptions, ExportTargets};
use workshop_forge::core::gists::{gist_id_map, prepare_gists, SyncOptions};
use workshop_forge::core::report::{csv_report, failed_count, markdown_report};
use workshop_forge::domain::model::{GistEntry, GistIdMap, ProvisionPlan};
use workshop_forge::domain::ports::{ConfigProvider, Storage};
use workshop_forge::utils::error::ErrorSeverity;
use workshop_forge::utils::{logger, validation, validation::Validate};
use workshop_forge::{
    Catalog, ForgeError, GistExporter, GistSynchronizer, GitHubClient, LocalStorage, Planner,
    Provisioner, Result, TemplateSet,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting workshop-forge");
    if cli.verbose {
        tracing::debug!("CLI args: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let config = load_config(&cli)
        .with_context(|| format!("loading configuration from '{}'", cli.config.display()))?;

    match run(&cli, config.as_ref()).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

/// Gist commands fall back to defaults when no configuration file exists.
fn load_config(cli: &Cli) -> Result<Option<ForgeConfig>> {
    if !cli.command.needs_catalog() && !cli.config.exists() {
        tracing::debug!("No configuration at {}, using defaults", cli.config.display());
        return Ok(None);
    }

    tracing::info!("📁 Loading configuration from: {}", cli.config.display());
    let config = ForgeConfig::from_file(&cli.config)?;
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");
    Ok(Some(config))
}

fn require_config(config: Option<&ForgeConfig>) -> Result<&ForgeConfig> {
    config.ok_or_else(|| ForgeError::MissingConfigError {
        field: "config".to_string(),
    })
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Token is mandatory for every command that talks to the API.
fn authenticated_client(config: Option<&ForgeConfig>, token: Option<&str>) -> Result<GitHubClient> {
    let token = match config {
        Some(config) => config.token(token)?,
        None => resolve_token(token)?,
    };
    validation::require_token(&token)?;

    match config {
        Some(config) => config.github_client(token),
        None => default_github_client(token),
    }
}

async fn read_entries(storage: &LocalStorage, path: &Path) -> Result<Vec<GistEntry>> {
    let data = storage.read_file(&path_str(path)).await?;
    Ok(serde_json::from_slice(&data)?)
}

async fn write_json<T: serde::Serialize>(storage: &LocalStorage, path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    storage.write_file(&path_str(path), json.as_bytes()).await
}

fn build_plan(config: &ForgeConfig) -> Result<ProvisionPlan> {
    let catalog = Catalog::from_file(config.catalog_path())?;
    let gist_ids = match config.gist_ids_path() {
        Some(path) => load_gist_ids(path)?,
        None => GistIdMap::new(),
    };
    let templates = match config.template_dir() {
        Some(dir) => TemplateSet::builtin().with_overrides(dir)?,
        None => TemplateSet::builtin(),
    };

    Planner::new(config, &catalog, &gist_ids, &templates).build()
}

fn display_plan_summary(plan: &ProvisionPlan) {
    println!("📋 Plan Summary:");
    println!("  Environment: {}", plan.environment);
    println!("  Owner: {}", plan.owner);
    println!("  Repositories: {}", plan.repositories.len());
    for repo in &plan.repositories {
        println!(
            "    - {} ({}, {} files, topics: {})",
            repo.name,
            repo.visibility.as_str(),
            repo.files.len(),
            repo.topics.join(", ")
        );
    }
    println!();
}

async fn run(cli: &Cli, config: Option<&ForgeConfig>) -> Result<i32> {
    let cwd = LocalStorage::new(".");

    match &cli.command {
        Command::Flatten => {
            let config = require_config(config)?;
            let catalog = Catalog::from_file(config.catalog_path())?;
            let flattened = catalog.flatten()?;
            println!("{}", serde_json::to_string_pretty(&flattened)?);
        }

        Command::Plan { out } => {
            let plan = build_plan(require_config(config)?)?;
            let storage = LocalStorage::new(out);
            for repo in &plan.repositories {
                for file in &repo.files {
                    storage
                        .write_file(&format!("{}/{}", repo.name, file.path), file.content.as_bytes())
                        .await?;
                }
            }
            display_plan_summary(&plan);
            println!("📁 {} files written under {}", plan.file_count(), out.display());
        }

        Command::Apply { dry_run } => {
            let config = require_config(config)?;
            let plan = build_plan(config)?;
            display_plan_summary(&plan);

            if *dry_run {
                tracing::info!("🔍 DRY RUN MODE - No API calls will be made");
                return Ok(0);
            }

            let github = authenticated_client(Some(config), None)?;
            let summary = Provisioner::new(github, config.default_branch()).apply(&plan).await?;
            println!(
                "✅ {} repositories processed ({} created)",
                summary.repositories.len(),
                summary.created_repositories()
            );
        }

        Command::PrepareGists { output, existing } => {
            let config = require_config(config)?;
            let catalog = Catalog::from_file(config.catalog_path())?;
            let existing = match existing {
                Some(path) => read_entries(&cwd, path).await?,
                None => Vec::new(),
            };

            let entries = prepare_gists(&catalog, &existing)?;
            write_json(&cwd, output, &entries).await?;
            println!("📁 {} gist entries saved to: {}", entries.len(), output.display());
        }

        Command::SyncGists {
            input,
            output,
            token,
            dry_run,
            report_csv,
            gist_ids,
            username,
        } => {
            let items = read_entries(&cwd, input).await?;
            let github = if *dry_run {
                match config {
                    Some(config) => config.github_client(None)?,
                    None => default_github_client(None)?,
                }
            } else {
                authenticated_client(config, token.as_deref())?
            };

            let outcome = GistSynchronizer::new(github, SyncOptions { dry_run: *dry_run })
                .sync(items)
                .await?;

            println!("{}", markdown_report(&outcome));

            if *dry_run {
                tracing::info!("🔍 DRY RUN MODE - Nothing written");
            } else {
                let output = output.as_ref().unwrap_or(input);
                write_json(&cwd, output, &outcome.entries).await?;
                tracing::info!("📁 Updated gist list saved to: {}", output.display());

                if let Some(path) = report_csv {
                    cwd.write_file(&path_str(path), csv_report(&outcome.records)?.as_bytes())
                        .await?;
                }
                if let Some(path) = gist_ids {
                    let username = username
                        .as_deref()
                        .or_else(|| config.and_then(|c| c.github.gist_username.as_deref()));
                    write_json(&cwd, path, &gist_id_map(&outcome.entries, username)).await?;
                }
            }

            let failed = failed_count(&outcome);
            if failed > 0 {
                tracing::error!("❌ {} gist operations failed", failed);
                return Ok(1);
            }
        }

        Command::ExportGists {
            output,
            ids_output,
            include_public,
            archive,
            token,
        } => {
            let github = authenticated_client(config, token.as_deref())?;
            let exporter = GistExporter::new(
                github,
                ExportOptions {
                    include_public: *include_public,
                },
            );
            let entries = exporter.export().await?;

            let targets = ExportTargets {
                output: path_str(output),
                ids_output: ids_output.as_deref().map(path_str),
                archive: archive.as_deref().map(path_str),
            };
            write_export(&cwd, &targets, &entries).await?;
            println!("✅ {} gist files exported to {}", entries.len(), output.display());
        }
    }

    Ok(0)
}
