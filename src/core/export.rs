use crate::core::gists::gist_id_map;
use crate::domain::model::{GistEntry, GistIdMap, GistOperation, InfraType, RemoteGist};
use crate::domain::ports::{GitHubApi, Storage};
use crate::utils::error::Result;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const PER_PAGE: u32 = 100;
pub const ARCHIVE_INDEX: &str = "all-gists.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    pub include_public: bool,
}

/// Pulls every gist of the authenticated user into the work-list format.
pub struct GistExporter<G: GitHubApi> {
    github: G,
    options: ExportOptions,
}

impl<G: GitHubApi> GistExporter<G> {
    pub fn new(github: G, options: ExportOptions) -> Self {
        Self { github, options }
    }

    /// 逐頁讀取直到空頁
    pub async fn export(&self) -> Result<Vec<GistEntry>> {
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let gists = self.github.list_gists(page, PER_PAGE).await?;
            if gists.is_empty() {
                break;
            }
            tracing::debug!("📥 Page {}: {} gists", page, gists.len());

            for gist in gists.iter().filter(|g| self.options.include_public || !g.public) {
                entries.extend(self.entries_for(gist).await?);
            }
            page += 1;
        }

        tracing::info!("📥 Exported {} gist files", entries.len());
        Ok(entries)
    }

    async fn entries_for(&self, gist: &RemoteGist) -> Result<Vec<GistEntry>> {
        let mut entries = Vec::with_capacity(gist.files.len());

        for (name, file) in &gist.files {
            let raw = match (&file.content, file.truncated, &file.raw_url) {
                (Some(content), false, _) => content.clone(),
                (_, _, Some(raw_url)) => self.github.fetch_raw(raw_url).await?,
                (Some(content), true, None) => content.clone(),
                (None, _, None) => String::new(),
            };

            entries.push(GistEntry {
                id: Some(gist.id.clone()),
                filename: file.filename.clone().unwrap_or_else(|| name.clone()),
                description: gist.description.clone(),
                content: parse_content(&raw),
                file_type: file.file_type.clone(),
                operation: Some(GistOperation::Fetched),
                raw_url: file.raw_url.clone(),
                history: gist.history.clone(),
            });
        }

        Ok(entries)
    }
}

/// JSON when it parses, the raw text otherwise.
pub fn parse_content(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// `{id}-{category}-{infra}` 形式的檔名才是徽章 gist
///
/// Ids and categories may themselves contain `-`, so only the trailing
/// infra segment is anchored; the rest needs a non-empty id and category.
pub fn is_badge_filename(filename: &str) -> bool {
    let Some(stem) = filename.strip_suffix(".json") else {
        return false;
    };
    let Some((prefix, infra)) = stem.rsplit_once('-') else {
        return false;
    };

    infra.parse::<InfraType>().is_ok()
        && prefix
            .split_once('-')
            .is_some_and(|(id, category)| !id.is_empty() && !category.is_empty())
}

pub fn export_ids(entries: &[GistEntry]) -> GistIdMap {
    gist_id_map(entries, None)
        .into_iter()
        .filter(|(filename, _)| is_badge_filename(filename))
        .collect()
}

/// `all-gists.json` plus one `<gist-id>/<filename>` entry per file.
pub fn build_archive(entries: &[GistEntry]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    zip.start_file::<_, ()>(ARCHIVE_INDEX, FileOptions::default())?;
    zip.write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;

    for entry in entries {
        let folder = entry.gist_id().unwrap_or("unknown");
        zip.start_file::<_, ()>(format!("{}/{}", folder, entry.filename), FileOptions::default())?;
        zip.write_all(entry.file_content()?.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Where an export goes; every path is relative to the storage root.
#[derive(Debug, Clone, Default)]
pub struct ExportTargets {
    pub output: String,
    pub ids_output: Option<String>,
    pub archive: Option<String>,
}

pub async fn write_export<S: Storage>(
    storage: &S,
    targets: &ExportTargets,
    entries: &[GistEntry],
) -> Result<()> {
    storage
        .write_file(&targets.output, serde_json::to_string_pretty(entries)?.as_bytes())
        .await?;
    tracing::info!("📁 Gist export saved to: {}", targets.output);

    if let Some(path) = &targets.ids_output {
        let ids = export_ids(entries);
        storage
            .write_file(path, serde_json::to_string_pretty(&ids)?.as_bytes())
            .await?;
        tracing::info!("📁 {} gist ids saved to: {}", ids.len(), path);
    }

    if let Some(path) = &targets.archive {
        let archive = build_archive(entries)?;
        tracing::debug!("Writing ZIP file ({} bytes) to storage", archive.len());
        storage.write_file(path, &archive).await?;
        tracing::info!("📦 Archive saved to: {}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use std::io::Read;

    fn fetched(id: &str, filename: &str, content: serde_json::Value) -> GistEntry {
        GistEntry {
            id: Some(id.to_string()),
            filename: filename.to_string(),
            description: Some(format!("Gist for {}", filename)),
            content,
            file_type: Some("application/json".to_string()),
            operation: Some(GistOperation::Fetched),
            raw_url: Some(format!("https://gist.githubusercontent.com/octo/{}/raw/{}", id, filename)),
            history: Vec::new(),
        }
    }

    #[test]
    fn test_parse_content_falls_back_to_string() {
        assert_eq!(parse_content(r#"{"a": 1}"#)["a"], 1);
        assert_eq!(
            parse_content("terraform { }"),
            serde_json::Value::String("terraform { }".to_string())
        );
    }

    #[test]
    fn test_badge_filename_filter() {
        assert!(is_badge_filename("0001-storage-terraform.json"));
        assert!(is_badge_filename("0002-network-bicep.json"));
        assert!(!is_badge_filename("0001-storage-pulumi.json"));
        assert!(!is_badge_filename("notes.json"));
        assert!(is_badge_filename("0001-storage-accounts-bicep.json"));
        assert!(is_badge_filename("ws-0001-storage-terraform.json"));
        assert!(!is_badge_filename("0001--bicep.json"));
        assert!(!is_badge_filename("storage-bicep.json"));
        assert!(!is_badge_filename("0001-storage-bicep.md"));
    }

    #[test]
    fn test_export_ids_keeps_prepared_hyphenated_categories() {
        let catalog = crate::core::catalog::Catalog::from_json_str(
            r#"{"0001": {"name": "storage", "category": "storage-accounts", "iac": ["bicep"]}}"#,
        )
        .unwrap();

        let mut entries = crate::core::gists::prepare_gists(&catalog, &[]).unwrap();
        assert_eq!(entries[0].filename, "0001-storage-accounts-bicep.json");
        entries[0].id = Some("g1".to_string());
        entries[0].raw_url = Some("https://gist.githubusercontent.com/octo/g1/raw/x.json".to_string());

        let ids = export_ids(&entries);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["0001-storage-accounts-bicep.json"].id, "g1");
    }

    #[test]
    fn test_export_ids_keeps_only_badges() {
        let entries = vec![
            fetched("g1", "0001-storage-terraform.json", serde_json::json!({})),
            fetched("g2", "scratch.md", serde_json::json!("hello")),
        ];

        let ids = export_ids(&entries);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["0001-storage-terraform.json"].id, "g1");
    }

    #[test]
    fn test_archive_layout() {
        let entries = vec![
            fetched("g1", "0001-storage-terraform.json", serde_json::json!({"message": "done"})),
            fetched("g2", "scratch.md", serde_json::json!("hello")),
        ];

        let bytes = build_archive(&entries).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["all-gists.json", "g1/0001-storage-terraform.json", "g2/scratch.md"]
        );

        let mut markdown = String::new();
        archive
            .by_name("g2/scratch.md")
            .unwrap()
            .read_to_string(&mut markdown)
            .unwrap();
        assert_eq!(markdown, "hello");
    }

    #[tokio::test]
    async fn test_write_export_empty_list_still_writes_array() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
        let targets = ExportTargets {
            output: "gists.json".to_string(),
            ids_output: Some("gist-id.json".to_string()),
            archive: None,
        };

        write_export(&storage, &targets, &[]).await.unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("gists.json")).unwrap();
        assert_eq!(written.trim(), "[]");
        let ids = std::fs::read_to_string(temp_dir.path().join("gist-id.json")).unwrap();
        assert_eq!(ids.trim(), "{}");
    }
}
