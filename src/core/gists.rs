use crate::core::catalog::Catalog;
use crate::domain::model::{
    BadgeContent, GistEntry, GistFilePayload, GistIdMap, GistOperation, GistPayload, GistRef,
    RemoteGist,
};
use crate::domain::ports::GitHubApi;
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 由目錄建立 gist 工作清單，每個展開後的 key 一筆
pub fn prepare_gists(catalog: &Catalog, existing: &[GistEntry]) -> Result<Vec<GistEntry>> {
    let known: HashMap<&str, &GistEntry> = existing
        .iter()
        .filter(|e| e.gist_id().is_some())
        .map(|e| (e.filename.as_str(), e))
        .collect();

    let flattened = catalog.flatten()?;
    let mut entries = Vec::with_capacity(flattened.len());

    for workshop in flattened.values() {
        let filename = workshop.gist_filename();

        if let Some(found) = known.get(filename.as_str()) {
            let mut carried = (*found).clone();
            carried.operation = Some(GistOperation::Fetched);
            entries.push(carried);
            continue;
        }

        let status = catalog
            .get(&workshop.workshop_id)
            .and_then(|e| e.status.as_deref());
        entries.push(GistEntry {
            id: None,
            description: Some(format!("Gist for {}", filename)),
            content: serde_json::to_value(BadgeContent::for_status(status))?,
            file_type: None,
            operation: Some(GistOperation::Create),
            raw_url: None,
            history: Vec::new(),
            filename,
        });
    }

    tracing::info!(
        "🧾 Prepared {} gist entries ({} already exist)",
        entries.len(),
        entries
            .iter()
            .filter(|e| e.operation == Some(GistOperation::Fetched))
            .count()
    );
    Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GistBuckets {
    pub to_create: Vec<GistEntry>,
    pub to_update: Vec<GistEntry>,
    pub to_delete: Vec<GistEntry>,
    pub to_skip: Vec<GistEntry>,
}

/// delete/update need an id, create needs none; anything else is skipped.
pub fn segregate(items: Vec<GistEntry>) -> GistBuckets {
    let mut buckets = GistBuckets::default();

    for item in items {
        let has_id = item.gist_id().is_some();
        match (&item.operation, has_id) {
            (Some(GistOperation::Delete), true) => buckets.to_delete.push(item),
            (Some(GistOperation::Update), true) => buckets.to_update.push(item),
            (Some(GistOperation::Create) | None, false) => buckets.to_create.push(item),
            _ => buckets.to_skip.push(item),
        }
    }

    buckets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GistStatus {
    Created,
    Updated,
    Deleted,
    Skipped,
    Failed,
}

impl GistStatus {
    pub const ALL: [GistStatus; 5] = [
        GistStatus::Created,
        GistStatus::Updated,
        GistStatus::Deleted,
        GistStatus::Skipped,
        GistStatus::Failed,
    ];
}

impl fmt::Display for GistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GistStatus::Created => "Created",
            GistStatus::Updated => "Updated",
            GistStatus::Deleted => "Deleted",
            GistStatus::Skipped => "Skipped",
            GistStatus::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// One row of the operation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GistRecord {
    pub id: String,
    pub filename: String,
    pub status: GistStatus,
    pub description: String,
}

impl GistRecord {
    fn from_entry(entry: &GistEntry, status: GistStatus) -> Self {
        Self {
            id: entry.gist_id().unwrap_or("-").to_string(),
            filename: entry.filename.clone(),
            status,
            description: entry.description.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Entries to write back; deleted gists are gone, failed ones kept as they were.
    pub entries: Vec<GistEntry>,
    pub records: Vec<GistRecord>,
}

impl SyncOutcome {
    pub fn count(&self, status: GistStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn summary(&self) -> BTreeMap<GistStatus, usize> {
        GistStatus::ALL.iter().map(|s| (*s, self.count(*s))).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.count(GistStatus::Failed) > 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
}

fn file_payload(entry: &GistEntry) -> Result<BTreeMap<String, GistFilePayload>> {
    let mut files = BTreeMap::new();
    files.insert(
        entry.filename.clone(),
        GistFilePayload {
            content: entry.file_content()?,
        },
    );
    Ok(files)
}

/// 以 API 回應更新 id、raw_url，並標記為 fetched
fn absorb_remote(mut entry: GistEntry, remote: &RemoteGist) -> GistEntry {
    entry.id = Some(remote.id.clone());
    if let Some(file) = remote.files.get(&entry.filename) {
        entry.raw_url = file.raw_url.clone().or(entry.raw_url);
        entry.file_type = file.file_type.clone().or(entry.file_type);
    }
    if entry.description.is_none() {
        entry.description = remote.description.clone();
    }
    if !remote.history.is_empty() {
        entry.history = remote.history.clone();
    }
    entry.operation = Some(GistOperation::Fetched);
    entry
}

/// Creates, updates and deletes gists from a work list.
pub struct GistSynchronizer<G: GitHubApi> {
    github: G,
    options: SyncOptions,
}

impl<G: GitHubApi> GistSynchronizer<G> {
    pub fn new(github: G, options: SyncOptions) -> Self {
        Self { github, options }
    }

    pub async fn sync(&self, items: Vec<GistEntry>) -> Result<SyncOutcome> {
        let buckets = segregate(items);
        tracing::info!(
            "🔀 Gists to create: {}, update: {}, delete: {}, skip: {}",
            buckets.to_create.len(),
            buckets.to_update.len(),
            buckets.to_delete.len(),
            buckets.to_skip.len()
        );

        let mut outcome = SyncOutcome::default();
        self.create_all(buckets.to_create, &mut outcome).await?;
        self.update_all(buckets.to_update, &mut outcome).await?;
        self.delete_all(buckets.to_delete, &mut outcome).await;

        for item in buckets.to_skip {
            outcome.records.push(GistRecord::from_entry(&item, GistStatus::Skipped));
            outcome.entries.push(item);
        }

        Ok(outcome)
    }

    async fn create_all(&self, items: Vec<GistEntry>, outcome: &mut SyncOutcome) -> Result<()> {
        for (idx, item) in items.into_iter().enumerate() {
            let payload = GistPayload {
                description: Some(item.default_description()),
                public: Some(false),
                files: file_payload(&item)?,
            };

            if self.options.dry_run {
                tracing::info!(
                    "[DRY RUN] Would create gist: {}",
                    serde_json::to_string_pretty(&payload)?
                );
                outcome.records.push(GistRecord::from_entry(&item, GistStatus::Created));
                outcome.entries.push(item);
                continue;
            }

            match self.github.create_gist(&payload).await {
                Ok(remote) => {
                    tracing::debug!(
                        "✅ [{}] Created gist: {}",
                        idx + 1,
                        remote.html_url.as_deref().unwrap_or(&remote.id)
                    );
                    let created = absorb_remote(item, &remote);
                    outcome.records.push(GistRecord::from_entry(&created, GistStatus::Created));
                    outcome.entries.push(created);
                }
                Err(e) => {
                    tracing::error!("❌ [{}] Failed to create gist {}: {}", idx + 1, item.filename, e);
                    outcome.records.push(GistRecord::from_entry(&item, GistStatus::Failed));
                    outcome.entries.push(item);
                }
            }
        }
        Ok(())
    }

    async fn update_all(&self, items: Vec<GistEntry>, outcome: &mut SyncOutcome) -> Result<()> {
        for (idx, item) in items.into_iter().enumerate() {
            let Some(id) = item.gist_id().map(str::to_string) else {
                outcome.records.push(GistRecord::from_entry(&item, GistStatus::Skipped));
                outcome.entries.push(item);
                continue;
            };

            let payload = GistPayload {
                description: Some(
                    item.description
                        .clone()
                        .unwrap_or_else(|| item.default_description()),
                ),
                public: None,
                files: file_payload(&item)?,
            };

            if self.options.dry_run {
                tracing::info!(
                    "[DRY RUN] Would update gist {}: {}",
                    id,
                    serde_json::to_string_pretty(&payload)?
                );
                outcome.records.push(GistRecord::from_entry(&item, GistStatus::Updated));
                outcome.entries.push(item);
                continue;
            }

            match self.github.update_gist(&id, &payload).await {
                Ok(remote) => {
                    tracing::debug!("✅ [{}] Updated gist: {}", idx + 1, id);
                    let updated = absorb_remote(item, &remote);
                    outcome.records.push(GistRecord::from_entry(&updated, GistStatus::Updated));
                    outcome.entries.push(updated);
                }
                Err(e) => {
                    tracing::error!("❌ [{}] Failed to update gist {}: {}", idx + 1, id, e);
                    outcome.records.push(GistRecord::from_entry(&item, GistStatus::Failed));
                    outcome.entries.push(item);
                }
            }
        }
        Ok(())
    }

    async fn delete_all(&self, items: Vec<GistEntry>, outcome: &mut SyncOutcome) {
        for (idx, item) in items.into_iter().enumerate() {
            let id = item.gist_id().unwrap_or_default().to_string();

            if self.options.dry_run {
                tracing::info!("[DRY RUN] Would delete gist {}", id);
                outcome.records.push(GistRecord::from_entry(&item, GistStatus::Deleted));
                outcome.entries.push(item);
                continue;
            }

            match self.github.delete_gist(&id).await {
                Ok(()) => {
                    tracing::debug!("✅ [{}] Deleted gist: {}", idx + 1, id);
                    outcome.records.push(GistRecord::from_entry(&item, GistStatus::Deleted));
                }
                Err(e) => {
                    tracing::error!("❌ [{}] Failed to delete gist {}: {}", idx + 1, id, e);
                    outcome.records.push(GistRecord::from_entry(&item, GistStatus::Failed));
                    outcome.entries.push(item);
                }
            }
        }
    }
}

/// Builds `filename -> {id, raw_url}`. With a username the URL is rebuilt on
/// gist.githubusercontent.com, pinned to the newest revision when one is known.
pub fn gist_id_map(entries: &[GistEntry], username: Option<&str>) -> GistIdMap {
    let mut map = GistIdMap::new();

    for entry in entries {
        let Some(id) = entry.gist_id() else {
            continue;
        };
        if entry.filename.trim().is_empty() {
            continue;
        }

        let raw_url = match username {
            Some(user) => match entry.history.first() {
                Some(revision) => format!(
                    "https://gist.githubusercontent.com/{}/{}/raw/{}/{}",
                    user, id, revision.version, entry.filename
                ),
                None => format!(
                    "https://gist.githubusercontent.com/{}/{}/raw/{}",
                    user, id, entry.filename
                ),
            },
            None => match &entry.raw_url {
                Some(url) => url.clone(),
                None => continue,
            },
        };

        map.insert(
            entry.filename.clone(),
            GistRef {
                id: id.to_string(),
                raw_url,
            },
        );
    }

    map
}
