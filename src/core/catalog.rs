use crate::domain::model::{CatalogEntry, GistIdMap, WorkshopKey};
use crate::utils::error::{ForgeError, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Workshop catalog keyed by catalog id (e.g. `"0001"`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// 從 JSON 檔案載入目錄
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ForgeError::IoError)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let entries: BTreeMap<String, CatalogEntry> = serde_json::from_str(content)
            .map_err(|e| ForgeError::catalog(format!("catalog JSON parsing error: {}", e)))?;

        let catalog = Self { entries };
        catalog.check_entries()?;
        Ok(catalog)
    }

    pub fn from_entries(entries: BTreeMap<String, CatalogEntry>) -> Result<Self> {
        let catalog = Self { entries };
        catalog.check_entries()?;
        Ok(catalog)
    }

    fn check_entries(&self) -> Result<()> {
        let mut names = HashSet::new();

        for (id, entry) in &self.entries {
            if id.trim().is_empty() {
                return Err(ForgeError::catalog("catalog ids cannot be empty"));
            }
            if entry.name.trim().is_empty() {
                return Err(ForgeError::catalog(format!("entry '{}' has no name", id)));
            }
            if entry.categories.is_empty() {
                return Err(ForgeError::catalog(format!("entry '{}' has no category", id)));
            }
            if let Some(bad) = entry
                .categories
                .iter()
                .find(|c| c.trim().is_empty() || c.chars().any(char::is_whitespace))
            {
                return Err(ForgeError::catalog(format!(
                    "entry '{}' has an invalid category '{}'",
                    id, bad
                )));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(ForgeError::catalog(format!(
                    "repository name '{}' is used by more than one entry",
                    entry.name
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    /// Looks an entry up by repository name first, then by catalog id.
    pub fn find(&self, name_or_id: &str) -> Option<(&str, &CatalogEntry)> {
        self.iter()
            .find(|(_, entry)| entry.name == name_or_id)
            .or_else(|| self.entries.get_key_value(name_or_id).map(|(id, e)| (id.as_str(), e)))
    }

    /// Resolves the requested repositories. An empty request selects the whole catalog.
    pub fn select(&self, requested: &[String]) -> Result<Vec<(&str, &CatalogEntry)>> {
        if requested.is_empty() {
            return Ok(self.iter().collect());
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(requested.len());

        for name in requested {
            let (id, entry) = self.find(name).ok_or_else(|| {
                ForgeError::catalog(format!("repository '{}' is not in the catalog", name))
            })?;
            if seen.insert(id) {
                selected.push((id, entry));
            }
        }

        Ok(selected)
    }

    /// 展開 (id, category, infra) 三元組，key 重複即報錯
    pub fn flatten(&self) -> Result<BTreeMap<String, WorkshopKey>> {
        let mut flattened = BTreeMap::new();

        for (id, entry) in self.iter() {
            for workshop in flatten_entry(id, entry) {
                let key = workshop.key();
                if flattened.contains_key(&key) {
                    return Err(ForgeError::DuplicateKeyError { key });
                }
                flattened.insert(key, workshop);
            }
        }

        tracing::debug!(
            "Flattened {} catalog entries into {} workshop keys",
            self.len(),
            flattened.len()
        );
        Ok(flattened)
    }
}

/// Cross product of one entry's categories and infra types.
pub fn flatten_entry(id: &str, entry: &CatalogEntry) -> Vec<WorkshopKey> {
    entry
        .categories
        .iter()
        .flat_map(|category| {
            entry.iac.iter().map(move |infra| WorkshopKey {
                workshop_id: id.to_string(),
                name: entry.name.clone(),
                category: category.clone(),
                infra: *infra,
            })
        })
        .collect()
}

/// Loads the gist-id lookup table (`filename -> {id, raw_url}`).
pub fn load_gist_ids<P: AsRef<Path>>(path: P) -> Result<GistIdMap> {
    let content = std::fs::read_to_string(&path).map_err(ForgeError::IoError)?;
    let map: GistIdMap = serde_json::from_str(&content)?;
    Ok(map)
}
