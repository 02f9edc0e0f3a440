//! Reference data store - per-tenant mapping parameters on disk
//!
//! One `{dir}/{tenant}.json` file per tenant. A context arriving without
//! mapping parameters is filled from its tenant's entry before dispatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ReferenceDataError, ReferenceDataResult};
use crate::models::{MappingParameters, ProcessingContext};

/// Directory where reference data is stored (relative to current dir)
pub const DEFAULT_REFERENCE_DATA_DIR: &str = ".dataimport/reference";

/// A tenant's reference data with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReferenceData {
    pub tenant: String,
    pub imported_at: String,
    pub parameters: Arc<MappingParameters>,
}

impl StoredReferenceData {
    pub fn row_count(&self) -> usize {
        self.parameters.row_count()
    }
}

pub struct ReferenceDataStore {
    dir: PathBuf,
    entries: BTreeMap<String, StoredReferenceData>,
}

impl ReferenceDataStore {
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REFERENCE_DATA_DIR)
    }

    /// Open a store, loading every readable entry. Unreadable files are
    /// skipped with a warning.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut store = Self {
            dir: dir.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
        };
        store.load_all();
        store
    }

    fn load_all(&mut self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(ReferenceDataError::from)
                .and_then(|c| serde_json::from_str::<StoredReferenceData>(&c).map_err(ReferenceDataError::from))
            {
                Ok(stored) => {
                    self.entries.insert(stored.tenant.clone(), stored);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping reference data file"),
            }
        }
        debug!(dir = %self.dir.display(), tenants = self.entries.len(), "Reference data loaded");
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn list(&self) -> Vec<&StoredReferenceData> {
        self.entries.values().collect()
    }

    pub fn get(&self, tenant: &str) -> Option<&StoredReferenceData> {
        self.entries.get(tenant)
    }

    pub fn parameters(&self, tenant: &str) -> ReferenceDataResult<Arc<MappingParameters>> {
        self.get(tenant)
            .map(|s| Arc::clone(&s.parameters))
            .ok_or_else(|| ReferenceDataError::NotFound(tenant.to_string()))
    }

    /// Store (or replace) a tenant's reference data.
    pub fn save(&mut self, tenant: &str, parameters: MappingParameters) -> ReferenceDataResult<()> {
        fs::create_dir_all(&self.dir)?;

        let stored = StoredReferenceData {
            tenant: tenant.to_string(),
            imported_at: chrono::Utc::now().to_rfc3339(),
            parameters: Arc::new(parameters),
        };
        fs::write(self.path(tenant), serde_json::to_string_pretty(&stored)?)?;

        self.entries.insert(tenant.to_string(), stored);
        Ok(())
    }

    /// Import a `MappingParameters` JSON file. The tenant defaults to the
    /// file stem.
    pub fn import(&mut self, path: &Path, tenant: Option<&str>) -> ReferenceDataResult<String> {
        let content = fs::read_to_string(path)?;
        let parameters: MappingParameters = serde_json::from_str(&content)?;

        let tenant = tenant
            .map(str::to_string)
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .unwrap_or_else(|| "default".to_string());

        self.save(&tenant, parameters)?;
        Ok(tenant)
    }

    pub fn delete(&mut self, tenant: &str) -> ReferenceDataResult<()> {
        if self.entries.remove(tenant).is_none() {
            return Err(ReferenceDataError::NotFound(tenant.to_string()));
        }
        fs::remove_file(self.path(tenant))?;
        Ok(())
    }

    /// Fill the context's mapping parameters from its tenant when it has
    /// none. Returns whether anything was applied.
    pub fn apply(&self, ctx: &mut ProcessingContext) -> bool {
        if !ctx.mapping_parameters.is_empty() {
            return false;
        }
        let Some(stored) = ctx.connection.tenant.as_deref().and_then(|t| self.get(t)) else {
            return false;
        };
        ctx.mapping_parameters = Arc::clone(&stored.parameters);
        true
    }

    fn path(&self, tenant: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(tenant)))
    }
}

impl Default for ReferenceDataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// File-safe form of a tenant id.
fn file_stem(tenant: &str) -> String {
    tenant
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reference::LoanType;
    use tempfile::tempdir;

    fn parameters() -> MappingParameters {
        let mut params = MappingParameters::default();
        params.loan_types.push(LoanType::new("lt-1", "Can circulate"));
        params
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let mut store = ReferenceDataStore::with_dir(dir.path());
        store.save("diku", parameters()).unwrap();

        let reopened = ReferenceDataStore::with_dir(dir.path());
        assert_eq!(reopened.list().len(), 1);
        assert_eq!(reopened.get("diku").unwrap().row_count(), 1);
        assert!(matches!(
            reopened.parameters("other"),
            Err(ReferenceDataError::NotFound(_))
        ));
    }

    #[test]
    fn test_import_uses_file_stem() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("college.json");
        fs::write(&source, serde_json::to_string(&parameters()).unwrap()).unwrap();

        let mut store = ReferenceDataStore::with_dir(dir.path().join("store"));
        assert_eq!(store.import(&source, None).unwrap(), "college");
        assert_eq!(store.import(&source, Some("diku")).unwrap(), "diku");
        assert_eq!(store.list().len(), 2);

        store.delete("college").unwrap();
        assert!(store.get("college").is_none());
        assert!(store.delete("college").is_err());
    }

    #[test]
    fn test_apply_only_fills_empty_parameters() {
        let dir = tempdir().unwrap();
        let mut store = ReferenceDataStore::with_dir(dir.path());
        store.save("diku", parameters()).unwrap();

        let mut ctx = ProcessingContext::new("DI_X");
        assert!(!store.apply(&mut ctx));

        ctx.connection.tenant = Some("diku".into());
        assert!(store.apply(&mut ctx));
        assert_eq!(ctx.mapping_parameters.loan_types.len(), 1);
        assert!(!store.apply(&mut ctx));
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let store = ReferenceDataStore::with_dir(dir.path());
        assert!(store.list().is_empty());
    }
}
