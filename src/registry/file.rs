//! File-backed license registry with atomic writes.
//!
//! Every lookup re-reads the file, so hand edits take effect on the next
//! request. Writes go to a temp file which is then renamed over the target.

use crate::registry::record::{self, LicenseMap, LicenseRecord};
use crate::QuotagateError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// JSON-file license registry.
pub struct LicenseRegistry {
    /// Registry file path.
    path: PathBuf,
    /// Serializes writers inside this process.
    write_lock: Mutex<()>,
}

impl LicenseRegistry {
    /// Create a registry backed by the file at `path`.
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Registry file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    /// Load the whole registry, treating any failure as an empty registry.
    ///
    /// An empty registry rejects every key, so failures fail closed.
    pub async fn load(&self) -> LicenseMap {
        match self.try_load().await {
            Ok(licenses) => licenses,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "license registry unreadable, treating as empty");
                LicenseMap::new()
            }
        }
    }

    /// Load the whole registry, reporting unreadable or corrupt files.
    ///
    /// A missing file is an empty registry, not an error.
    pub async fn try_load(&self) -> Result<LicenseMap, QuotagateError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "license registry file not found");
                return Ok(LicenseMap::new());
            }
            Err(e) => {
                return Err(QuotagateError::RegistryIO(format!(
                    "Failed to read registry: {}",
                    e
                )))
            }
        };

        record::from_json(&json)
    }

    /// Look up a single license by key.
    pub async fn lookup(&self, key: &str) -> Option<LicenseRecord> {
        self.load().await.remove(key)
    }

    /// Overwrite the registry with `licenses`.
    pub async fn save(&self, licenses: &LicenseMap) -> Result<(), QuotagateError> {
        let _guard = self.write_lock.lock().await;
        self.write_atomic(licenses).await
    }

    /// Insert or replace the record for `key`.
    ///
    /// Upserts are serialized within this process; across processes the
    /// last writer wins.
    pub async fn upsert(&self, key: &str, license: LicenseRecord) -> Result<(), QuotagateError> {
        license.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut licenses = self.try_load().await?;
        let replaced = licenses.insert(key.to_string(), license.clone()).is_some();
        self.write_atomic(&licenses).await?;

        info!(
            license_type = %license.license_type,
            enabled = license.enabled,
            daily_limit = license.daily_limit,
            replaced,
            "license upserted"
        );
        Ok(())
    }

    async fn write_atomic(&self, licenses: &LicenseMap) -> Result<(), QuotagateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                QuotagateError::RegistryIO(format!("Failed to create registry dir: {}", e))
            })?;
        }

        let json = record::to_json(licenses)?;
        let temp_path = self.temp_path();

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| QuotagateError::RegistryIO(format!("Failed to create temp file: {}", e)))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| QuotagateError::RegistryIO(format!("Failed to write temp file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| QuotagateError::RegistryIO(format!("Failed to sync temp file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            QuotagateError::RegistryIO(format!("Failed to rename registry file: {}", e))
        })?;

        debug!(path = %self.path.display(), entries = licenses.len(), "license registry saved");
        Ok(())
    }
}
