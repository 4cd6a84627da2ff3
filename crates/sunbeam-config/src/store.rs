//! Per-deployment configuration store
//!
//! Each item is a JSON document stored as `<root>/<key>.json`. Items hold
//! stored Terraform variables, feature enablement flags and similar records
//! that have to survive between commands.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(ConfigError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }

    /// Read the item stored under `key`.
    pub async fn read_config(&self, key: &str) -> Result<serde_json::Value> {
        let path = self.item_path(key)?;
        if !path.exists() {
            return Err(ConfigError::ItemNotFound(key.to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read the item stored under `key`, or an empty object when absent.
    pub async fn read_config_or_default(
        &self,
        key: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        match self.read_config(key).await {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Ok(serde_json::Map::new()),
            Err(ConfigError::ItemNotFound(_)) => {
                tracing::debug!("{} not found in config store, using empty defaults", key);
                Ok(serde_json::Map::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the item stored under `key`.
    pub async fn update_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let path = self.item_path(key)?;
        if !self.root.exists() {
            fs::create_dir_all(&self.root).await?;
            tracing::debug!("Created config store: {}", self.root.display());
        }
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&path, content).await?;
        tracing::debug!("Updated config item {}", key);
        Ok(())
    }

    /// Remove the item stored under `key`. Removing an absent item is a no-op.
    pub async fn delete_config(&self, key: &str) -> Result<()> {
        let path = self.item_path(key)?;
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_update_then_read() {
        let temp_dir = tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path().join("lab"));

        store
            .update_config("TerraformVarsOpenstack", &json!({"enable-masakari": true}))
            .await
            .unwrap();

        let value = store.read_config("TerraformVarsOpenstack").await.unwrap();
        assert_eq!(value["enable-masakari"], true);
    }

    #[tokio::test]
    async fn test_missing_item() {
        let temp_dir = tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        let err = store.read_config("TlsProvider").await.unwrap_err();
        assert!(matches!(err, ConfigError::ItemNotFound(_)));
        assert!(store.read_config_or_default("TlsProvider").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let temp_dir = tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        let err = store.update_config("../escape", &json!({})).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempdir().unwrap();
        let store = ConfigStore::new(temp_dir.path());

        store.update_config("Feature", &json!({"enabled": true})).await.unwrap();
        store.delete_config("Feature").await.unwrap();
        store.delete_config("Feature").await.unwrap();
        assert!(store.read_config("Feature").await.is_err());
    }
}
