//! Schema Registry - Store broker layout overrides
//!
//! Saves validated [`BrokerSchema`] documents to disk, one per broker, and
//! resolves the layout to use for a broker: a stored override if one exists,
//! the built-in layout otherwise.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult};
use crate::schema::{Broker, BrokerSchema};
use crate::validation::parse_schema_document;

/// Directory where schemas are stored (relative to current dir)
const DEFAULT_REGISTRY_DIR: &str = ".brokerload/schemas";

/// Environment variable overriding the registry directory.
pub const REGISTRY_DIR_ENV: &str = "BROKERLOAD_SCHEMA_DIR";

/// A stored schema with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSchema {
    /// The broker layout
    pub schema: BrokerSchema,
    /// Import timestamp
    pub imported_at: String,
    /// File the schema was imported from
    pub source: Option<String>,
}

/// Where a resolved schema came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaOrigin {
    Builtin,
    Registry,
}

/// Registry for broker layout overrides
pub struct SchemaRegistry {
    /// Directory where schemas are stored
    registry_dir: PathBuf,
    /// Loaded overrides
    schemas: HashMap<Broker, StoredSchema>,
}

impl SchemaRegistry {
    /// Create a registry in `$BROKERLOAD_SCHEMA_DIR`, or the default
    /// directory, loading existing schemas from disk
    pub fn new() -> Self {
        let dir = std::env::var(REGISTRY_DIR_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY_DIR.to_string());
        Self::with_dir(dir)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let registry_dir = PathBuf::from(dir.as_ref());
        let mut registry = Self {
            registry_dir,
            schemas: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all schemas from the registry directory.
    ///
    /// Files that do not parse or no longer validate are ignored, so a
    /// broken override falls back to the built-in layout.
    fn load_all(&mut self) {
        if !self.registry_dir.exists() {
            return;
        }

        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredSchema>(&content) {
                        if stored.schema.validate().is_ok() {
                            self.schemas.insert(stored.schema.broker, stored);
                        }
                    }
                }
            }
        }
    }

    /// Get all stored overrides, ordered by broker
    pub fn list(&self) -> Vec<&StoredSchema> {
        let mut stored: Vec<_> = self.schemas.values().collect();
        stored.sort_by_key(|s| s.schema.broker.id());
        stored
    }

    /// Get the stored override for a broker
    pub fn get(&self, broker: Broker) -> Option<&StoredSchema> {
        self.schemas.get(&broker)
    }

    /// The layout to use for a broker, and where it came from
    pub fn resolve(&self, broker: Broker) -> (BrokerSchema, SchemaOrigin) {
        match self.schemas.get(&broker) {
            Some(stored) => (stored.schema.clone(), SchemaOrigin::Registry),
            None => (broker.builtin_schema(), SchemaOrigin::Builtin),
        }
    }

    /// Save a schema, replacing any previous override for its broker
    pub fn save(&mut self, schema: BrokerSchema, source: Option<String>) -> RegistryResult<PathBuf> {
        schema.validate()?;

        // Ensure directory exists
        fs::create_dir_all(&self.registry_dir)?;

        let broker = schema.broker;
        let stored = StoredSchema {
            schema,
            imported_at: chrono::Utc::now().to_rfc3339(),
            source,
        };

        // Save to disk
        let path = self.path_for(broker);
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&path, content)?;

        self.schemas.insert(broker, stored);
        Ok(path)
    }

    /// Import a schema from a JSON document
    pub fn import(&mut self, path: &Path) -> RegistryResult<Broker> {
        let content = fs::read_to_string(path)?;
        let schema = parse_schema_document(&content)?;
        let broker = schema.broker;
        self.save(schema, Some(path.display().to_string()))?;
        Ok(broker)
    }

    /// Delete the override for a broker
    pub fn delete(&mut self, broker: Broker) -> RegistryResult<()> {
        if self.schemas.remove(&broker).is_some() {
            fs::remove_file(self.path_for(broker))?;
            Ok(())
        } else {
            Err(RegistryError::NotFound(broker.id().to_string()))
        }
    }

    fn path_for(&self, broker: Broker) -> PathBuf {
        self.registry_dir.join(format!("{}.json", broker.id()))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let dir = tempdir().unwrap();
        let registry = SchemaRegistry::with_dir(dir.path());

        let (schema, origin) = registry.resolve(Broker::Dhl);
        assert_eq!(origin, SchemaOrigin::Builtin);
        assert_eq!(schema, Broker::Dhl.builtin_schema());
    }

    #[test]
    fn test_import_persists_override() {
        let dir = tempdir().unwrap();
        let mut schema = Broker::Dachser.builtin_schema();
        schema.version = "2024-06".to_string();
        schema.footer.min_filled = 4;
        let doc = dir.path().join("dachser-2024.json");
        fs::write(&doc, schema.to_json().unwrap()).unwrap();

        let registry_dir = dir.path().join("registry");
        let mut registry = SchemaRegistry::with_dir(&registry_dir);
        assert_eq!(registry.import(&doc).unwrap(), Broker::Dachser);

        // A fresh registry sees the override on disk.
        let reloaded = SchemaRegistry::with_dir(&registry_dir);
        let (resolved, origin) = reloaded.resolve(Broker::Dachser);
        assert_eq!(origin, SchemaOrigin::Registry);
        assert_eq!(resolved.version, "2024-06");
        assert_eq!(resolved.footer.min_filled, 4);
        assert_eq!(reloaded.list().len(), 1);
    }

    #[test]
    fn test_invalid_document_not_imported() {
        let dir = tempdir().unwrap();
        let mut schema = Broker::Dachser.builtin_schema();
        schema.zones[0].text_column = 0;
        let doc = dir.path().join("broken.json");
        fs::write(&doc, schema.to_json().unwrap()).unwrap();

        let mut registry = SchemaRegistry::with_dir(dir.path().join("registry"));
        assert!(matches!(
            registry.import(&doc),
            Err(RegistryError::InvalidSchema(SchemaError::TextColumnOutsideZone { .. }))
        ));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut registry = SchemaRegistry::with_dir(dir.path());
        let path = registry.save(Broker::Schenker.builtin_schema(), None).unwrap();
        assert!(path.exists());

        registry.delete(Broker::Schenker).unwrap();
        assert!(!path.exists());
        assert!(matches!(
            registry.delete(Broker::Schenker),
            Err(RegistryError::NotFound(_))
        ));
    }
}
