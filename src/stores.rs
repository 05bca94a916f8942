//! Persisted key-value stores: the per-org completion map and the component
//! metadata registry. Both are JSON files under the platform config dir,
//! keyed by org username so several projects can share one machine.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const COMPLETION_FILE: &str = "sobjects_completion.json";
const COMPONENT_FILE: &str = "component_metadata.json";

fn store_dir() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        let app_dir = config_dir.join("forcebridge");
        if !app_dir.exists() {
            let _ = fs::create_dir_all(&app_dir);
        }
        app_dir
    } else {
        PathBuf::from(".")
    }
}

fn load_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => return data,
                Err(e) => tracing::warn!("Failed to parse {}: {}", path.display(), e),
            },
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        }
    }
    T::default()
}

fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(data)?)?;
    Ok(())
}

/// Field map of one sobject: display label (`Name (string)`) to the plain
/// field name that gets inserted.
pub type FieldMap = HashMap<String, String>;

/// Completion metadata for every initiated org: username -> sobject -> fields.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CompletionStore {
    #[serde(skip)]
    path: PathBuf,
    #[serde(flatten)]
    orgs: HashMap<String, HashMap<String, FieldMap>>,
}

impl CompletionStore {
    pub fn load() -> Self {
        Self::load_from(store_dir().join(COMPLETION_FILE))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let mut store: Self = load_json(&path);
        store.path = path;
        store
    }

    pub fn save(&self) -> Result<()> {
        save_json(&self.path, self)?;
        tracing::info!("Saved completion metadata to {}", self.path.display());
        Ok(())
    }

    /// Whether the project for this username has been initiated.
    pub fn has_org(&self, username: &str) -> bool {
        self.orgs.contains_key(username)
    }

    pub fn org(&self, username: &str) -> Option<&HashMap<String, FieldMap>> {
        self.orgs.get(username)
    }

    /// Replace the whole sobject map for one org.
    pub fn set_org(&mut self, username: &str, sobjects: HashMap<String, FieldMap>) {
        self.orgs.insert(username.to_string(), sobjects);
    }
}

/// Where one org component lives, locally and remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub component_id: String,
    pub component_url: String,
    #[serde(default)]
    pub component_type: String,
    #[serde(default)]
    pub body_field: String,
}

/// Component registry: component key (`ApexClassMyController`) -> record.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ComponentStore {
    #[serde(skip)]
    path: PathBuf,
    #[serde(flatten)]
    components: HashMap<String, ComponentRecord>,
}

impl ComponentStore {
    pub fn load() -> Self {
        Self::load_from(store_dir().join(COMPONENT_FILE))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let mut store: Self = load_json(&path);
        store.path = path;
        store
    }

    pub fn save(&self) -> Result<()> {
        save_json(&self.path, self)?;
        tracing::info!(
            "Saved {} component records to {}",
            self.components.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ComponentRecord> {
        self.components.get(key)
    }

    pub fn set(&mut self, key: &str, record: ComponentRecord) {
        self.components.insert(key.to_string(), record);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
