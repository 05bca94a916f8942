//! Org session settings that persist between runs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SESSION_FILE: &str = "forcebridge_session.json";

/// Component types fetched by the component refresh by default.
fn default_component_types() -> Vec<String> {
    vec![
        "ApexClass".to_string(),
        "ApexTrigger".to_string(),
        "ApexPage".to_string(),
        "ApexComponent".to_string(),
        "StaticResource".to_string(),
    ]
}

fn default_api_version() -> String {
    "59.0".to_string()
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

/// Connection and workspace settings for one org session.
///
/// The username doubles as the identity key for all per-org persistence
/// (completion map, component metadata, caches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Org username; identity key for caches and stores.
    pub username: String,
    /// OAuth access token presented as a bearer token.
    #[serde(default)]
    pub access_token: String,
    /// Instance URL, e.g. https://example.my.salesforce.com
    pub instance_url: String,
    /// REST API version, without the leading "v".
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Project workspace root; describe/ and metadata/ trees land here.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Spacing between poller ticks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Overall wait budget per operation in seconds; None waits indefinitely.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Component types covered by the component refresh.
    #[serde(default = "default_component_types")]
    pub component_types: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            access_token: String::new(),
            instance_url: String::new(),
            api_version: default_api_version(),
            workspace: default_workspace(),
            poll_interval_ms: default_poll_interval_ms(),
            deadline_secs: None,
            component_types: default_component_types(),
        }
    }
}

impl SessionConfig {
    /// Session file under the platform config dir, falling back to the
    /// working directory.
    fn session_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("forcebridge");
            if !app_dir.exists() {
                let _ = fs::create_dir_all(&app_dir);
            }
            app_dir.join(SESSION_FILE)
        } else {
            PathBuf::from(SESSION_FILE)
        }
    }

    /// Load the session from disk, then apply environment overrides.
    /// Missing or unparsable files fall back to defaults so a fresh checkout
    /// can be driven entirely from the environment.
    pub fn load() -> Self {
        let mut session = Self::load_from(&Self::session_path());
        session.apply_env_overrides();
        session
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(session) => {
                        tracing::info!("Loaded session from {:?}", path);
                        return session;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse session file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read session file: {}", e);
                }
            }
        }
        tracing::info!("Using default session settings");
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::session_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!("Saved session to {:?}", path);
        Ok(())
    }

    /// SFDC_USERNAME, SFDC_ACCESS_TOKEN, SFDC_INSTANCE_URL and SFDC_WORKSPACE
    /// override whatever the session file holds.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SFDC_USERNAME") {
            self.username = v;
        }
        if let Ok(v) = std::env::var("SFDC_ACCESS_TOKEN") {
            self.access_token = v;
        }
        if let Ok(v) = std::env::var("SFDC_INSTANCE_URL") {
            self.instance_url = v;
        }
        if let Ok(v) = std::env::var("SFDC_WORKSPACE") {
            self.workspace = PathBuf::from(v);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Org-relative REST path prefix, e.g. "/services/data/v59.0".
    pub fn data_path(&self) -> String {
        format!("/services/data/v{}", self.api_version)
    }

    /// Validate the fields needed before any remote call is attempted.
    pub fn validate_for_remote(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            anyhow::bail!("Session username is not set");
        }
        if self.access_token.trim().is_empty() {
            anyhow::bail!("Session access token is not set");
        }
        let url = url::Url::parse(&self.instance_url)
            .map_err(|e| anyhow::anyhow!("Invalid instance URL '{}': {}", self.instance_url, e))?;
        if url.scheme() != "https" {
            anyhow::bail!("Instance URL must use https: {}", self.instance_url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== defaults ====================

    #[test]
    fn test_default_values() {
        let session = SessionConfig::default();
        assert_eq!(session.api_version, "59.0");
        assert_eq!(session.poll_interval_ms, 200);
        assert!(session.deadline_secs.is_none());
        assert_eq!(session.component_types.len(), 5);
        assert!(session.component_types.iter().any(|t| t == "ApexClass"));
    }

    #[test]
    fn test_data_path_format() {
        let session = SessionConfig {
            api_version: "27.0".to_string(),
            ..Default::default()
        };
        assert_eq!(session.data_path(), "/services/data/v27.0");
    }

    // ==================== persistence ====================

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = SessionConfig {
            username: "dev@example.com".to_string(),
            access_token: "00Dxx".to_string(),
            instance_url: "https://example.my.salesforce.com".to_string(),
            deadline_secs: Some(30),
            ..Default::default()
        };
        session.save_to(&path).unwrap();

        let loaded = SessionConfig::load_from(&path);
        assert_eq!(loaded.username, "dev@example.com");
        assert_eq!(loaded.deadline_secs, Some(30));
        assert_eq!(loaded.api_version, "59.0");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SessionConfig::load_from(&dir.path().join("absent.json"));
        assert!(loaded.username.is_empty());
    }

    #[test]
    fn test_load_garbage_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        let loaded = SessionConfig::load_from(&path);
        assert!(loaded.username.is_empty());
    }

    // ==================== validation ====================

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let session = SessionConfig::default();
        assert!(session.validate_for_remote().is_err());
    }

    #[test]
    fn test_validate_rejects_http_instance_url() {
        let session = SessionConfig {
            username: "dev@example.com".to_string(),
            access_token: "tok".to_string(),
            instance_url: "http://example.my.salesforce.com".to_string(),
            ..Default::default()
        };
        let err = session.validate_for_remote().unwrap_err();
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn test_validate_accepts_complete_session() {
        let session = SessionConfig {
            username: "dev@example.com".to_string(),
            access_token: "tok".to_string(),
            instance_url: "https://example.my.salesforce.com".to_string(),
            ..Default::default()
        };
        assert!(session.validate_for_remote().is_ok());
    }
}
