//! Deployment state persistence
//!
//! Manages the `.deploy/state.json` (or `.deploy/state.<env>.json`) file
//! which records the resources and file hashes of one environment.

use crate::error::{CloudError, Result};
use crate::hash::FileHashMap;
use crate::resources::Resources;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const STATE_VERSION: &str = "1.0";
pub const DEFAULT_STATE_DIR: &str = ".deploy";
pub const DEFAULT_ENVIRONMENT: &str = "default";
const STATE_PREFIX: &str = "state";
const STATE_EXT: &str = ".json";

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// Persisted state of one (app, environment) deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    pub app: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Rewritten on every save
    #[serde(default = "Utc::now")]
    pub last_deployed: DateTime<Utc>,

    /// Schema version; `None` for files written before versioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub resources: Resources,

    #[serde(default)]
    pub files: FileHashMap,
}

impl DeploymentState {
    pub fn new(app: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            environment: environment.into(),
            last_deployed: Utc::now(),
            version: Some(STATE_VERSION.to_string()),
            resources: Resources::default(),
            files: FileHashMap::new(),
        }
    }

    /// Replace the tracked file hashes
    pub fn with_files(mut self, files: FileHashMap) -> Self {
        self.files = files;
        self
    }
}

/// A state file found in the state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub environment: String,
    pub path: PathBuf,
}

/// File name for an environment's state
pub fn state_file_name(environment: &str) -> String {
    if environment.is_empty() || environment == DEFAULT_ENVIRONMENT {
        format!("{STATE_PREFIX}{STATE_EXT}")
    } else {
        format!("{STATE_PREFIX}.{environment}{STATE_EXT}")
    }
}

/// Inverse of [`state_file_name`]; `None` if the name is not a state file
fn environment_from_file_name(name: &str) -> Option<String> {
    let middle = name
        .strip_prefix(STATE_PREFIX)?
        .strip_suffix(STATE_EXT)?
        .trim_start_matches('.');
    if middle.is_empty() {
        Some(DEFAULT_ENVIRONMENT.to_string())
    } else {
        Some(middle.to_string())
    }
}

fn major_version(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Normalize a raw state document into the current shape.
///
/// Runs before typed deserialization. Files without a `version` are the
/// pre-versioning format and pass through unchanged apart from the
/// certificate key rename; the version is stamped on the next save.
pub fn migrate(mut raw: Value) -> std::result::Result<Value, String> {
    let obj = raw
        .as_object_mut()
        .ok_or_else(|| "state document is not a JSON object".to_string())?;

    for field in ["app", "environment", "resources"] {
        if !obj.contains_key(field) {
            return Err(format!("missing required field `{field}`"));
        }
    }
    if !obj["resources"].is_object() {
        return Err("`resources` must be an object".to_string());
    }

    match obj.get("version").and_then(Value::as_str) {
        Some(version) => {
            let supported = major_version(STATE_VERSION).unwrap_or(1);
            if major_version(version).is_some_and(|major| major > supported) {
                return Err(format!(
                    "state file version {version} is newer than supported version {STATE_VERSION}"
                ));
            }
        }
        None => tracing::debug!("state file has no version, treating as legacy format"),
    }

    if let Some(acm) = obj
        .get_mut("resources")
        .and_then(|r| r.get_mut("acm"))
        .and_then(Value::as_object_mut)
    {
        if !acm.contains_key("domainName")
            && let Some(domain) = acm.remove("domain")
        {
            acm.insert("domainName".to_string(), domain);
        }
        if !acm.contains_key("validationMethod") {
            acm.insert("validationMethod".to_string(), Value::from("DNS"));
        }
    }

    Ok(raw)
}

/// Reads and writes state files below a base directory
#[derive(Debug, Clone)]
pub struct StateStore {
    /// Project root the state directory is resolved against
    base_dir: PathBuf,
    state_dir: PathBuf,
}

impl StateStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }

    /// Override the state directory (relative to the base directory, or absolute)
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Get the state directory path
    pub fn state_dir(&self) -> PathBuf {
        self.base_dir.join(&self.state_dir)
    }

    /// Get the state file path for an environment
    pub fn state_path(&self, environment: &str) -> PathBuf {
        self.state_dir().join(state_file_name(environment))
    }

    pub fn exists(&self, environment: &str) -> bool {
        self.state_path(environment).is_file()
    }

    /// Load the state for an environment, `None` if no state file exists
    pub async fn load(&self, environment: &str) -> Result<Option<DeploymentState>> {
        let path = self.state_path(environment);
        if !path.exists() {
            tracing::debug!("State file not found: {}", path.display());
            return Ok(None);
        }

        let load_error = |message: String| CloudError::StateLoad {
            path: path.clone(),
            message,
        };

        let content = fs::read_to_string(&path).await?;
        let raw: Value = serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;
        let normalized = migrate(raw).map_err(load_error)?;
        let state: DeploymentState =
            serde_json::from_value(normalized).map_err(|e| load_error(e.to_string()))?;

        tracing::debug!(
            environment,
            files = state.files.len(),
            resources = ?state.resource_kinds(),
            "Loaded state"
        );
        Ok(Some(state))
    }

    /// Stamp and write the state, returning the stamped value.
    ///
    /// Overwrites unconditionally.
    pub async fn save(&self, mut state: DeploymentState) -> Result<DeploymentState> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }

        if state.version.is_none() {
            state.version = Some(STATE_VERSION.to_string());
        }
        state.last_deployed = Utc::now();

        let path = self.state_path(&state.environment);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&state)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(
            environment = %state.environment,
            files = state.files.len(),
            "Saved state to {}",
            path.display()
        );
        Ok(state)
    }

    /// Remove the state file, and the state directory if it is left empty.
    ///
    /// Returns whether a file was deleted.
    pub async fn delete(&self, environment: &str) -> Result<bool> {
        let path = self.state_path(environment);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        tracing::debug!("Deleted state file: {}", path.display());

        let dir = self.state_dir();
        let mut entries = fs::read_dir(&dir).await?;
        if entries.next_entry().await?.is_none() {
            fs::remove_dir(&dir).await?;
            tracing::debug!("Removed empty state directory: {}", dir.display());
        }
        Ok(true)
    }

    /// Enumerate `state*.json` files, sorted by environment
    pub async fn list(&self) -> Result<Vec<StateEntry>> {
        let dir = self.state_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(environment) = name.to_str().and_then(environment_from_file_name) else {
                continue;
            };
            found.push(StateEntry {
                environment,
                path: entry.path(),
            });
        }
        found.sort_by(|a, b| a.environment.cmp(&b.environment));
        Ok(found)
    }

    /// Load the state, or start an empty one
    pub async fn get_or_create(&self, app: &str, environment: &str) -> Result<DeploymentState> {
        match self.load(environment).await? {
            Some(state) => Ok(state),
            None => {
                tracing::debug!(app, environment, "Starting with empty state");
                Ok(DeploymentState::new(app, environment))
            }
        }
    }
}
