//! Credentials for the remote store, loaded once at startup.

use std::path::Path;

use serde::Deserialize;

use crate::DirectoryError;

fn default_database_id() -> String {
    "(default)".to_string()
}

/// Connection secrets for the Firestore project.
///
/// Read from a JSON file:
///
/// ```json
/// { "projectId": "attendance-tracker-2", "apiKey": "..." }
/// ```
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Firestore project identifier.
    pub project_id: String,

    /// Database within the project.
    #[serde(default = "default_database_id")]
    pub database_id: String,

    /// API key, sent as the `key` query parameter.
    #[serde(default)]
    pub api_key: Option<String>,

    /// OAuth access token, sent as a bearer token.
    #[serde(default)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Loads and validates credentials from `path`.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| DirectoryError::Credentials {
                path: path.to_path_buf(),
                message: format!("failed to read file: {e}"),
            })?;

        let credentials: Self =
            serde_json::from_str(&contents).map_err(|e| DirectoryError::Credentials {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        credentials
            .validate()
            .map_err(|message| DirectoryError::Credentials {
                path: path.to_path_buf(),
                message,
            })?;
        Ok(credentials)
    }

    fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("projectId must not be empty".to_string());
        }
        if self.database_id.trim().is_empty() {
            return Err("databaseId must not be empty".to_string());
        }
        if self.api_key.is_none() && self.access_token.is_none() {
            return Err("one of apiKey or accessToken is required".to_string());
        }
        Ok(())
    }
}
