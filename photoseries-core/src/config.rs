//! Credentials and bucket settings.
//!
//! The secrets file is JSON with camelCase keys:
//!
//! ```json
//! {
//!   "accountId": "0123abcd",
//!   "accessKeyId": "...",
//!   "secretAccessKey": "...",
//!   "bucketName": "photos",
//!   "manifestKey": "manifest.json"
//! }
//! ```
//!
//! `bucketName`, `manifestKey` and `endpoint` are optional and can be supplied
//! on the command line instead.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MANIFEST_KEY: &str = "manifest.json";

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secrets {
    #[serde(default)]
    pub account_id: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub manifest_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("manifest_key", &self.manifest_key)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Secrets {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let secrets: Secrets = serde_json::from_str(json)?;
        if secrets.access_key_id.trim().is_empty() {
            return Err(ConfigError::Missing("accessKeyId"));
        }
        if secrets.secret_access_key.trim().is_empty() {
            return Err(ConfigError::Missing("secretAccessKey"));
        }
        Ok(secrets)
    }
}

/// Everything needed to talk to the bucket and find the manifest.
#[derive(Clone)]
pub struct StoreSettings {
    pub endpoint: String,
    /// Path-style addressing, needed by S3-compatible services such as MinIO.
    pub force_path_style: bool,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub manifest_key: String,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("bucket", &self.bucket)
            .field("manifest_key", &self.manifest_key)
            .finish_non_exhaustive()
    }
}

/// Values that take precedence over the secrets file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bucket: Option<String>,
    pub manifest_key: Option<String>,
    /// Usually `AWS_ENDPOINT_URL`.
    pub endpoint: Option<String>,
}

impl StoreSettings {
    pub fn resolve(secrets: Secrets, overrides: Overrides) -> Result<Self, ConfigError> {
        let bucket = non_empty(overrides.bucket)
            .or(non_empty(secrets.bucket_name))
            .ok_or(ConfigError::Missing("bucketName"))?;
        let manifest_key = non_empty(overrides.manifest_key)
            .or(non_empty(secrets.manifest_key))
            .unwrap_or_else(|| DEFAULT_MANIFEST_KEY.to_string());

        let (endpoint, force_path_style) = match (
            non_empty(secrets.endpoint),
            non_empty(overrides.endpoint),
            non_empty(secrets.account_id),
        ) {
            (Some(endpoint), _, _) => (endpoint, false),
            (None, Some(endpoint), _) => (endpoint, true),
            (None, None, Some(account_id)) => (r2_endpoint(&account_id), false),
            (None, None, None) => return Err(ConfigError::Missing("accountId")),
        };

        Ok(Self {
            endpoint,
            force_path_style,
            access_key_id: secrets.access_key_id,
            secret_access_key: secrets.secret_access_key,
            bucket,
            manifest_key,
        })
    }
}

pub fn r2_endpoint(account_id: &str) -> String {
    format!("https://{account_id}.r2.cloudflarestorage.com")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
