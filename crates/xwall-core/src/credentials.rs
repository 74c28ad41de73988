use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Session cookie carrying the account's auth token.
pub const AUTH_TOKEN: &str = "auth_token";

/// CSRF cookie; its value is echoed in the `x-csrf-token` header.
pub const CSRF_TOKEN: &str = "ct0";

/// Names that must be present and non-empty for a set to be usable.
pub const REQUIRED_TOKENS: [&str; 2] = [AUTH_TOKEN, CSRF_TOKEN];

/// Named token strings authenticating a search session.
///
/// Serialized as a flat JSON object. Extra cookie names are kept so the
/// persisted file round-trips whatever the source produced.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSet(BTreeMap<String, String>);

impl CredentialSet {
    pub fn new(auth_token: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        let mut set = Self::default();
        set.insert(AUTH_TOKEN, auth_token);
        set.insert(CSRF_TOKEN, csrf_token);
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.get(AUTH_TOKEN)
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.get(CSRF_TOKEN)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Required token names that are absent or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_TOKENS
            .into_iter()
            .filter(|name| self.get(name).is_none_or(|v| v.trim().is_empty()))
            .collect()
    }

    pub fn is_usable(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::CredentialError(format!(
                "missing required token(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Render as a `Cookie` header value.
    pub fn cookie_header(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl FromIterator<(String, String)> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// Token values never reach logs.
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Local file holding the last successfully resolved credential set.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub async fn load(&self) -> Result<CredentialSet, AppError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let set: CredentialSet = serde_json::from_str(&raw)?;
        Ok(set)
    }

    /// Write the set as pretty JSON, owner-readable only on Unix.
    pub async fn save(&self, credentials: &CredentialSet) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_string_pretty(credentials)?;
        tokio::fs::write(&self.path, body).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        Ok(())
    }
}
