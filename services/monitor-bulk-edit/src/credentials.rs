//! API credential resolution
//!
//! Credentials come from, in priority order: an explicit id/token pair, a named
//! profile, or the `default` profile of the INI profile store.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::BulkEditError;

pub const DEFAULT_PROFILE: &str = "default";

const ID_HEADER: &str = "x-mcd-id";
const TOKEN_HEADER: &str = "x-mcd-token";

/// API key pair attached to every request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub mcd_id: String,
    mcd_token: String,
    source: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mcd_id", &self.mcd_id)
            .field("mcd_token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl Credentials {
    pub fn new(mcd_id: impl Into<String>, mcd_token: impl Into<String>) -> Self {
        Self {
            mcd_id: mcd_id.into(),
            mcd_token: mcd_token.into(),
            source: "explicit credentials".to_string(),
        }
    }

    /// Where these credentials were resolved from, for log lines
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn headers(&self) -> [(&str, &str); 2] {
        [
            (ID_HEADER, self.mcd_id.as_str()),
            (TOKEN_HEADER, self.mcd_token.as_str()),
        ]
    }
}

/// What the operator asked for on the command line
#[derive(Debug, Clone, Default)]
pub struct CredentialRequest {
    pub mcd_id: Option<String>,
    pub mcd_token: Option<String>,
    pub profile: Option<String>,
}

/// `~/.mcd/profiles.ini`, if a home directory is known
pub fn default_profiles_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".mcd").join("profiles.ini"))
}

/// Resolve credentials once at startup
pub fn resolve(request: &CredentialRequest, profiles_path: Option<&Path>) -> crate::Result<Credentials> {
    match (&request.mcd_id, &request.mcd_token) {
        (Some(id), Some(token)) => {
            tracing::debug!("Using explicit credentials for {}", id);
            return Ok(Credentials::new(id.clone(), token.clone()));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(BulkEditError::Authentication(
                "both an id and a token are required for explicit credentials".to_string(),
            ));
        }
        (None, None) => {}
    }

    let path = profiles_path.ok_or_else(|| {
        BulkEditError::Authentication("no profiles file location could be determined".to_string())
    })?;
    if !path.exists() {
        return Err(BulkEditError::Authentication(format!(
            "no profiles file found at {}",
            path.display()
        )));
    }

    let (profile, source) = match &request.profile {
        Some(name) => (name.as_str(), format!("profile '{}'", name)),
        None => (DEFAULT_PROFILE, "default profile".to_string()),
    };
    let mut credentials = read_profile(path, profile)?;
    credentials.source = source;
    tracing::debug!("Resolved credentials from {}", credentials.source);
    Ok(credentials)
}

fn read_profile(path: &Path, profile: &str) -> crate::Result<Credentials> {
    let store = ::config::Config::builder()
        .add_source(::config::File::from(path).format(::config::FileFormat::Ini))
        .build()
        .map_err(|e| {
            BulkEditError::Authentication(format!(
                "failed to read profiles file {}: {}",
                path.display(),
                e
            ))
        })?;

    let section = store
        .get_table(profile)
        .or_else(|_| store.get_table(&profile.to_lowercase()))
        .map_err(|_| {
            BulkEditError::Authentication(format!(
                "profile '{}' not found in {}",
                profile,
                path.display()
            ))
        })?;

    let field = |key: &str| {
        section
            .get(key)
            .and_then(|value| value.clone().into_string().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    match (field("mcd_id"), field("mcd_token")) {
        (Some(id), Some(token)) => Ok(Credentials::new(id, token)),
        _ => Err(BulkEditError::Authentication(format!(
            "profile '{}' does not contain mcd_id and mcd_token",
            profile
        ))),
    }
}
