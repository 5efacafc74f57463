use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::Token;

/// Profile used when the caller does not name one.
pub const DEFAULT_PROFILE: &str = "default";

const FILE_VERSION: u32 = 1;
const EXTENSION: &str = "toml";

/// Persistence for tokens obtained by the device flow, keyed by client id
/// and profile.
pub trait TokenStore: Send + Sync {
    fn load(&self, client_id: &str, profile: &str) -> Result<Option<Token>, AuthError>;
    fn save(&self, client_id: &str, profile: &str, token: &Token) -> Result<(), AuthError>;
    fn clear(&self, client_id: &str, profile: &str) -> Result<(), AuthError>;
}

/// Token store laid out as `<base>/<client id>/<profile>.toml`.
///
/// Path components are escaped so distinct ids never share a file. Writes go
/// through a temporary file created `0600` on unix and renamed into place.
///
/// # Example
/// ```no_run
/// use device_grant::auth::{FileTokenStore, Token, TokenStore};
///
/// let store = FileTokenStore::default();
/// let token: Token = serde_json::from_str(
///     r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#,
/// )?;
/// store.save("0oa1", "default", &token)?;
/// assert_eq!(store.profiles("0oa1")?, vec!["default".to_string()]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl FileTokenStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `tokens/` under the per-user data directory.
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
            .map(|dirs| dirs.data_dir().join("tokens"))
            .unwrap_or_else(|| PathBuf::from(".device-grant").join("tokens"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Profiles with a stored token for `client_id`, sorted.
    pub fn profiles(&self, client_id: &str) -> Result<Vec<String>, AuthError> {
        let entries = match fs::read_dir(self.client_dir(client_id)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut profiles = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            match read_file(&path) {
                Ok(Some(file)) if file.client_id == client_id => profiles.push(file.profile),
                Ok(_) => {}
                Err(error) => tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Skipping unreadable token file"
                ),
            }
        }
        profiles.sort();
        Ok(profiles)
    }

    fn client_dir(&self, client_id: &str) -> PathBuf {
        self.base_dir.join(path_label(client_id))
    }

    fn token_path(&self, client_id: &str, profile: &str) -> PathBuf {
        self.client_dir(client_id)
            .join(format!("{}.{EXTENSION}", path_label(profile)))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, client_id: &str, profile: &str) -> Result<Option<Token>, AuthError> {
        let path = self.token_path(client_id, profile);
        Ok(read_file(&path)?.map(|file| file.token))
    }

    fn save(&self, client_id: &str, profile: &str, token: &Token) -> Result<(), AuthError> {
        let path = self.token_path(client_id, profile);
        let file = TokenFile {
            version: FILE_VERSION,
            client_id: client_id.to_string(),
            profile: profile.to_string(),
            saved_at: Utc::now(),
            token: token.clone(),
        };
        write_private(&path, toml::to_string(&file)?.as_bytes())?;
        tracing::debug!(path = %path.display(), "Saved token");
        Ok(())
    }

    fn clear(&self, client_id: &str, profile: &str) -> Result<(), AuthError> {
        match fs::remove_file(self.token_path(client_id, profile)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// On-disk record. `client_id` and `profile` keep the unescaped values.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    client_id: String,
    profile: String,
    saved_at: DateTime<Utc>,
    token: Token,
}

fn read_file(path: &Path) -> Result<Option<TokenFile>, AuthError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let file: TokenFile = toml::from_str(&raw)?;
    if file.version != FILE_VERSION {
        return Err(AuthError::Serialization(format!(
            "unsupported token file version {} in {}",
            file.version,
            path.display()
        )));
    }
    Ok(Some(file))
}

fn write_private(path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension(format!("{EXTENSION}.tmp"));
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut staged = options.open(&staging)?;
    staged.write_all(contents)?;
    staged.sync_all()?;
    drop(staged);
    fs::rename(&staging, path)?;
    Ok(())
}

/// Escape `value` for use as one path component: ASCII alphanumerics, `-`
/// and `_` pass through, every other byte becomes `%XX`. Blank maps to
/// [`DEFAULT_PROFILE`].
fn path_label(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return DEFAULT_PROFILE.to_string();
    }
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
