//! Secrets file: session and signing secrets, role keys, OAuth role mappings

use super::{KEYLESS_ROLES, ROLES};
use crate::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Random bytes behind a role key
pub const KEY_BYTES: usize = 32;
/// Random bytes behind session and signing secrets
pub const SECRET_BYTES: usize = 48;

/// provider -> remote id -> role
pub type OAuthMappings = BTreeMap<String, BTreeMap<String, String>>;

/// URL-safe random secret from `len` bytes of OS randomness
pub fn generate_secret(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Persistent secret storage
pub trait SecretStore: Send + Sync {
    /// Session cookie secret, created on first use
    fn session_secret(&self) -> Result<String>;

    /// Token signing secret, created on first use
    fn signing_secret(&self) -> Result<String>;

    /// Role keys currently stored
    fn role_keys(&self) -> Result<BTreeMap<String, String>>;

    /// Role keys, generating one for every role that lacks it
    fn ensure_role_keys(&self) -> Result<BTreeMap<String, String>>;

    fn oauth_role(&self, provider: &str, remote_id: &str) -> Result<Option<String>>;

    fn list_oauth_mappings(&self) -> Result<OAuthMappings>;

    fn save_oauth_mapping(&self, provider: &str, remote_id: &str, role: &str) -> Result<()>;

    fn delete_oauth_mapping(&self, provider: &str, remote_id: &str) -> Result<bool>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SecretsFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwt_secret: Option<String>,
    keys: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "OAuthSection::is_empty")]
    oauth: OAuthSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OAuthSection {
    mappings: OAuthMappings,
    /// Provider client settings, kept as written
    #[serde(flatten)]
    providers: BTreeMap<String, serde_yaml::Value>,
}

impl OAuthSection {
    fn is_empty(&self) -> bool {
        self.mappings.is_empty() && self.providers.is_empty()
    }
}

/// Numeric ids are kept as-is, anything else is compared lowercase
fn normalize_remote_id(remote_id: &str) -> String {
    let id = remote_id.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        id.to_string()
    } else {
        id.to_lowercase()
    }
}

/// YAML secrets file, rewritten with owner-only permissions on every change
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SecretsFile> {
        if !self.path.exists() {
            return Ok(SecretsFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(SecretsFile::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    fn write(&self, data: &SecretsFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(data)?)?;
        restrict_permissions(&self.path);
        Ok(())
    }

    /// Read, let `f` edit, and write back when it reports a change
    fn update<T>(&self, f: impl FnOnce(&mut SecretsFile) -> (T, bool)) -> Result<T> {
        let _guard = self.lock.lock();
        let mut data = self.read()?;
        let (out, changed) = f(&mut data);
        if changed {
            self.write(&data)?;
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        log::warn!("Failed to restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl SecretStore for FileSecretStore {
    fn session_secret(&self) -> Result<String> {
        self.update(|data| match &data.session_secret {
            Some(secret) => (secret.clone(), false),
            None => {
                let secret = generate_secret(SECRET_BYTES);
                data.session_secret = Some(secret.clone());
                log::info!("Session secret written to {}", self.path.display());
                (secret, true)
            }
        })
    }

    fn signing_secret(&self) -> Result<String> {
        self.update(|data| match &data.jwt_secret {
            Some(secret) => (secret.clone(), false),
            None => {
                let secret = generate_secret(SECRET_BYTES);
                data.jwt_secret = Some(secret.clone());
                log::info!("Signing secret written to {}", self.path.display());
                (secret, true)
            }
        })
    }

    fn role_keys(&self) -> Result<BTreeMap<String, String>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.keys)
    }

    fn ensure_role_keys(&self) -> Result<BTreeMap<String, String>> {
        self.update(|data| {
            let mut created = Vec::new();
            for role in ROLES.iter().filter(|r| !KEYLESS_ROLES.contains(*r)) {
                let missing = data.keys.get(*role).map_or(true, |k| k.is_empty());
                if missing {
                    data.keys
                        .insert(role.to_string(), generate_secret(KEY_BYTES));
                    created.push(*role);
                }
            }
            if !created.is_empty() {
                log::info!(
                    "Generated access keys for {} in {}",
                    created.join(", "),
                    self.path.display()
                );
            }
            (data.keys.clone(), !created.is_empty())
        })
    }

    fn oauth_role(&self, provider: &str, remote_id: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        let data = self.read()?;
        let Some(mappings) = data.oauth.mappings.get(provider) else {
            return Ok(None);
        };
        Ok(mappings
            .get(remote_id.trim())
            .or_else(|| mappings.get(&normalize_remote_id(remote_id)))
            .cloned())
    }

    fn list_oauth_mappings(&self) -> Result<OAuthMappings> {
        let _guard = self.lock.lock();
        Ok(self.read()?.oauth.mappings)
    }

    fn save_oauth_mapping(&self, provider: &str, remote_id: &str, role: &str) -> Result<()> {
        self.update(|data| {
            data.oauth
                .mappings
                .entry(provider.to_string())
                .or_default()
                .insert(normalize_remote_id(remote_id), role.to_string());
            ((), true)
        })
    }

    fn delete_oauth_mapping(&self, provider: &str, remote_id: &str) -> Result<bool> {
        self.update(|data| {
            let Some(mappings) = data.oauth.mappings.get_mut(provider) else {
                return (false, false);
            };
            let exact = remote_id.trim().to_string();
            let lower = exact.to_lowercase();
            let removed = mappings.remove(&exact).is_some() || mappings.remove(&lower).is_some();
            (removed, removed)
        })
    }
}
