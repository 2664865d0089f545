//! Role-based access keys and the credential stores behind them

mod secrets;
mod tokens;

pub use secrets::{generate_secret, FileSecretStore, OAuthMappings, SecretStore};
pub use tokens::{EmbedRecord, MemoryTokenStore, TokenRecord, TokenStore};

use crate::{Error, Result};
use std::collections::BTreeMap;

/// Roles an access key can be issued for
pub const ROLES: [&str; 6] = ["admin", "mod", "tts", "push", "pull", "overlay"];

/// Roles that never get a generated key of their own
pub const KEYLESS_ROLES: [&str; 1] = ["mod"];

/// Checks presented keys against the configured role keys
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    enabled: bool,
    keys: BTreeMap<String, String>,
}

impl AccessGate {
    /// Gate that lets every request through
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(keys: BTreeMap<String, String>) -> Self {
        Self {
            enabled: true,
            keys,
        }
    }

    /// Enabled gate with keys taken from `store`, creating missing ones
    pub fn from_store(store: &dyn SecretStore) -> Result<Self> {
        let keys = store.ensure_role_keys()?;
        log::info!(
            "Access keys enabled for roles: {}",
            keys.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(Self::new(keys))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Roles that have a key configured
    pub fn roles(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }

    /// Whether `key` grants `role`
    ///
    /// A role without its own key accepts any configured key.
    pub fn allows(&self, role: &str, key: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return false;
        };

        if let Some(expected) = self.keys.get(role).filter(|k| !k.is_empty()) {
            return constant_time_eq(key.as_bytes(), expected.as_bytes());
        }

        // Evaluate every key so timing does not reveal which one matched
        self.keys
            .values()
            .fold(false, |ok, v| constant_time_eq(key.as_bytes(), v.as_bytes()) | ok)
    }

    pub fn authorize(&self, role: &str, key: Option<&str>) -> Result<()> {
        if self.allows(role, key) {
            Ok(())
        } else {
            Err(Error::Auth(format!("access denied for role '{}'", role)))
        }
    }
}

/// Byte comparison whose duration depends only on the lengths
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AccessGate {
        let mut keys = BTreeMap::new();
        keys.insert("admin".to_string(), "admin-key".to_string());
        keys.insert("tts".to_string(), "tts-key".to_string());
        AccessGate::new(keys)
    }

    #[test]
    fn test_disabled_allows_everything() {
        let gate = AccessGate::disabled();
        assert!(gate.allows("admin", None));
        assert!(gate.authorize("tts", Some("anything")).is_ok());
    }

    #[test]
    fn test_role_key_must_match() {
        let gate = gate();
        assert!(gate.allows("tts", Some("tts-key")));
        assert!(!gate.allows("tts", Some("admin-key")));
        assert!(!gate.allows("tts", None));
        assert!(!gate.allows("tts", Some("")));
        assert!(matches!(
            gate.authorize("admin", Some("nope")),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_keyless_role_accepts_any_key() {
        let gate = gate();
        assert!(gate.allows("mod", Some("tts-key")));
        assert!(gate.allows("mod", Some("admin-key")));
        assert!(!gate.allows("mod", Some("guess")));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
