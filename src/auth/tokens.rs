//! Issued access tokens and overlay embeds

use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One issued token, identified by its `jti`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub jti: String,
    pub roles: Vec<String>,
    /// Unix seconds
    pub expires: i64,
    pub created_by: String,
    /// Unix seconds
    pub created_at: i64,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub note: String,
}

impl TokenRecord {
    /// Not revoked and not past `expires` at unix time `now`
    pub fn is_active(&self, now: i64) -> bool {
        !self.revoked && self.expires > now
    }
}

/// A public embed bound to a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedRecord {
    pub embed_id: String,
    pub jti: String,
    pub created_at: i64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub origin: Option<String>,
}

/// Token and embed persistence
pub trait TokenStore: Send + Sync {
    fn insert_token(&self, token: TokenRecord) -> Result<()>;

    fn get_token(&self, jti: &str) -> Result<Option<TokenRecord>>;

    /// Newest first
    fn list_tokens(&self) -> Result<Vec<TokenRecord>>;

    /// Mark one token revoked; `false` when it does not exist
    fn revoke_token(&self, jti: &str) -> Result<bool>;

    /// Revoke every token whose id starts with `prefix`
    fn revoke_token_prefix(&self, prefix: &str) -> Result<bool>;

    fn insert_embed(&self, embed: EmbedRecord) -> Result<()>;

    fn get_embed(&self, embed_id: &str) -> Result<Option<EmbedRecord>>;

    fn delete_embed(&self, embed_id: &str) -> Result<bool>;

    /// Newest first
    fn list_embeds(&self) -> Result<Vec<EmbedRecord>>;
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<BTreeMap<String, TokenRecord>>,
    embeds: RwLock<BTreeMap<String, EmbedRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn insert_token(&self, token: TokenRecord) -> Result<()> {
        self.tokens.write().insert(token.jti.clone(), token);
        Ok(())
    }

    fn get_token(&self, jti: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.read().get(jti).cloned())
    }

    fn list_tokens(&self) -> Result<Vec<TokenRecord>> {
        let mut tokens: Vec<TokenRecord> = self.tokens.read().values().cloned().collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    fn revoke_token(&self, jti: &str) -> Result<bool> {
        Ok(match self.tokens.write().get_mut(jti) {
            Some(token) => {
                token.revoked = true;
                true
            }
            None => false,
        })
    }

    fn revoke_token_prefix(&self, prefix: &str) -> Result<bool> {
        let mut tokens = self.tokens.write();
        let mut any = false;
        for token in tokens
            .range_mut(prefix.to_string()..)
            .take_while(|(jti, _)| jti.starts_with(prefix))
            .map(|(_, token)| token)
        {
            token.revoked = true;
            any = true;
        }
        Ok(any)
    }

    fn insert_embed(&self, embed: EmbedRecord) -> Result<()> {
        self.embeds.write().insert(embed.embed_id.clone(), embed);
        Ok(())
    }

    fn get_embed(&self, embed_id: &str) -> Result<Option<EmbedRecord>> {
        Ok(self.embeds.read().get(embed_id).cloned())
    }

    fn delete_embed(&self, embed_id: &str) -> Result<bool> {
        Ok(self.embeds.write().remove(embed_id).is_some())
    }

    fn list_embeds(&self) -> Result<Vec<EmbedRecord>> {
        let mut embeds: Vec<EmbedRecord> = self.embeds.read().values().cloned().collect();
        embeds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(embeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(jti: &str, created_at: i64) -> TokenRecord {
        TokenRecord {
            jti: jti.into(),
            roles: vec!["tts".into()],
            expires: created_at + 3600,
            created_by: "admin".into(),
            created_at,
            revoked: false,
            note: String::new(),
        }
    }

    #[test]
    fn test_insert_get_list() {
        let store = MemoryTokenStore::new();
        store.insert_token(token("aaa", 10)).unwrap();
        store.insert_token(token("bbb", 20)).unwrap();

        assert_eq!(store.get_token("aaa").unwrap().unwrap().created_at, 10);
        assert!(store.get_token("zzz").unwrap().is_none());

        let ids: Vec<String> = store.list_tokens().unwrap().into_iter().map(|t| t.jti).collect();
        assert_eq!(ids, vec!["bbb", "aaa"]);
    }

    #[test]
    fn test_revoke() {
        let store = MemoryTokenStore::new();
        store.insert_token(token("aaa", 10)).unwrap();
        assert!(store.get_token("aaa").unwrap().unwrap().is_active(100));

        assert!(store.revoke_token("aaa").unwrap());
        assert!(!store.revoke_token("missing").unwrap());
        assert!(!store.get_token("aaa").unwrap().unwrap().is_active(100));
    }

    #[test]
    fn test_revoke_prefix() {
        let store = MemoryTokenStore::new();
        store.insert_token(token("ab1", 1)).unwrap();
        store.insert_token(token("ab2", 2)).unwrap();
        store.insert_token(token("ac3", 3)).unwrap();

        assert!(store.revoke_token_prefix("ab").unwrap());
        assert!(!store.revoke_token_prefix("zz").unwrap());

        assert!(store.get_token("ab1").unwrap().unwrap().revoked);
        assert!(store.get_token("ab2").unwrap().unwrap().revoked);
        assert!(!store.get_token("ac3").unwrap().unwrap().revoked);
    }

    #[test]
    fn test_expiry() {
        assert!(!token("aaa", 10).is_active(10 + 3600));
    }

    #[test]
    fn test_embeds() {
        let store = MemoryTokenStore::new();
        store
            .insert_embed(EmbedRecord {
                embed_id: "e1".into(),
                jti: "aaa".into(),
                created_at: 5,
                note: "overlay".into(),
                origin: Some("https://example.com".into()),
            })
            .unwrap();

        assert_eq!(store.get_embed("e1").unwrap().unwrap().jti, "aaa");
        assert_eq!(store.list_embeds().unwrap().len(), 1);
        assert!(store.delete_embed("e1").unwrap());
        assert!(!store.delete_embed("e1").unwrap());
        assert!(store.list_embeds().unwrap().is_empty());
    }
}
