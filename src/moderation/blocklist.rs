//! Hot-reloaded blocklist
//!
//! The file is re-read whenever its modification time differs from the one
//! seen at the last load. A rebuilt rule set replaces the old one in a single
//! swap, so a concurrent matcher sees either the old list or the new one.

use super::rules::ModerationRule;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Rules compiled from one version of the blocklist file
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: Vec<ModerationRule>,
    mtime: Option<SystemTime>,
}

impl RuleSet {
    pub fn terms(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.term().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug)]
pub struct Blocklist {
    path: Option<PathBuf>,
    current: RwLock<Arc<RuleSet>>,
}

impl Blocklist {
    pub fn new(path: Option<PathBuf>) -> Self {
        let blocklist = Self {
            path,
            current: RwLock::new(Arc::new(RuleSet::default())),
        };
        blocklist.reload();
        blocklist
    }

    /// Blocklist with no backing file and no rules
    pub fn empty() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current rules, reloading first if the file changed
    pub fn rules(&self) -> Arc<RuleSet> {
        self.ensure_fresh();
        self.current.read().clone()
    }

    /// Raw terms of the current rule list
    pub fn terms(&self) -> Vec<String> {
        self.rules().terms()
    }

    /// Rebuild from the file unconditionally
    pub fn reload(&self) -> usize {
        let fresh = Arc::new(self.build());
        let count = fresh.rules.len();
        *self.current.write() = fresh;
        count
    }

    fn ensure_fresh(&self) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let mtime = modified(path);
        if self.current.read().mtime == mtime {
            return;
        }

        let fresh = Arc::new(self.build());
        let mut current = self.current.write();
        // Another caller may have swapped in this version meanwhile
        if current.mtime != fresh.mtime {
            log::info!(
                "Blocklist {} reloaded: {} rules",
                path.display(),
                fresh.rules.len()
            );
            *current = fresh;
        }
    }

    fn build(&self) -> RuleSet {
        let Some(path) = self.path.as_deref() else {
            return RuleSet::default();
        };

        let mtime = modified(path);
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                if path.exists() {
                    log::warn!("Failed to read blocklist {}: {}", path.display(), e);
                }
                return RuleSet {
                    rules: Vec::new(),
                    mtime,
                };
            }
        };

        let rules = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|term| match ModerationRule::compile(term) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    log::warn!("Skipping blocklist term '{}': {}", term, e);
                    None
                }
            })
            .collect();

        RuleSet { rules, mtime }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
