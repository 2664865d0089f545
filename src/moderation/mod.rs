//! Content moderation
//!
//! Two layers run in order over the request text:
//! 1. general normalization: links become `[link]`, emoji are removed;
//! 2. blocklist enforcement: every rule, in file order, masks or drops its
//!    matches. Rules tolerate leetspeak, diacritics and short filler runs.

mod blocklist;
mod emoji;
mod rules;

pub use blocklist::{Blocklist, RuleSet};
pub use emoji::EmojiTable;
pub use rules::{fold_term, mask_token, ModerationRule};

use crate::config::ModerationConfig;
use crate::text::collapse_whitespace;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r"(?i)(https?://\S+|www\.\S+)").unwrap();
}

/// Replacement for links
pub const LINK_PLACEHOLDER: &str = "[link]";

/// What happens to a blocklisted match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModerationMode {
    /// Keep first and last character, asterisk the rest
    Mask,
    /// Remove the match and collapse the whitespace left behind
    #[default]
    Drop,
}

/// What each moderation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModerationFlags {
    /// 1 when at least one link was replaced
    pub urls: u32,
    /// 1 when at least one emoji was removed
    pub emojis: u32,
    /// Number of blocklist matches
    pub slurs: u32,
}

#[derive(Debug)]
pub struct Moderator {
    strip_urls: bool,
    strip_emojis: bool,
    censor_slurs: bool,
    emoji: Cow<'static, EmojiTable>,
    blocklist: Blocklist,
}

impl Moderator {
    pub fn new(config: &ModerationConfig) -> Result<Self> {
        let emoji = match &config.emoji_data_path {
            Some(path) => Cow::Owned(EmojiTable::load(path)?),
            None => Cow::Borrowed(EmojiTable::bundled()),
        };

        let blocklist = Blocklist::new(config.blocklist_path.clone());
        log::info!(
            "Moderation ready: {} emoji ranges, {} blocklist rules",
            emoji.range_count(),
            blocklist.rules().rules.len()
        );

        Ok(Self {
            strip_urls: config.strip_urls,
            strip_emojis: config.strip_emojis,
            censor_slurs: config.censor_slurs,
            emoji,
            blocklist,
        })
    }

    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }

    /// Moderate `text`, returning the trimmed result and per-pass flags
    pub fn filter(&self, text: &str, mode: ModerationMode) -> (String, ModerationFlags) {
        let mut flags = ModerationFlags::default();
        let mut out = text.to_string();

        if self.strip_urls {
            let replaced = URL_REGEX.replace_all(&out, LINK_PLACEHOLDER);
            if let Cow::Owned(s) = replaced {
                if s != out {
                    flags.urls = 1;
                }
                out = s;
            }
        }

        if self.strip_emojis {
            let (stripped, removed) = self.emoji.strip(&out);
            if removed > 0 {
                flags.emojis = 1;
            }
            out = stripped;
        }

        if self.censor_slurs {
            let (censored, count) = censor(&self.blocklist.rules(), &out, mode);
            flags.slurs = count as u32;
            out = censored;
        }

        (out.trim().to_string(), flags)
    }
}

/// Apply every rule in order
pub fn censor(rules: &RuleSet, text: &str, mode: ModerationMode) -> (String, usize) {
    let mut count = 0;
    let mut out = text.to_string();

    for rule in &rules.rules {
        out = match mode {
            ModerationMode::Mask => rule.replace_all(&out, &mut count, mask_token),
            ModerationMode::Drop => rule.replace_all(&out, &mut count, |_| String::new()),
        };
    }

    if mode == ModerationMode::Drop && count > 0 {
        out = collapse_whitespace(&out);
    }

    (out, count)
}
