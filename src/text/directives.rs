//! In-text control directives
//!
//! Three directives are recognised, in this order:
//! - `alias: text` switches to the voice an alias points at,
//! - `[preset] text` selects a named parameter preset,
//! - `[fast]` / `[slow]` anywhere scales the length of the utterance.

use super::collapse_whitespace;
use crate::config::Preset;
use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref SPEED_REGEX: Regex = Regex::new(r"(?i)\[(fast|slow)\]").unwrap();
}

/// Length-scale multiplier for `[fast]`
pub const FAST_MULTIPLIER: f32 = 0.5;
/// Length-scale multiplier for `[slow]`
pub const SLOW_MULTIPLIER: f32 = 2.0;

/// Clean text and the parameters its directives selected
#[derive(Debug, Clone, PartialEq)]
pub struct Directives {
    pub text: String,
    /// Voice id from an alias prefix
    pub alias_voice: Option<String>,
    /// Preset name from a bracketed prefix
    pub preset: Option<String>,
    /// Length-scale multiplier, 1.0 without a speed tag
    pub speed: f32,
}

/// Strip all directives from `text`
///
/// Alias and preset names are matched case-insensitively; the tables are
/// expected to hold lowercase keys.
pub fn parse_directives(
    text: &str,
    aliases: &BTreeMap<String, String>,
    presets: &BTreeMap<String, Preset>,
) -> Result<Directives> {
    let (alias_voice, rest) = split_alias_prefix(text, aliases);
    let (preset, rest) = split_preset_prefix(rest, presets);
    let (clean, speed) = take_speed_tag(rest);

    if clean.is_empty() {
        return Err(Error::EmptyText);
    }

    Ok(Directives {
        text: clean,
        alias_voice,
        preset,
        speed,
    })
}

/// `name:rest` where `name` is a known alias
pub fn split_alias_prefix<'a>(
    text: &'a str,
    aliases: &BTreeMap<String, String>,
) -> (Option<String>, &'a str) {
    if let Some((head, tail)) = text.split_once(':') {
        let name = head.trim().to_lowercase();
        if let Some(voice) = aliases.get(&name) {
            return (Some(voice.clone()), tail.trim());
        }
    }
    (None, text)
}

/// `[tag]rest` where `tag` is a known preset
pub fn split_preset_prefix<'a>(
    text: &'a str,
    presets: &BTreeMap<String, Preset>,
) -> (Option<String>, &'a str) {
    if let Some(body) = text.strip_prefix('[') {
        if let Some((tag, rest)) = body.split_once(']') {
            let tag = tag.trim().to_lowercase();
            if presets.contains_key(&tag) {
                return (Some(tag), rest.trim());
            }
        }
    }
    (None, text)
}

/// Remove the first `[fast]`/`[slow]` tag and return its multiplier
pub fn take_speed_tag(text: &str) -> (String, f32) {
    let Some(caps) = SPEED_REGEX.captures(text) else {
        return (collapse_whitespace(text), 1.0);
    };

    let multiplier = if caps[1].eq_ignore_ascii_case("fast") {
        FAST_MULTIPLIER
    } else {
        SLOW_MULTIPLIER
    };

    let m = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    let joined = format!("{} {}", &text[..m.start], &text[m.end..]);
    (collapse_whitespace(&joined), multiplier)
}

/// Apply a speed multiplier to the resolved base length scale
///
/// Without a speed tag the base passes through untouched, so an unset
/// value stays unset and the engine default applies.
pub fn resolve_length_scale(base: Option<f32>, speed: f32) -> Option<f32> {
    if speed == 1.0 {
        base
    } else {
        Some(base.unwrap_or(1.0) * speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (BTreeMap<String, String>, BTreeMap<String, Preset>) {
        let mut aliases = BTreeMap::new();
        aliases.insert("bob".to_string(), "en_US-ryan-high".to_string());
        let mut presets = BTreeMap::new();
        presets.insert(
            "calm".to_string(),
            Preset {
                length_scale: Some(1.5),
                ..Default::default()
            },
        );
        (aliases, presets)
    }

    #[test]
    fn test_speed_fast() {
        let (aliases, presets) = tables();
        let d = parse_directives("hello [fast] world", &aliases, &presets).unwrap();
        assert_eq!(d.text, "hello world");
        assert_eq!(d.speed, 0.5);
        assert_eq!(resolve_length_scale(None, d.speed), Some(0.5));
    }

    #[test]
    fn test_speed_slow_case_insensitive() {
        let (text, speed) = take_speed_tag("[SLOW] take it easy");
        assert_eq!(text, "take it easy");
        assert_eq!(speed, 2.0);
        assert_eq!(resolve_length_scale(None, speed), Some(2.0));
    }

    #[test]
    fn test_no_speed_keeps_base() {
        assert_eq!(resolve_length_scale(None, 1.0), None);
        assert_eq!(resolve_length_scale(Some(1.2), 1.0), Some(1.2));
        assert_eq!(resolve_length_scale(Some(1.5), 2.0), Some(3.0));
    }

    #[test]
    fn test_alias_prefix() {
        let (aliases, presets) = tables();
        let d = parse_directives("Bob: good morning", &aliases, &presets).unwrap();
        assert_eq!(d.alias_voice.as_deref(), Some("en_US-ryan-high"));
        assert_eq!(d.text, "good morning");
    }

    #[test]
    fn test_unknown_alias_passes_through() {
        let (aliases, presets) = tables();
        let d = parse_directives("note: this stays", &aliases, &presets).unwrap();
        assert_eq!(d.alias_voice, None);
        assert_eq!(d.text, "note: this stays");
    }

    #[test]
    fn test_alias_then_preset() {
        let (aliases, presets) = tables();
        let d = parse_directives("bob: [Calm] breathe [slow]", &aliases, &presets).unwrap();
        assert_eq!(d.alias_voice.as_deref(), Some("en_US-ryan-high"));
        assert_eq!(d.preset.as_deref(), Some("calm"));
        assert_eq!(d.text, "breathe");
        assert_eq!(d.speed, 2.0);
    }

    #[test]
    fn test_unknown_preset_passes_through() {
        let (aliases, presets) = tables();
        let d = parse_directives("[loud] hey", &aliases, &presets).unwrap();
        assert_eq!(d.preset, None);
        assert_eq!(d.text, "[loud] hey");
    }

    #[test]
    fn test_only_directives_is_empty() {
        let (aliases, presets) = tables();
        assert!(matches!(
            parse_directives("bob: [calm] [fast]", &aliases, &presets),
            Err(Error::EmptyText)
        ));
    }
}
