//! Emoji code-point table
//!
//! Parsed from the Unicode `emoji-data.txt` layout: one code point or an
//! inclusive `A..B` range per line, `;` separated properties, `#` comments.

use crate::{Error, Result};
use lazy_static::lazy_static;
use std::path::Path;

const BUNDLED: &str = include_str!("../../assets/emoji-data.txt");

lazy_static! {
    static ref BUNDLED_TABLE: EmojiTable = EmojiTable::parse(BUNDLED).unwrap_or_default();
}

/// Sorted, non-overlapping inclusive code-point ranges
#[derive(Debug, Clone, Default)]
pub struct EmojiTable {
    ranges: Vec<(u32, u32)>,
}

impl EmojiTable {
    /// Table compiled into the binary
    pub fn bundled() -> &'static EmojiTable {
        &BUNDLED_TABLE
    }

    /// Load a table from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut ranges = Vec::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let code = line.split(';').next().unwrap_or("").trim();
            // Sequences are never a single code point
            if code.contains(' ') {
                continue;
            }

            let parse = |hex: &str| {
                u32::from_str_radix(hex.trim(), 16).map_err(|e| {
                    Error::Moderation(format!("emoji table line {}: {}", lineno + 1, e))
                })
            };

            let (lo, hi) = match code.split_once("..") {
                Some((a, b)) => (parse(a)?, parse(b)?),
                None => {
                    let cp = parse(code)?;
                    (cp, cp)
                }
            };

            // ASCII stays speakable even where upstream marks it Emoji
            let lo = lo.max(0x80);
            if lo <= hi {
                ranges.push((lo, hi));
            }
        }

        ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (lo, hi) in ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        Ok(Self { ranges: merged })
    }

    pub fn contains(&self, ch: char) -> bool {
        let cp = ch as u32;
        let idx = self.ranges.partition_point(|&(_, hi)| hi < cp);
        self.ranges.get(idx).is_some_and(|&(lo, _)| lo <= cp)
    }

    /// Remove every emoji character, returning the text and how many were removed
    pub fn strip(&self, text: &str) -> (String, usize) {
        let mut removed = 0;
        let out = text
            .chars()
            .filter(|&c| {
                let hit = self.contains(c);
                if hit {
                    removed += 1;
                }
                !hit
            })
            .collect();
        (out, removed)
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points_and_ranges() {
        let table = EmojiTable::parse(
            "# comment\n\n1F600..1F602 ; Emoji # grinning\n2764 ; Emoji\n1F1E6 1F1E8 ; RGI_Emoji_Flag_Sequence\n",
        )
        .unwrap();
        assert!(table.contains('\u{1F600}'));
        assert!(table.contains('\u{1F602}'));
        assert!(!table.contains('\u{1F603}'));
        assert!(table.contains('\u{2764}'));
        assert_eq!(table.range_count(), 2);
    }

    #[test]
    fn test_ascii_never_emoji() {
        let table = EmojiTable::parse("0023 ; Emoji\n0030..0039 ; Emoji\n00A9 ; Emoji\n").unwrap();
        assert!(!table.contains('#'));
        assert!(!table.contains('7'));
        assert!(table.contains('©'));
    }

    #[test]
    fn test_bundled_strip() {
        let (out, removed) = EmojiTable::bundled().strip("hi 😀 there 🚀! 42 #1");
        assert_eq!(out, "hi  there ! 42 #1");
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_bad_line() {
        assert!(matches!(
            EmojiTable::parse("ZZZZ ; Emoji\n"),
            Err(Error::Moderation(_))
        ));
    }
}
