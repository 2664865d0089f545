//! Obfuscation-tolerant blocklist rules

use crate::Result;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Filler allowed between two matched characters
const GLUE: &str = "[^a-zA-Z0-9]{0,2}";

/// Character class for a letter and its common leetspeak substitutes
fn leet_class(ch: char) -> Option<&'static str> {
    Some(match ch {
        'a' => "[a@4]",
        'b' => "[b8]",
        'e' => "[e3]",
        'i' => "[i1!|]",
        'l' => "[l1|]",
        'o' => "[o0]",
        's' => "[s5$]",
        't' => "[t7]",
        'g' => "[g9]",
        'z' => "[z2]",
        _ => return None,
    })
}

/// NFKD-decompose, drop combining marks, lowercase
pub fn fold_term(term: &str) -> String {
    term.to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Mask all but the first and last character
///
/// Two characters or fewer become all asterisks.
pub fn mask_token(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let mut out = String::with_capacity(src.len());
    out.push(chars[0]);
    out.push_str(&"*".repeat(chars.len() - 2));
    out.push(chars[chars.len() - 1]);
    out
}

/// One compiled blocklist term
#[derive(Debug, Clone)]
pub struct ModerationRule {
    term: String,
    regex: Regex,
}

impl ModerationRule {
    pub fn compile(term: &str) -> Result<Self> {
        let folded = fold_term(term);
        let parts: Vec<String> = folded
            .chars()
            .map(|ch| match leet_class(ch) {
                Some(class) => class.to_string(),
                None => regex::escape(&ch.to_string()),
            })
            .collect();

        let pattern = format!("(?i){}", parts.join(GLUE));
        Ok(Self {
            term: term.to_string(),
            regex: Regex::new(&pattern)?,
        })
    }

    /// The blocklist line this rule was built from
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Replace every match with `replace(matched)`, counting matches into `count`
    pub fn replace_all<F>(&self, text: &str, count: &mut usize, mut replace: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        self.regex
            .replace_all(text, |caps: &regex::Captures| {
                *count += 1;
                replace(&caps[0])
            })
            .into_owned()
    }
}
