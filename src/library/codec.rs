//! Title <-> filename token mapping for cached media files.
//!
//! Cached files are named `<id>_<token>.<ext>`. Files from before ids were
//! recorded are named `<token>.<ext>` and parse with `id = None`.

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a sanitized title token.
pub const MAX_TOKEN_LEN: usize = 120;

/// Replaces whitespace inside a token.
pub const SEPARATOR: char = '_';

/// Canonical upstream ids are 11 characters; tried before the loose form.
static CANONICAL_ID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_-]{11})_(.+)$").expect("valid regex"));

static LOOSE_ID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_-]{6,}?)_(.+)$").expect("valid regex"));

/// Identity recovered from a cached filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub id: Option<String>,
    pub title_san: String,
    pub title: String,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '_' | '-' | '.' | '(' | ')' | '&' | ',' | '\'' | '[' | ']')
}

/// Maps a human title to a filesystem-safe token.
///
/// Deterministic but not injective: distinct titles may share a token.
pub fn sanitize(title: &str) -> String {
    let kept: String = title
        .nfkd()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| is_token_char(*c))
        .collect();

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
        .chars()
        .take(MAX_TOKEN_LEN)
        .collect()
}

/// Reverses the separator substitution. Lossy: stripped punctuation stays gone.
pub fn unsanitize(token: &str) -> String {
    token.replace(SEPARATOR, " ").trim().to_string()
}

/// Recovers `(id, titleSan, title)` from a cached file name such as
/// `dQw4w9WgXcQ_Never_Gonna_Give_You_Up.mp3`.
pub fn parse_filename(file_name: &str) -> ParsedName {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let captures = CANONICAL_ID_NAME
        .captures(stem)
        .or_else(|| LOOSE_ID_NAME.captures(stem));

    match captures {
        Some(caps) => {
            let title_san = caps[2].to_string();
            ParsedName {
                id: Some(caps[1].to_string()),
                title: unsanitize(&title_san),
                title_san,
            }
        }
        None => ParsedName {
            id: None,
            title_san: stem.to_string(),
            title: unsanitize(stem),
        },
    }
}

/// File name for a track with a known id.
pub fn cache_file_name(id: &str, title_san: &str, ext: &str) -> String {
    format!("{id}_{title_san}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_illegal_and_collapses_whitespace() {
        assert_eq!(sanitize("My Song: Part 1"), "My_Song_Part_1");
        assert_eq!(sanitize("  AC/DC  -  T.N.T.  "), "ACDC_-_T.N.T.");
        assert_eq!(sanitize("What?  <Live>"), "What_Live");
    }

    #[test]
    fn sanitize_folds_accents() {
        assert_eq!(sanitize("Beyoncé – Déjà Vu"), "Beyonce_Deja_Vu");
    }

    #[test]
    fn sanitize_truncates() {
        let long = "a".repeat(500);
        assert_eq!(sanitize(&long).len(), MAX_TOKEN_LEN);
    }

    #[test]
    fn sanitize_collisions_are_accepted() {
        assert_eq!(sanitize("Song?"), sanitize("Song"));
    }

    #[test]
    fn parse_recovers_id_and_token() {
        let token = sanitize("My Song: Part 1");
        let name = cache_file_name("dQw4w9WgXcQ", &token, "mp3");
        let parsed = parse_filename(&name);

        assert_eq!(parsed.id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(parsed.title_san, token);
        assert_eq!(parsed.title, "My Song Part 1");
    }

    #[test]
    fn parse_handles_ids_with_separators() {
        let parsed = parse_filename("a_b-c_d_e_f_Title_Here.mp3");
        assert_eq!(parsed.id.as_deref(), Some("a_b-c_d_e_f"));
        assert_eq!(parsed.title_san, "Title_Here");
    }

    #[test]
    fn parse_short_ids() {
        let parsed = parse_filename("abcdef_Short.mp3");
        assert_eq!(parsed.id.as_deref(), Some("abcdef"));
        assert_eq!(parsed.title, "Short");
    }

    #[test]
    fn parse_legacy_name_has_no_id() {
        let parsed = parse_filename("Some Legacy Title.mp3");
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.title_san, "Some Legacy Title");
        assert_eq!(parsed.title, "Some Legacy Title");
    }
}
