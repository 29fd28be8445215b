//! Free-text canonicalization for cover matching and provider queries.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical matching form: typographic characters folded to ASCII, known
/// non-Latin letters transliterated, combining marks stripped, trailing
/// punctuation removed, whitespace collapsed, lower-cased. Idempotent.
pub fn normalize(text: &str) -> String {
    let folded = fold_ascii(text);
    let stripped = strip_trailing_punctuation(&folded);
    collapse_whitespace(&stripped).to_lowercase()
}

/// ASCII-folds without lower-casing or punctuation stripping. Used to build
/// the fallback search query for providers with ASCII-biased indexes.
pub fn fold_ascii(text: &str) -> String {
    let mut replaced = String::with_capacity(text.len());
    for ch in text.chars() {
        if let Some(ascii) = typographic_ascii(ch) {
            replaced.push_str(ascii);
        } else if let Some(ascii) = transliterate(ch) {
            replaced.push_str(ascii);
        } else {
            replaced.push(ch);
        }
    }
    replaced
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect()
}

/// Keeps letters, digits, whitespace, and `:'&.,()-` for provider search
/// terms. No transliteration, so accented letters survive into the query.
pub fn strip_for_query(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|ch| {
            ch.is_alphanumeric()
                || ch.is_whitespace()
                || matches!(ch, ':' | '\'' | '&' | '.' | ',' | '(' | ')' | '-')
        })
        .collect();
    collapse_whitespace(&kept)
}

fn typographic_ascii(ch: char) -> Option<&'static str> {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => Some("'"),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => Some("\""),
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => Some("-"),
        '\u{2026}' => Some("..."),
        _ => None,
    }
}

fn transliterate(ch: char) -> Option<&'static str> {
    match ch {
        'Æ' => Some("AE"),
        'æ' => Some("ae"),
        'Ø' => Some("O"),
        'ø' => Some("o"),
        'ẞ' => Some("SS"),
        'ß' => Some("ss"),
        'Œ' => Some("OE"),
        'œ' => Some("oe"),
        'Đ' | 'Ð' => Some("D"),
        'đ' | 'ð' => Some("d"),
        'Þ' => Some("Th"),
        'þ' => Some("th"),
        'Ł' => Some("L"),
        'ł' => Some("l"),
        _ => None,
    }
}

fn strip_trailing_punctuation(value: &str) -> String {
    value
        .trim_end_matches(|ch: char| {
            ch.is_whitespace()
                || matches!(ch, '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '-')
        })
        .to_string()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
