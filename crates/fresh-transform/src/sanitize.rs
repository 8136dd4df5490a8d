//! Value cleanup and comparison forms.
//!
//! [`sanitize`] produces text that can be stored directly as element text
//! (escaped wire form). [`canonical_match_form`] produces a comparison key
//! that ignores entity spelling, compatibility characters and quote glyphs.

use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity};
use unicode_normalization::UnicodeNormalization;

/// Spreadsheet export artifact standing for a carriage return.
const CARRIAGE_RETURN_ARTIFACT: &str = "_x000D_";

/// Longest entity name considered when decoding.
const MAX_ENTITY_LEN: usize = 32;

/// Clean a raw value for insertion as element text.
///
/// References are decoded first (predefined, HTML and numeric; anything
/// else stays literal). Line breaks, tabs and `_x000D_` artifacts become
/// spaces, characters XML forbids are dropped, `&`, `<` and `>` are escaped,
/// whitespace runs collapse and the ends are trimmed. The result contains
/// no references other than `&amp;`, `&lt;` and `&gt;`.
pub fn sanitize(value: &str) -> String {
    let decoded = decode_entities(value);
    let mut cleaned = String::with_capacity(decoded.len());
    for ch in decoded.chars() {
        match ch {
            '\r' | '\n' | '\t' => cleaned.push(' '),
            c if is_stripped(c) => {}
            c => cleaned.push(c),
        }
    }
    let cleaned = cleaned.replace(CARRIAGE_RETURN_ARTIFACT, " ");
    collapse_whitespace(&escape_markup(&cleaned))
}

/// Comparison key used when looking up values.
pub fn canonical_match_form(value: &str) -> String {
    let decoded = decode_entities(value);
    let folded: String = decoded
        .nfkc()
        .map(|ch| match ch {
            '\u{00A0}' | '\u{202F}' | '\u{2007}' => ' ',
            c if is_quote_glyph(c) => '\'',
            c => c,
        })
        .collect();
    collapse_whitespace(&folded)
}

/// Whether a sanitized value is worth writing: non-blank and containing at
/// least one word character once entities are decoded.
pub fn is_significant(value: &str) -> bool {
    let decoded = decode_entities(value);
    !decoded.trim().is_empty()
        && decoded
            .chars()
            .any(|ch| ch.is_alphanumeric() || ch == '_')
}

/// Prefix bare names with `//`; absolute and relative paths are kept.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') || trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!("//{trimmed}")
    }
}

/// Split a write target into `(parent path, new tag)`.
///
/// Trailing slashes are stripped first. Returns `None` when no tag name can
/// be extracted.
pub fn split_target_path(raw: &str) -> Option<(String, String)> {
    let normalized = normalize_path(raw);
    let path = normalized.trim_end_matches('/');
    let (parent, tag) = match path.rsplit_once('/') {
        Some((parent, tag)) => (parent, tag),
        None => (".", path),
    };
    let valid = !tag.is_empty()
        && !tag.contains('[')
        && tag
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':'))
        && tag != "."
        && tag != "..";
    if !valid {
        return None;
    }
    let parent = match parent {
        // `//Tag` leaves "/" which addresses nothing; the engine then falls
        // back to the document root.
        "" => "/",
        other => other,
    };
    Some((parent.to_string(), tag.to_string()))
}

fn is_stripped(ch: char) -> bool {
    matches!(
        ch,
        '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}'
    )
}

fn is_quote_glyph(ch: char) -> bool {
    matches!(
        ch,
        '"' | '`'
            | '\u{00B4}'
            | '\u{02B9}'
            | '\u{02BB}'
            | '\u{02BC}'
            | '\u{2018}'
            | '\u{2019}'
            | '\u{201A}'
            | '\u{201B}'
            | '\u{201C}'
            | '\u{201D}'
            | '\u{201E}'
            | '\u{201F}'
            | '\u{2032}'
            | '\u{2033}'
            | '\u{FF07}'
    )
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_markup(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Decode predefined, HTML and numeric references in one pass. Anything
/// that is not a known reference, including a bare `&`, is kept literally;
/// numeric references to characters that do not exist are dropped.
pub fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match decode_reference(rest) {
            Some((len, decoded)) => {
                if let Some(text) = decoded {
                    out.push_str(&text);
                }
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Reference at the start of `rest`: its byte length and replacement text.
fn decode_reference(rest: &str) -> Option<(usize, Option<String>)> {
    let body = rest.strip_prefix('&')?;
    let end = body
        .char_indices()
        .take(MAX_ENTITY_LEN)
        .find(|(_, ch)| *ch == ';')
        .map(|(idx, _)| idx)?;
    let name = &body[..end];
    let len = end + 2;
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
            Some(_) => return None,
            None if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) => {
                number.parse().ok()?
            }
            None => return None,
        };
        return Some((len, char::from_u32(code).map(String::from)));
    }
    resolve_predefined_entity(name)
        .or_else(|| resolve_html5_entity(name))
        .map(|text| (len, Some(text.to_string())))
}
