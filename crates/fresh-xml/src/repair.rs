//! Byte-level cleanup for exports that are not quite well-formed.

use quick_xml::escape::resolve_html5_entity;

const PREDEFINED: [&[u8]; 5] = [b"amp", b"lt", b"gt", b"quot", b"apos"];

/// Make an export parseable without touching its markup:
///
/// - the five predefined entities and character references to characters
///   XML allows are kept;
/// - HTML named entities (`&eacute;`, `&nbsp;`, ...) become the characters
///   they stand for;
/// - character references to forbidden characters are dropped;
/// - any other `&` is escaped as `&amp;`;
/// - control bytes XML 1.0 forbids are dropped. Tab, line feed and
///   carriage return are kept.
pub fn repair_bytes(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut idx = 0;
    while idx < input.len() {
        let byte = input[idx];
        match byte {
            b'&' => match reference_at(&input[idx..]) {
                Some((len, replacement)) => {
                    out.extend_from_slice(&replacement);
                    idx += len;
                    continue;
                }
                None => out.extend_from_slice(b"&amp;"),
            },
            0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F => {}
            other => out.push(other),
        }
        idx += 1;
    }
    out
}

/// Length of the reference starting at `rest[0]` and the bytes to emit for
/// it, or `None` when the `&` does not start a usable reference.
fn reference_at(rest: &[u8]) -> Option<(usize, Vec<u8>)> {
    let body = rest.strip_prefix(b"&")?;
    let end = body.iter().take(40).position(|b| *b == b';')?;
    let name = &body[..end];
    let len = end + 2;
    let whole = &rest[..len];

    if let Some(number) = name.strip_prefix(b"#") {
        let code = character_code(number)?;
        return Some(match char::from_u32(code).filter(|ch| is_xml_char(*ch)) {
            Some(_) => (len, whole.to_vec()),
            None => (len, Vec::new()),
        });
    }
    if PREDEFINED.contains(&name) {
        return Some((len, whole.to_vec()));
    }
    let name = std::str::from_utf8(name).ok()?;
    let resolved = resolve_html5_entity(name)?;
    Some((len, escape_markup(resolved).into_bytes()))
}

fn character_code(number: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(number).ok()?;
    match text.strip_prefix(['x', 'X']) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u32::from_str_radix(hex, 16).ok()
        }
        Some(_) => None,
        None if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => text.parse().ok(),
        None => None,
    }
}

/// Characters allowed by the XML 1.0 `Char` production.
fn is_xml_char(ch: char) -> bool {
    matches!(ch,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
