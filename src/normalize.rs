//! Free-text field cleanup
//!
//! Two passes run on every description (and title, when enabled):
//!
//! 1. [`repair_encoding`] undoes UTF-8 text that was decoded as Latin-1 somewhere
//!    upstream, then applies NFKC and decodes HTML entities.
//! 2. [`clean_text`] normalizes line endings and whitespace and drops gender
//!    markers such as `(H/F)` and repeated punctuation left behind by them.

use encoding_rs::WINDOWS_1252;
use unicode_normalization::UnicodeNormalization;

/// `é` encoded as UTF-8 then read back as Latin-1
const MOJIBAKE_MARKER: &str = "Ã©";

/// Decoration character stripped from every token
pub const NOISE_CHAR: char = '*';

/// Token signatures (letters and digits, lowercased) of gender markers
const GENDER_MARKERS: &[&str] = &["hf", "fh", "mf", "fm", "hfx", "fhx"];

/// Repair, then clean, one free-text value
pub fn normalize(text: &str) -> String {
    clean_text(&repair_encoding(text))
}

/// Fix double-encoded text, apply NFKC and decode HTML entities
///
/// Re-encoding is only attempted when the text contains the `Ã©` marker. When it
/// cannot be undone the text goes on unchanged to the later steps.
pub fn repair_encoding(text: &str) -> String {
    let repaired = if text.contains(MOJIBAKE_MARKER) {
        match undo_latin1_decoding(text) {
            Some(fixed) => fixed,
            None => {
                tracing::debug!("mojibake marker present but text is not re-encodable, keeping it");
                text.to_string()
            }
        }
    } else {
        text.to_string()
    };
    let composed: String = repaired.nfkc().collect();
    html_escape::decode_html_entities(&composed).into_owned()
}

/// Map every char back to the single byte it was decoded from and read the bytes as UTF-8
fn undo_latin1_decoding(text: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => bytes.push(byte),
            // punctuation such as `€` or `™` comes from the Windows-1252 range 0x80..0xA0
            Err(_) => {
                let (encoded, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
                if unmappable || encoded.len() != 1 {
                    return None;
                }
                bytes.push(encoded[0]);
            }
        }
    }
    String::from_utf8(bytes).ok()
}

/// Normalize line endings, clean each line and squeeze blank lines
///
/// Runs of blank lines become one blank line; leading and trailing blank lines are
/// dropped. Applying it twice gives the same result as applying it once.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = Vec::new();
    let mut pending_blank = false;
    for line in text.split('\n') {
        let line = clean_line(line);
        if line.is_empty() {
            pending_blank = !lines.is_empty();
            continue;
        }
        if pending_blank {
            lines.push(String::new());
            pending_blank = false;
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Clean the tokens of a single line and rejoin them with single spaces
///
/// A token is dropped when it is empty once [`NOISE_CHAR`] is removed, when it is a
/// gender marker, or when it has no letter or digit and repeats the previous kept token.
pub fn clean_line(line: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    for token in line.split_whitespace() {
        let token: String = token.chars().filter(|&c| c != NOISE_CHAR).collect();
        if token.is_empty() {
            continue;
        }
        let signature = signature(&token);
        if GENDER_MARKERS.contains(&signature.as_str()) {
            continue;
        }
        if signature.is_empty() && kept.last() == Some(&token) {
            continue;
        }
        kept.push(token);
    }
    kept.join(" ")
}

fn signature(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
