//! Text normalization for watermark matching.
//!
//! Watermark phrases show up with odd casing, non-breaking spaces, zero-width
//! joiners and compatibility glyphs (fullwidth letters, ligatures). Both sides
//! of a comparison go through the same normalization so a plain substring test
//! is enough afterwards.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse whitespace runs into one space.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Invisible characters that break up words without rendering anything.
const INVISIBLE_CHARS: &[char] = &[
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
    '\u{00AD}', // soft hyphen
];

/// Normalize text for case-insensitive substring matching.
///
/// - Applies NFKC so compatibility forms fold to their plain letters
/// - Drops invisible characters
/// - Lowercases
/// - Collapses whitespace runs to single spaces and trims
pub fn normalize_for_match(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .collect::<String>()
        .to_lowercase();

    WHITESPACE_COLLAPSE_REGEX
        .replace_all(&folded, " ")
        .trim()
        .to_string()
}

/// Decode a PDF text string into a Rust string, best effort.
///
/// UTF-16BE with a byte order mark is decoded as such; anything else is taken
/// byte-for-byte as Latin-1, which covers the standard and WinAnsi encodings
/// for the ASCII range watermark phrases live in.
pub fn decode_pdf_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_whitespace() {
        assert_eq!(normalize_for_match("  Made   with\tGAMMA "), "made with gamma");
        assert_eq!(normalize_for_match("Made\u{00A0}with\u{00A0}Gamma"), "made with gamma");
    }

    #[test]
    fn test_normalize_compatibility_forms() {
        // Fullwidth letters fold to ASCII under NFKC
        assert_eq!(normalize_for_match("ＧＡＭＭＡ"), "gamma");
    }

    #[test]
    fn test_normalize_drops_invisible_chars() {
        assert_eq!(normalize_for_match("Gam\u{200B}ma"), "gamma");
        assert_eq!(normalize_for_match("\u{FEFF}made with"), "made with");
    }

    #[test]
    fn test_decode_pdf_text() {
        assert_eq!(decode_pdf_text(b"Made with GAMMA"), "Made with GAMMA");
        assert_eq!(
            decode_pdf_text(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]),
            "Hi"
        );
        assert_eq!(decode_pdf_text(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }
}
