//! Text state tracking and glyph widths.
//!
//! Used to work out how far a removed text-showing operator would have moved
//! the pen, so text drawn after it on the same line stays where it was.

use crate::content::Operation;
use lopdf::{Dictionary, Document, Object};

/// Glyph width when a font carries no metrics at all (standard 14 fonts).
const DEFAULT_WIDTH: f64 = 500.0;

/// Default width of CID font glyphs.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// Widths of a font's glyphs, in thousandths of text space.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    first_char: u32,
    widths: Vec<f64>,
    missing_width: f64,
    two_byte: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            missing_width: DEFAULT_WIDTH,
            two_byte: false,
        }
    }
}

impl FontMetrics {
    /// Read `FirstChar`/`Widths` of a simple font, or the default width of
    /// a composite one.
    pub fn from_font(doc: &Document, font: &Dictionary) -> Self {
        if matches!(font.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Type0") {
            let default_width = descendant_font(doc, font)
                .and_then(|d| d.get(b"DW").ok().and_then(number))
                .unwrap_or(DEFAULT_CID_WIDTH);
            return Self {
                first_char: 0,
                widths: Vec::new(),
                missing_width: default_width,
                two_byte: true,
            };
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|w| resolve(doc, w))
            .and_then(|w| w.as_array().ok())
            .map(|items| items.iter().map(|w| resolve(doc, w).and_then(number).unwrap_or(0.0)).collect())
            .unwrap_or_default();
        let missing_width = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|d| resolve(doc, d))
            .and_then(|d| d.as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok().and_then(number))
            .unwrap_or(DEFAULT_WIDTH);

        Self {
            first_char,
            widths,
            missing_width,
            two_byte: false,
        }
    }

    fn width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .unwrap_or(self.missing_width)
    }

    /// Advance of a shown string, in thousandths of the font size.
    fn string_advance(&self, bytes: &[u8], state: &TextState) -> f64 {
        let spacing = |is_space: bool| {
            if state.size == 0.0 {
                return 0.0;
            }
            let word = if is_space { state.word_spacing } else { 0.0 };
            (state.char_spacing + word) * 1000.0 / state.size
        };

        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                    self.width(code) + spacing(false)
                })
                .sum()
        } else {
            bytes
                .iter()
                .map(|&b| self.width(u32::from(b)) + spacing(b == b' '))
                .sum()
        }
    }
}

/// Text state parameters in effect at an operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextState {
    pub font: Option<Vec<u8>>,
    pub size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
}

/// The text state in effect just before each operation runs.
///
/// Text state is part of the graphics state, so `q`/`Q` save and restore it.
pub fn text_states(operations: &[Operation]) -> Vec<TextState> {
    let mut states = Vec::with_capacity(operations.len());
    let mut current = TextState::default();
    let mut saved = Vec::new();

    for op in operations {
        states.push(current.clone());
        let arg = |i: usize| op.operands.get(i).and_then(number);
        match op.operator.as_str() {
            "q" => saved.push(current.clone()),
            "Q" => {
                if let Some(state) = saved.pop() {
                    current = state;
                }
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    current.font = Some(name.clone());
                }
                if let Some(size) = arg(1) {
                    current.size = size;
                }
            }
            "Tc" => current.char_spacing = arg(0).unwrap_or(current.char_spacing),
            "Tw" => current.word_spacing = arg(0).unwrap_or(current.word_spacing),
            "\"" => {
                current.word_spacing = arg(0).unwrap_or(current.word_spacing);
                current.char_spacing = arg(1).unwrap_or(current.char_spacing);
            }
            _ => {}
        }
    }
    states
}

/// How far a `Tj` or `TJ` moves the pen, in thousandths of the font size.
///
/// This is the value a `[-N] TJ` needs to produce the same move.
pub fn shown_advance(op: &Operation, state: &TextState, metrics: &FontMetrics) -> Option<f64> {
    match (op.operator.as_str(), op.operands.first()) {
        ("Tj", Some(Object::String(bytes, _))) => Some(metrics.string_advance(bytes, state)),
        ("TJ", Some(Object::Array(items))) => Some(
            items
                .iter()
                .map(|item| match item {
                    Object::String(bytes, _) => metrics.string_advance(bytes, state),
                    other => number(other).map(|n| -n).unwrap_or(0.0),
                })
                .sum(),
        ),
        _ => None,
    }
}

fn descendant_font<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    let descendants = resolve(doc, font.get(b"DescendantFonts").ok()?)?.as_array().ok()?;
    resolve(doc, descendants.first()?)?.as_dict().ok()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(n) => Some(*n as f64),
        Object::Real(n) => Some(f64::from(*n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_content;
    use lopdf::dictionary;

    fn widths_font(doc: &mut Document) -> Dictionary {
        let widths: Vec<Object> = (32..=126).map(|c| if c == 32 { 250.into() } else { 500.into() }).collect();
        let widths = doc.add_object(widths);
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => 32,
            "LastChar" => 126,
            "Widths" => widths,
        }
    }

    #[test]
    fn test_simple_font_widths() {
        let mut doc = Document::with_version("1.5");
        let font = widths_font(&mut doc);
        let metrics = FontMetrics::from_font(&doc, &font);

        let ops = parse_content(b"/F1 10 Tf (ab c) Tj").unwrap();
        let states = text_states(&ops);
        assert_eq!(shown_advance(&ops[1], &states[1], &metrics), Some(1750.0));
    }

    #[test]
    fn test_spacing_and_kerning() {
        let metrics = FontMetrics::default();
        let ops = parse_content(b"/F1 10 Tf 1 Tc 2 Tw [(a ) -300 (b)] TJ").unwrap();
        let states = text_states(&ops);
        let state = &states[3];
        assert_eq!(state.font.as_deref(), Some(b"F1".as_slice()));
        assert_eq!(state.char_spacing, 1.0);

        // Three glyphs at 500, 100 per glyph of Tc, 200 of Tw on the space, 300 of kerning
        assert_eq!(shown_advance(&ops[3], state, &metrics), Some(1500.0 + 300.0 + 200.0 + 300.0));
    }

    #[test]
    fn test_state_restored_by_q() {
        let ops = parse_content(b"/F1 10 Tf q /F2 20 Tf Q (x) Tj").unwrap();
        let states = text_states(&ops);
        assert_eq!(states[3].font.as_deref(), Some(b"F2".as_slice()));
        assert_eq!(states[4].font.as_deref(), Some(b"F1".as_slice()));
        assert_eq!(states[4].size, 10.0);
    }

    #[test]
    fn test_composite_font_default_width() {
        let mut doc = Document::with_version("1.5");
        let cid = doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "CIDFontType2", "DW" => 600 });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Reference(cid)],
        };
        let metrics = FontMetrics::from_font(&doc, &font);

        let ops = parse_content(b"<00410042> Tj").unwrap();
        let state = TextState { size: 12.0, ..TextState::default() };
        assert_eq!(shown_advance(&ops[0], &state, &metrics), Some(1200.0));
    }
}
