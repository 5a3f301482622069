// src/pdf/fonts.rs
use std::collections::HashMap;

use lopdf::{Dictionary, Document, Encoding, Object};

// Glyph-space defaults (thousandths of an em) when the font dictionary is silent.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;
const DEFAULT_ASCENT: f32 = 800.0;
const DEFAULT_DESCENT: f32 = -200.0;

/// Decoding and metrics for one font resource on a page.
pub struct FontInfo<'a> {
    encoding: Option<Encoding<'a>>,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    pub ascent: f32,  // em fraction above the baseline
    pub descent: f32, // em fraction below the baseline, negative
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    doc.dereference(object).ok().map(|(_, obj)| obj)
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj))
}

fn number(obj: &Object) -> Option<f32> {
    obj.as_float().ok()
}

impl<'a> FontInfo<'a> {
    pub fn from_dict(doc: &'a Document, font: &'a Dictionary) -> Self {
        let two_byte = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|name| name == b"Type0")
            .unwrap_or(false);

        let encoding = match font.get_font_encoding(doc) {
            Ok(encoding) => Some(encoding),
            Err(e) => {
                tracing::debug!("Falling back to byte decoding for font: {}", e);
                None
            }
        };

        let mut info = FontInfo {
            encoding,
            two_byte,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: if two_byte { DEFAULT_CID_WIDTH } else { DEFAULT_GLYPH_WIDTH },
            ascent: DEFAULT_ASCENT / 1000.0,
            descent: DEFAULT_DESCENT / 1000.0,
        };

        let metrics_dict = if two_byte {
            dict_entry(doc, font, b"DescendantFonts")
                .and_then(|obj| obj.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_dict().ok())
        } else {
            Some(font)
        };

        if let Some(dict) = metrics_dict {
            if two_byte {
                info.read_cid_widths(doc, dict);
            } else {
                info.read_simple_widths(doc, dict);
            }
            info.read_descriptor(doc, dict);
        }
        info
    }

    /// Metrics for a font name the page resources do not define.
    pub fn fallback() -> Self {
        FontInfo {
            encoding: None,
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            ascent: DEFAULT_ASCENT / 1000.0,
            descent: DEFAULT_DESCENT / 1000.0,
        }
    }

    fn read_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.first_char = dict_entry(doc, font, b"FirstChar")
            .and_then(|obj| obj.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        let default_width = self.default_width;
        if let Some(widths) = dict_entry(doc, font, b"Widths").and_then(|obj| obj.as_array().ok()) {
            self.widths = widths
                .iter()
                .map(|w| resolve(doc, w).and_then(number).unwrap_or(default_width))
                .collect();
        }
    }

    // `W` entries: `c [w1 w2 ...]` or `c_first c_last w`.
    fn read_cid_widths(&mut self, doc: &Document, cid_font: &Dictionary) {
        if let Some(dw) = dict_entry(doc, cid_font, b"DW").and_then(number) {
            self.default_width = dw;
        }
        let Some(entries) = dict_entry(doc, cid_font, b"W").and_then(|obj| obj.as_array().ok()) else {
            return;
        };
        let mut i = 0;
        while i < entries.len() {
            let Some(start) = entries[i].as_i64().ok().and_then(|v| u32::try_from(v).ok()) else {
                break;
            };
            match entries.get(i + 1).and_then(|obj| resolve(doc, obj)) {
                Some(Object::Array(ws)) => {
                    for (offset, w) in ws.iter().enumerate() {
                        if let Some(w) = number(w) {
                            self.cid_widths.insert(start + offset as u32, w);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = end.as_i64().ok().and_then(|v| u32::try_from(v).ok());
                    let width = entries.get(i + 2).and_then(number);
                    if let (Some(end), Some(width)) = (end, width) {
                        for cid in start..=end {
                            self.cid_widths.insert(cid, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn read_descriptor(&mut self, doc: &Document, font: &Dictionary) {
        let Some(descriptor) = dict_entry(doc, font, b"FontDescriptor").and_then(|obj| obj.as_dict().ok()) else {
            return;
        };
        if let Some(ascent) = dict_entry(doc, descriptor, b"Ascent").and_then(number).filter(|a| *a > 0.0) {
            self.ascent = ascent / 1000.0;
        }
        if let Some(descent) = dict_entry(doc, descriptor, b"Descent").and_then(number).filter(|d| *d < 0.0) {
            self.descent = descent / 1000.0;
        }
        if !self.two_byte {
            if let Some(missing) = dict_entry(doc, descriptor, b"MissingWidth").and_then(number).filter(|w| *w > 0.0) {
                self.default_width = missing;
            }
        }
    }

    /// Splits a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    /// True for the single-byte space code, the only code word spacing applies to.
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte && code == 32
    }

    /// Advance width in em fractions.
    pub fn width(&self, code: u32) -> f32 {
        let width = if self.two_byte {
            self.cid_widths.get(&code).copied()
        } else {
            code.checked_sub(self.first_char)
                .and_then(|idx| self.widths.get(idx as usize))
                .copied()
        };
        width.unwrap_or(self.default_width) / 1000.0
    }

    pub fn decode(&self, code: u32) -> String {
        let fallback = || char::from_u32(code).map(String::from).unwrap_or_default();
        let bytes: Vec<u8> = match &self.encoding {
            // CMap lookups are always keyed by a 16-bit code
            Some(Encoding::UnicodeMapEncoding(_)) => vec![(code >> 8) as u8, code as u8],
            _ if self.two_byte => vec![(code >> 8) as u8, code as u8],
            _ => vec![code as u8],
        };
        match &self.encoding {
            Some(encoding) => Document::decode_text(encoding, &bytes)
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(fallback),
            None => fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_simple_font_widths_and_decoding() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(667), Object::Integer(667)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.codes(b"AB"), vec![65, 66]);
        assert!((info.width(65) - 0.667).abs() < 1e-6);
        assert!((info.width(90) - 0.5).abs() < 1e-6); // outside the table
        assert_eq!(info.decode(65), "A");
        assert!(info.is_word_space(32));
    }

    #[test]
    fn test_cid_width_table_forms() {
        let doc = Document::with_version("1.5");
        let mut info = FontInfo {
            encoding: None,
            two_byte: true,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_CID_WIDTH,
            ascent: 0.8,
            descent: -0.2,
        };
        let cid_font = dictionary! {
            "DW" => 900,
            "W" => vec![
                Object::Integer(3),
                Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(600),
            ],
        };
        info.read_cid_widths(&doc, &cid_font);
        assert_eq!(info.codes(&[0x00, 0x03, 0x00, 0x0B]), vec![3, 11]);
        assert!((info.width(4) - 0.3).abs() < 1e-6);
        assert!((info.width(11) - 0.6).abs() < 1e-6);
        assert!((info.width(99) - 0.9).abs() < 1e-6);
        assert!(!info.is_word_space(32));
    }
}
