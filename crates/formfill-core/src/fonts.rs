//! Font metrics and character decoding for text layer extraction

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::document::{dict_get, number, stream_bytes};
use crate::encoding;

const DEFAULT_ASCENT: f64 = 0.8;
const DEFAULT_DESCENT: f64 = -0.2;

/// Longest code range a single `/W` or `bfrange` entry may cover
const MAX_RANGE: u32 = 0xFFFF;

/// Helvetica advance widths for codes 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Built-in metrics for the standard 14 fonts when a font dictionary has no widths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardMetrics {
    /// Proportional metrics; also used as the approximation for Times and unknown fonts
    Helvetica,
    /// Fixed pitch 600
    Courier,
}

impl StandardMetrics {
    pub fn for_base_font(name: &str) -> Self {
        if name.to_ascii_lowercase().contains("courier") {
            StandardMetrics::Courier
        } else {
            StandardMetrics::Helvetica
        }
    }

    /// Advance width in 1/1000 em for a WinAnsi code
    pub fn width(&self, code: u32) -> f64 {
        match self {
            StandardMetrics::Courier => 600.0,
            StandardMetrics::Helvetica => match code {
                32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as f64,
                _ => 556.0,
            },
        }
    }
}

/// Metrics and decoding for one font resource
#[derive(Debug, Clone)]
pub struct FontMetrics {
    two_byte: bool,
    widths: HashMap<u32, f64>,
    default_width: Option<f64>,
    standard: StandardMetrics,
    to_unicode: Option<HashMap<u32, String>>,
    /// Ascender height in em
    pub ascent: f64,
    /// Descender depth in em (negative)
    pub descent: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            two_byte: false,
            widths: HashMap::new(),
            default_width: None,
            standard: StandardMetrics::Helvetica,
            to_unicode: None,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }
}

impl FontMetrics {
    /// Build metrics from a font dictionary
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = FontMetrics::default();

        let base_font = dict_get(doc, font, b"BaseFont")
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        metrics.standard = StandardMetrics::for_base_font(&base_font);

        let subtype = dict_get(doc, font, b"Subtype").and_then(|o| o.as_name().ok());
        let descriptor_owner = if subtype == Some(b"Type0".as_slice()) {
            metrics.two_byte = true;
            let descendant = dict_get(doc, font, b"DescendantFonts")
                .and_then(|o| o.as_array().ok())
                .and_then(|a| a.first())
                .and_then(|o| crate::document::resolve(doc, o).as_dict().ok());
            if let Some(cid_font) = descendant {
                metrics.default_width = Some(
                    dict_get(doc, cid_font, b"DW")
                        .and_then(number)
                        .unwrap_or(1000.0),
                );
                if let Some(w) = dict_get(doc, cid_font, b"W").and_then(|o| o.as_array().ok()) {
                    metrics.widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            metrics.widths = parse_simple_widths(doc, font);
            Some(font)
        };

        if let Some(descriptor) = descriptor_owner
            .and_then(|owner| dict_get(doc, owner, b"FontDescriptor"))
            .and_then(|o| o.as_dict().ok())
        {
            if !metrics.two_byte {
                metrics.default_width = dict_get(doc, descriptor, b"MissingWidth").and_then(number);
            }
            let ascent = dict_get(doc, descriptor, b"Ascent").and_then(number);
            let descent = dict_get(doc, descriptor, b"Descent").and_then(number);
            if let (Some(a), Some(d)) = (ascent, descent) {
                if a > 0.0 && a > d {
                    metrics.ascent = a / 1000.0;
                    metrics.descent = d.min(0.0) / 1000.0;
                }
            }
        }

        if let Some(stream) = dict_get(doc, font, b"ToUnicode").and_then(|o| o.as_stream().ok()) {
            let map = parse_to_unicode(&stream_bytes(stream));
            if !map.is_empty() {
                metrics.to_unicode = Some(map);
            }
        }

        metrics
    }

    /// Advance width of a character code, in em
    pub fn width(&self, code: u32) -> f64 {
        let units = match self.widths.get(&code) {
            Some(w) => *w,
            None => match self.default_width {
                Some(w) if self.two_byte || w > 0.0 => w,
                _ => self.standard.width(code),
            },
        };
        units / 1000.0
    }

    /// Whether the word-spacing operator applies to this code
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte && code == 32
    }

    /// Split a shown string into character codes and their Unicode text
    pub fn decode(&self, bytes: &[u8]) -> Vec<(u32, String)> {
        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        };

        codes
            .into_iter()
            .map(|code| (code, self.code_text(code)))
            .collect()
    }

    fn code_text(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|map| map.get(&code)) {
            return text.clone();
        }
        if self.two_byte {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_default();
        }
        u8::try_from(code)
            .ok()
            .and_then(encoding::decode_byte)
            .map(String::from)
            .unwrap_or_default()
    }
}

fn parse_simple_widths(doc: &Document, font: &Dictionary) -> HashMap<u32, f64> {
    let first_char = dict_get(doc, font, b"FirstChar").and_then(number);
    let widths = dict_get(doc, font, b"Widths").and_then(|o| o.as_array().ok());
    match (first_char, widths) {
        (Some(first), Some(widths)) => widths
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                number(crate::document::resolve(doc, w)).map(|w| (first as u32 + i as u32, w))
            })
            .collect(),
        _ => HashMap::new(),
    }
}

/// Parse a CIDFont /W array: `c [w1 w2 ...]` and `c_first c_last w` forms
fn parse_cid_widths(doc: &Document, array: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let items: Vec<&Object> = array
        .iter()
        .map(|o| crate::document::resolve(doc, o))
        .collect();
    let mut i = 0;
    while i < items.len() {
        let Some(start) = number(items[i]) else {
            i += 1;
            continue;
        };
        match items.get(i + 1) {
            Some(Object::Array(run)) => {
                for (offset, w) in run.iter().enumerate() {
                    if let Some(w) = number(crate::document::resolve(doc, w)) {
                        widths.insert(start as u32 + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(end) => {
                if let (Some(end), Some(w)) = (number(end), items.get(i + 2).and_then(|o| number(o)))
                {
                    let first = start as u32;
                    for code in first..=(end as u32).min(first.saturating_add(MAX_RANGE)) {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[derive(Debug, PartialEq)]
enum CmapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CmapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let end = data[i + 1..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map_or(data.len(), |p| i + 1 + p);
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let text = std::str::from_utf8(pair).ok()?;
                        let padded = if text.len() == 1 {
                            format!("{text}0")
                        } else {
                            text.to_string()
                        };
                        u8::from_str_radix(&padded, 16).ok()
                    })
                    .collect();
                tokens.push(CmapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CmapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CmapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                tokens.push(CmapToken::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| acc << 8 | u32::from(b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from(*hi) << 8 | u16::from(*lo),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CmapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while let (Some(CmapToken::Hex(src)), Some(CmapToken::Hex(dst))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    map.insert(code_of(src), utf16_text(dst));
                    i += 2;
                }
            }
            CmapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                loop {
                    let (Some(CmapToken::Hex(lo)), Some(CmapToken::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    else {
                        break;
                    };
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    match tokens.get(i + 2) {
                        Some(CmapToken::Hex(dst)) => {
                            let base = utf16_text(dst);
                            let mut chars: Vec<char> = base.chars().collect();
                            for code in lo..=hi.min(lo.saturating_add(MAX_RANGE)) {
                                map.insert(code, chars.iter().collect());
                                if let Some(last) = chars.last_mut() {
                                    *last = char::from_u32(*last as u32 + 1).unwrap_or(*last);
                                }
                            }
                            i += 3;
                        }
                        Some(CmapToken::ArrayStart) => {
                            let mut j = i + 3;
                            let mut code = Some(lo);
                            while let Some(CmapToken::Hex(dst)) = tokens.get(j) {
                                if let Some(c) = code.filter(|c| *c <= hi) {
                                    map.insert(c, utf16_text(dst));
                                }
                                code = code.and_then(|c| c.checked_add(1));
                                j += 1;
                            }
                            // skip the closing bracket
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_standard_helvetica_word_width() {
        let metrics = StandardMetrics::Helvetica;
        let answer: f64 = b"Answer".iter().map(|&b| metrics.width(u32::from(b))).sum();
        assert_eq!(answer, 3334.0);
        assert_eq!(StandardMetrics::for_base_font("Courier-Bold"), StandardMetrics::Courier);
    }

    #[test]
    fn test_simple_font_widths_take_priority() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(700), Object::Integer(650)],
        };
        let metrics = FontMetrics::load(&doc, &font);
        assert_eq!(metrics.width(65), 0.7);
        assert_eq!(metrics.width(66), 0.65);
        // outside the Widths range falls back to standard metrics
        assert_eq!(metrics.width(97), 0.556);
    }

    #[test]
    fn test_descriptor_ascent_and_missing_width() {
        let mut doc = Document::with_version("1.7");
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "Ascent" => 900,
            "Descent" => -300,
            "MissingWidth" => 400,
        });
        let font = dictionary! {
            "Subtype" => "Type1",
            "BaseFont" => "Custom",
            "FirstChar" => 32,
            "Widths" => vec![Object::Integer(250)],
            "FontDescriptor" => descriptor,
        };
        let metrics = FontMetrics::load(&doc, &font);
        assert_eq!(metrics.ascent, 0.9);
        assert_eq!(metrics.descent, -0.3);
        assert_eq!(metrics.width(120), 0.4);
    }

    #[test]
    fn test_type0_widths_and_two_byte_decode() {
        let mut doc = Document::with_version("1.7");
        let cmap = b"/CIDInit /ProcSet findresource begin\n\
            begincmap\n\
            2 beginbfchar\n<0003> <0020>\n<0024> <0041>\nendbfchar\n\
            1 beginbfrange\n<0044> <0046> <0061>\nendbfrange\n\
            endcmap\n"
            .to_vec();
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap));
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 500,
            "W" => vec![
                Object::Integer(36),
                Object::Array(vec![Object::Integer(667)]),
                Object::Integer(68),
                Object::Integer(70),
                Object::Integer(556),
            ],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Arial",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![cid_font.into()],
            "ToUnicode" => to_unicode,
        };
        let metrics = FontMetrics::load(&doc, &font);

        let decoded = metrics.decode(&[0x00, 0x24, 0x00, 0x44, 0x00, 0x03]);
        let text: String = decoded.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(text, "Aa ");
        assert_eq!(metrics.width(0x24), 0.667);
        assert_eq!(metrics.width(0x45), 0.556);
        assert_eq!(metrics.width(0x03), 0.5);
        assert!(!metrics.is_word_space(32));
    }

    #[test]
    fn test_bfrange_array_form() {
        let cmap = b"1 beginbfrange\n<01> <03> [<0061> <0062> <00660069>]\nendbfrange";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&1).map(String::as_str), Some("a"));
        assert_eq!(map.get(&2).map(String::as_str), Some("b"));
        assert_eq!(map.get(&3).map(String::as_str), Some("fi"));
    }

    #[test]
    fn test_oversized_width_range_is_capped() {
        let doc = Document::with_version("1.7");
        let w = [
            Object::Integer(0),
            Object::Integer(i64::from(u32::MAX)),
            Object::Integer(500),
        ];
        let widths = parse_cid_widths(&doc, &w);
        assert_eq!(widths.len(), MAX_RANGE as usize + 1);
        assert_eq!(widths.get(&0), Some(&500.0));
        assert_eq!(widths.get(&(MAX_RANGE + 1)), None);
    }

    #[test]
    fn test_bfrange_array_at_top_of_code_space() {
        let cmap = b"1 beginbfrange\n<FFFFFFFF> <FFFFFFFF> [<0061> <0062>]\nendbfrange";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&u32::MAX).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_winansi_fallback_decode() {
        let metrics = FontMetrics::default();
        let decoded = metrics.decode(b"answer");
        let text: String = decoded.into_iter().map(|(_, t)| t).collect();
        assert_eq!(text, "answer");
        assert!(metrics.is_word_space(32));
    }
}
