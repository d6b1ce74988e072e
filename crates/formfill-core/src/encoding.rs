//! WinAnsiEncoding, the single-byte encoding used for standard Type1 fonts

/// Code points for bytes 0x80..=0x9F; `None` marks undefined codes
const HIGH_CONTROL_RANGE: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Decode one WinAnsi byte
pub fn decode_byte(byte: u8) -> Option<char> {
    match byte {
        0x80..=0x9F => HIGH_CONTROL_RANGE[(byte - 0x80) as usize],
        0x20..=0x7E | 0xA0..=0xFF => Some(byte as char),
        b'\t' | b'\n' | b'\r' => Some(' '),
        _ => None,
    }
}

/// Encode one character, or `None` if WinAnsi cannot represent it
pub fn encode_char(c: char) -> Option<u8> {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(c as u8),
        _ => HIGH_CONTROL_RANGE
            .iter()
            .position(|&mapped| mapped == Some(c))
            .map(|i| 0x80 + i as u8),
    }
}

/// Encode a string, replacing unrepresentable characters with `?`
pub fn encode_lossy(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| encode_char(c).unwrap_or(b'?'))
        .collect()
}
