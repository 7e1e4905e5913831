//! 8x8 bitmap font for the on-screen display.
//!
//! One byte per glyph row, most significant bit leftmost. Codepoints 32..=126
//! carry printable ASCII; codepoints 1 and 2 are the status glyphs (check
//! mark and cross) used by the diagnostics pages. Everything else is blank.

#![cfg_attr(not(test), no_std)]

/// Width of a glyph, in pixels.
pub const GLYPH_WIDTH: usize = 8;
/// Height of a glyph, in pixels.
pub const GLYPH_HEIGHT: usize = 8;

/// Check-mark glyph codepoint.
pub const GLYPH_CHECK: u8 = 0x01;
/// Cross glyph codepoint.
pub const GLYPH_CROSS: u8 = 0x02;

/// Returns the bitmap rows for `codepoint`, blank for anything the font
/// doesn't cover.
pub fn glyph(codepoint: u8) -> &'static [u8; GLYPH_HEIGHT] {
    FONT.get(codepoint as usize).unwrap_or(&FONT[0])
}

/// The glyph table. Index is the codepoint; row bytes are MSB-leftmost.
pub static FONT: [[u8; GLYPH_HEIGHT]; 128] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x00
    [0x00, 0x02, 0x04, 0x08, 0x50, 0x60, 0x40, 0x00], // 0x01 check
    [0x00, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x00], // 0x02 cross
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x03
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x04
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x05
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x06
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x07
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x08
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x09
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x0A
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x0B
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x0C
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x0D
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x0E
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x0F
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x10
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x11
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x12
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x13
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x14
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x15
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x16
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x17
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x18
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x19
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x1A
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x1B
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x1C
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x1D
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x1E
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x1F
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x18, 0x18, 0x18, 0x18, 0x18, 0x00, 0x18, 0x00], // '!'
    [0x66, 0x66, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00], // '"'
    [0x24, 0x7E, 0x24, 0x24, 0x24, 0x7E, 0x24, 0x00], // '#'
    [0x18, 0x3E, 0x58, 0x3C, 0x1A, 0x7C, 0x18, 0x00], // '$'
    [0x62, 0x64, 0x08, 0x10, 0x26, 0x46, 0x00, 0x00], // '%'
    [0x38, 0x44, 0x28, 0x30, 0x4A, 0x44, 0x3A, 0x00], // '&'
    [0x18, 0x18, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00], // '\''
    [0x0C, 0x18, 0x30, 0x30, 0x30, 0x18, 0x0C, 0x00], // '('
    [0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x18, 0x30, 0x00], // ')'
    [0x00, 0x24, 0x18, 0x7E, 0x18, 0x24, 0x00, 0x00], // '*'
    [0x00, 0x18, 0x18, 0x7E, 0x18, 0x18, 0x00, 0x00], // '+'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x10], // ','
    [0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00], // '-'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00], // '.'
    [0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x00, 0x00], // '/'
    [0x3C, 0x46, 0x4A, 0x52, 0x62, 0x42, 0x3C, 0x00], // '0'
    [0x18, 0x38, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00], // '1'
    [0x3C, 0x42, 0x02, 0x0C, 0x30, 0x40, 0x7E, 0x00], // '2'
    [0x3C, 0x42, 0x02, 0x1C, 0x02, 0x42, 0x3C, 0x00], // '3'
    [0x0C, 0x14, 0x24, 0x44, 0x7E, 0x04, 0x04, 0x00], // '4'
    [0x7E, 0x40, 0x7C, 0x02, 0x02, 0x42, 0x3C, 0x00], // '5'
    [0x1C, 0x20, 0x40, 0x7C, 0x42, 0x42, 0x3C, 0x00], // '6'
    [0x7E, 0x02, 0x04, 0x08, 0x10, 0x10, 0x10, 0x00], // '7'
    [0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x3C, 0x00], // '8'
    [0x3C, 0x42, 0x42, 0x3E, 0x02, 0x04, 0x38, 0x00], // '9'
    [0x00, 0x18, 0x18, 0x00, 0x18, 0x18, 0x00, 0x00], // ':'
    [0x00, 0x18, 0x18, 0x00, 0x18, 0x18, 0x10, 0x00], // ';'
    [0x06, 0x18, 0x60, 0x80, 0x60, 0x18, 0x06, 0x00], // '<'
    [0x00, 0x00, 0x7E, 0x00, 0x7E, 0x00, 0x00, 0x00], // '='
    [0x60, 0x18, 0x06, 0x01, 0x06, 0x18, 0x60, 0x00], // '>'
    [0x3C, 0x42, 0x02, 0x0C, 0x10, 0x00, 0x10, 0x00], // '?'
    [0x3C, 0x42, 0x5E, 0x5A, 0x5E, 0x40, 0x3C, 0x00], // '@'
    [0x18, 0x24, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x00], // 'A'
    [0x7C, 0x42, 0x42, 0x7C, 0x42, 0x42, 0x7C, 0x00], // 'B'
    [0x3C, 0x42, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00], // 'C'
    [0x78, 0x44, 0x42, 0x42, 0x42, 0x44, 0x78, 0x00], // 'D'
    [0x7E, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x7E, 0x00], // 'E'
    [0x7E, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x40, 0x00], // 'F'
    [0x3C, 0x42, 0x40, 0x4E, 0x42, 0x42, 0x3E, 0x00], // 'G'
    [0x42, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x00], // 'H'
    [0x7E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00], // 'I'
    [0x02, 0x02, 0x02, 0x02, 0x42, 0x42, 0x3C, 0x00], // 'J'
    [0x44, 0x48, 0x50, 0x60, 0x50, 0x48, 0x44, 0x00], // 'K'
    [0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7E, 0x00], // 'L'
    [0x42, 0x66, 0x5A, 0x5A, 0x42, 0x42, 0x42, 0x00], // 'M'
    [0x42, 0x62, 0x52, 0x4A, 0x46, 0x42, 0x42, 0x00], // 'N'
    [0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00], // 'O'
    [0x7C, 0x42, 0x42, 0x7C, 0x40, 0x40, 0x40, 0x00], // 'P'
    [0x3C, 0x42, 0x42, 0x42, 0x4A, 0x44, 0x3A, 0x00], // 'Q'
    [0x7C, 0x42, 0x42, 0x7C, 0x50, 0x48, 0x44, 0x00], // 'R'
    [0x3C, 0x42, 0x40, 0x3C, 0x02, 0x42, 0x3C, 0x00], // 'S'
    [0x7E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x00], // 'T'
    [0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00], // 'U'
    [0x42, 0x42, 0x42, 0x42, 0x24, 0x24, 0x18, 0x00], // 'V'
    [0x42, 0x42, 0x42, 0x5A, 0x5A, 0x66, 0x42, 0x00], // 'W'
    [0x42, 0x24, 0x18, 0x18, 0x18, 0x24, 0x42, 0x00], // 'X'
    [0x42, 0x42, 0x24, 0x18, 0x18, 0x18, 0x18, 0x00], // 'Y'
    [0x7E, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00], // 'Z'
    [0x3C, 0x30, 0x30, 0x30, 0x30, 0x30, 0x3C, 0x00], // '['
    [0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x00, 0x00], // '\\'
    [0x3C, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x3C, 0x00], // ']'
    [0x18, 0x24, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00], // '^'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF], // '_'
    [0x18, 0x18, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00], // '`'
    [0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x3E, 0x00], // 'a'
    [0x40, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x7C, 0x00], // 'b'
    [0x00, 0x00, 0x3C, 0x42, 0x40, 0x42, 0x3C, 0x00], // 'c'
    [0x02, 0x02, 0x3E, 0x42, 0x42, 0x42, 0x3E, 0x00], // 'd'
    [0x00, 0x00, 0x3C, 0x42, 0x7E, 0x40, 0x3C, 0x00], // 'e'
    [0x0C, 0x12, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x00], // 'f'
    [0x00, 0x00, 0x3E, 0x42, 0x42, 0x3E, 0x02, 0x3C], // 'g'
    [0x40, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x00], // 'h'
    [0x18, 0x00, 0x38, 0x18, 0x18, 0x18, 0x3C, 0x00], // 'i'
    [0x06, 0x00, 0x0E, 0x06, 0x06, 0x06, 0x46, 0x3C], // 'j'
    [0x40, 0x40, 0x44, 0x48, 0x70, 0x48, 0x44, 0x00], // 'k'
    [0x38, 0x18, 0x18, 0x18, 0x18, 0x18, 0x3C, 0x00], // 'l'
    [0x00, 0x00, 0x76, 0x5A, 0x5A, 0x5A, 0x5A, 0x00], // 'm'
    [0x00, 0x00, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x00], // 'n'
    [0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x3C, 0x00], // 'o'
    [0x00, 0x00, 0x7C, 0x42, 0x42, 0x7C, 0x40, 0x40], // 'p'
    [0x00, 0x00, 0x3E, 0x42, 0x42, 0x3E, 0x02, 0x02], // 'q'
    [0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x00], // 'r'
    [0x00, 0x00, 0x3E, 0x40, 0x3C, 0x02, 0x7C, 0x00], // 's'
    [0x10, 0x10, 0x7C, 0x10, 0x10, 0x12, 0x0C, 0x00], // 't'
    [0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x3E, 0x00], // 'u'
    [0x00, 0x00, 0x42, 0x42, 0x24, 0x24, 0x18, 0x00], // 'v'
    [0x00, 0x00, 0x42, 0x5A, 0x5A, 0x5A, 0x24, 0x00], // 'w'
    [0x00, 0x00, 0x42, 0x24, 0x18, 0x24, 0x42, 0x00], // 'x'
    [0x00, 0x00, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x3C], // 'y'
    [0x00, 0x00, 0x7E, 0x04, 0x18, 0x20, 0x7E, 0x00], // 'z'
    [0x0E, 0x18, 0x18, 0x70, 0x18, 0x18, 0x0E, 0x00], // '{'
    [0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x00], // '|'
    [0x70, 0x18, 0x18, 0x0E, 0x18, 0x18, 0x70, 0x00], // '}'
    [0x32, 0x4C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '~'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x7F
];

#[cfg(test)]
mod tests {
    use super::*;

    fn is_blank(g: &[u8; GLYPH_HEIGHT]) -> bool {
        g.iter().all(|&row| row == 0)
    }

    #[test]
    fn space_is_blank() {
        assert!(is_blank(glyph(b' ')));
    }

    #[test]
    fn printable_ascii_has_ink() {
        for cp in 33..=126u8 {
            assert!(!is_blank(glyph(cp)), "codepoint {} is blank", cp);
        }
    }

    #[test]
    fn status_glyphs_have_ink() {
        assert!(!is_blank(glyph(GLYPH_CHECK)));
        assert!(!is_blank(glyph(GLYPH_CROSS)));
    }

    #[test]
    fn out_of_range_is_blank() {
        assert!(is_blank(glyph(0x7F)));
        assert!(is_blank(glyph(0xFF)));
    }
}
