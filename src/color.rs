//! Color literals: `#rgb`, `#rrggbb`, `rgb(...)` with integer or
//! percentage channels, and a small named table. Anything unparseable
//! falls back to mid-gray rather than failing.

use crate::scan;

/// Packed RGBA, `0xAABBGGRR` (red in the low byte).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color(pub u32);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((b as u32) << 16) | ((g as u32) << 8) | (r as u32))
    }

    pub const fn r(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub const fn g(self) -> u8 {
        ((self.0 >> 8) & 0xff) as u8
    }

    pub const fn b(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    pub const fn a(self) -> u8 {
        ((self.0 >> 24) & 0xff) as u8
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Color((self.0 & 0x00ff_ffff) | ((a as u32) << 24))
    }
}

const GRAY: Color = Color::rgb(128, 128, 128);

const NAMED: [(&str, Color); 10] = [
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("black", Color::rgb(0, 0, 0)),
    ("grey", Color::rgb(128, 128, 128)),
    ("gray", Color::rgb(128, 128, 128)),
    ("white", Color::rgb(255, 255, 255)),
];

fn hex_value(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'a'..=b'f' => Some((c - b'a' + 10) as u32),
        b'A'..=b'F' => Some((c - b'A' + 10) as u32),
        _ => None,
    }
}

fn parse_hex(s: &str) -> Color {
    let digits: Vec<u32> = s.bytes().map_while(hex_value).collect();
    if digits.len() >= 6 {
        Color::rgb(
            (digits[0] * 16 + digits[1]) as u8,
            (digits[2] * 16 + digits[3]) as u8,
            (digits[4] * 16 + digits[5]) as u8,
        )
    } else if digits.len() >= 3 {
        Color::rgb(
            (digits[0] * 17) as u8,
            (digits[1] * 17) as u8,
            (digits[2] * 17) as u8,
        )
    } else {
        GRAY
    }
}

/// One channel inside `rgb(...)`: either a plain integer or a
/// percentage float. Negative channels reject the whole literal.
fn parse_rgb_channel(item: &str) -> Option<u32> {
    let item = item.trim_matches(|c: char| c.is_ascii() && scan::is_space(c as u8));
    let b = item.as_bytes();
    if b.is_empty() || b[0] == b'-' {
        return None;
    }
    if let Some(stripped) = item.strip_suffix('%') {
        let stripped = stripped.strip_prefix('+').unwrap_or(stripped);
        let sb = stripped.as_bytes();
        if sb.is_empty() || !sb.iter().all(|&c| c.is_ascii_digit() || c == b'.') {
            return None;
        }
        let value = libm::roundf(scan::atof32(stripped) * 2.55) as i64;
        Some(value.clamp(0, u32::MAX as i64) as u32)
    } else {
        let stripped = item.strip_prefix('+').unwrap_or(item);
        let sb = stripped.as_bytes();
        if sb.is_empty() || !sb.iter().all(|&c| c.is_ascii_digit()) {
            return None;
        }
        let mut value: u32 = 0;
        for &c in sb {
            value = value.saturating_mul(10).saturating_add((c - b'0') as u32);
        }
        Some(value)
    }
}

fn parse_rgb(s: &str) -> Color {
    // s starts with "rgb("
    let inner = &s[4..];
    let Some(close) = inner.find(')') else {
        return GRAY;
    };
    let parts: Vec<&str> = inner[..close].split(',').collect();
    if parts.len() != 3 {
        return GRAY;
    }
    let mut rgb = [0u32; 3];
    for (slot, part) in rgb.iter_mut().zip(&parts) {
        match parse_rgb_channel(part) {
            Some(v) => *slot = v.min(255),
            None => return GRAY,
        }
    }
    Color::rgb(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8)
}

fn parse_name(s: &str) -> Color {
    for (name, color) in NAMED {
        if s == name {
            return color;
        }
    }
    GRAY
}

pub(crate) fn parse_color(s: &str) -> Color {
    let s = s.trim_start_matches(|c: char| c.is_ascii() && scan::is_space(c as u8));
    if s.starts_with('#') {
        parse_hex(&s[1..])
    } else if s.len() >= 4 && s.starts_with("rgb(") {
        parse_rgb(s)
    } else {
        parse_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_layout() {
        let c = Color::rgb(0x12, 0x34, 0x56).with_alpha(0x78);
        assert_eq!(c.0, 0x7856_3412);
        assert_eq!((c.r(), c.g(), c.b(), c.a()), (0x12, 0x34, 0x56, 0x78));
    }

    #[test]
    fn hex_forms() {
        assert_eq!(parse_color("#ff8000"), Color::rgb(255, 128, 0));
        assert_eq!(parse_color("#fff"), Color::rgb(255, 255, 255));
        assert_eq!(parse_color("#1a2"), Color::rgb(17, 170, 34));
        assert_eq!(parse_color("#f"), Color::rgb(128, 128, 128));
    }

    #[test]
    fn rgb_integer_and_percent() {
        assert_eq!(parse_color("rgb(255, 0, 10)"), Color::rgb(255, 0, 10));
        assert_eq!(parse_color("rgb(300,0,0)"), Color::rgb(255, 0, 0));
        assert_eq!(parse_color("rgb(50%, 0%, 100%)"), Color::rgb(128, 0, 255));
        assert_eq!(parse_color("rgb(-1, 0, 0)"), Color::rgb(128, 128, 128));
        assert_eq!(parse_color("rgb(1, 2)"), Color::rgb(128, 128, 128));
    }

    #[test]
    fn named_and_unknown() {
        assert_eq!(parse_color("red"), Color::rgb(255, 0, 0));
        assert_eq!(parse_color("green"), Color::rgb(0, 128, 0));
        assert_eq!(parse_color("  white"), Color::rgb(255, 255, 255));
        assert_eq!(parse_color("chartreuse"), Color::rgb(128, 128, 128));
        assert_eq!(parse_color(""), Color::rgb(128, 128, 128));
    }
}
