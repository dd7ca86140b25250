//! Cursor-based text scanning shared by the attribute, path, and
//! animation parsers. All scanners are non-destructive: they take a
//! `&str` and return `(token, rest)` pairs.

/// Longest number token kept; the cursor still advances over the full
/// numeric run, so oversized literals lose precision but never derail
/// the scan.
pub(crate) const NUM_TOKEN_MAX: usize = 63;

pub(crate) fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

/// Scans one number: sign, integer digits, fraction, exponent. An `e`
/// is only an exponent when not followed by `m` or `x`, so `em`/`ex`
/// unit suffixes survive.
pub(crate) fn parse_number(s: &str) -> (&str, &str) {
    let b = s.as_bytes();
    let mut i = 0usize;
    if i < b.len() && (b[i] == b'-' || b[i] == b'+') {
        i += 1;
    }
    while i < b.len() && is_digit(b[i]) {
        i += 1;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && is_digit(b[i]) {
            i += 1;
        }
    }
    if i < b.len()
        && (b[i] == b'e' || b[i] == b'E')
        && (i + 1 >= b.len() || (b[i + 1] != b'm' && b[i + 1] != b'x'))
    {
        i += 1;
        if i < b.len() && (b[i] == b'-' || b[i] == b'+') {
            i += 1;
        }
        while i < b.len() && is_digit(b[i]) {
            i += 1;
        }
    }
    (&s[..i.min(NUM_TOKEN_MAX)], &s[i..])
}

/// Locale-independent float parse. Returns 0.0 unless at least one
/// integer or fraction digit is present.
pub(crate) fn atof(s: &str) -> f64 {
    let b = s.as_bytes();
    let mut cur = 0usize;
    let mut sign = 1.0f64;
    if cur < b.len() && b[cur] == b'+' {
        cur += 1;
    } else if cur < b.len() && b[cur] == b'-' {
        sign = -1.0;
        cur += 1;
    }

    let mut res = 0.0f64;
    let int_start = cur;
    let mut int_part: i64 = 0;
    while cur < b.len() && is_digit(b[cur]) {
        int_part = int_part
            .wrapping_mul(10)
            .wrapping_add((b[cur] - b'0') as i64);
        cur += 1;
    }
    let has_int = cur > int_start;
    if has_int {
        res = int_part as f64;
    }

    let mut has_frac = false;
    if cur < b.len() && b[cur] == b'.' {
        cur += 1;
        let frac_start = cur;
        let mut frac_part: i64 = 0;
        while cur < b.len() && is_digit(b[cur]) {
            frac_part = frac_part
                .wrapping_mul(10)
                .wrapping_add((b[cur] - b'0') as i64);
            cur += 1;
        }
        if cur > frac_start {
            res += frac_part as f64 / libm::pow(10.0, (cur - frac_start) as f64);
            has_frac = true;
        }
    }

    if !has_int && !has_frac {
        return 0.0;
    }

    if cur < b.len() && (b[cur] == b'e' || b[cur] == b'E') {
        cur += 1;
        let mut exp_sign: i64 = 1;
        if cur < b.len() && b[cur] == b'+' {
            cur += 1;
        } else if cur < b.len() && b[cur] == b'-' {
            exp_sign = -1;
            cur += 1;
        }
        let exp_start = cur;
        let mut exp: i64 = 0;
        while cur < b.len() && is_digit(b[cur]) {
            exp = exp * 10 + (b[cur] - b'0') as i64;
            cur += 1;
        }
        if cur > exp_start {
            res *= libm::pow(10.0, (exp_sign * exp) as f64);
        }
    }

    res * sign
}

pub(crate) fn atof32(s: &str) -> f32 {
    atof(s) as f32
}

fn skip_seps(s: &str) -> &str {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && (is_space(b[i]) || b[i] == b',') {
        i += 1;
    }
    &s[i..]
}

/// Next token of a path `d` string: a number, or a single command char.
/// An empty token means the input is exhausted.
pub(crate) fn next_path_item(s: &str) -> (&str, &str) {
    let s = skip_seps(s);
    match s.chars().next() {
        None => ("", s),
        Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => parse_number(s),
        // commands are single chars; a stray multibyte char passes
        // through whole so the caller can reject it without panicking
        Some(c) => {
            let n = c.len_utf8();
            (&s[..n], &s[n..])
        }
    }
}

/// Arc flags are single chars and may be packed (`11` is two flags),
/// so they get their own scanner: only a lone `0` or `1` is accepted.
pub(crate) fn next_arc_flag(s: &str) -> (&str, &str) {
    let s = skip_seps(s);
    let b = s.as_bytes();
    match b.first() {
        Some(&c) if c == b'0' || c == b'1' => (&s[..1], &s[1..]),
        _ => ("", s),
    }
}

/// Next entry of a dash array: runs until whitespace, comma or `;`.
pub(crate) fn next_dash_item(s: &str) -> (&str, &str) {
    let s = skip_seps(s);
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && !is_space(b[i]) && b[i] != b',' && b[i] != b';' {
        i += 1;
    }
    // the cap may land inside a multibyte char; back up to a boundary
    let mut cap = i.min(NUM_TOKEN_MAX);
    while cap > 0 && !s.is_char_boundary(cap) {
        cap -= 1;
    }
    (&s[..cap], &s[i..])
}

/// True when the token can start a coordinate (optional sign, then a
/// digit or decimal point).
pub(crate) fn is_coordinate(token: &str) -> bool {
    let mut b = token.as_bytes();
    if let Some(&c) = b.first() {
        if c == b'-' || c == b'+' {
            b = &b[1..];
        }
    }
    matches!(b.first(), Some(&c) if is_digit(c) || c == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_token_shapes() {
        assert_eq!(parse_number("-12.5e3abc"), ("-12.5e3", "abc"));
        assert_eq!(parse_number("3em"), ("3", "em"));
        assert_eq!(parse_number("2ex"), ("2", "ex"));
        assert_eq!(parse_number(".5,rest"), (".5", ",rest"));
    }

    #[test]
    fn long_number_token_is_capped_but_cursor_advances() {
        let long = "1".repeat(80);
        let (token, rest) = parse_number(&long);
        assert_eq!(token.len(), NUM_TOKEN_MAX);
        assert!(rest.is_empty());
    }

    #[test]
    fn atof_basics() {
        assert_eq!(atof("42"), 42.0);
        assert_eq!(atof("-1.5"), -1.5);
        assert_eq!(atof("2e2"), 200.0);
        // mantissa * pow(10, exp) is not exact in binary
        assert!((atof("1.5e-1") - 0.15).abs() < 1e-12);
        assert_eq!(atof("+.25"), 0.25);
        // no digits at all -> 0
        assert_eq!(atof("."), 0.0);
        assert_eq!(atof("-"), 0.0);
    }

    #[test]
    fn path_items_mix_commands_and_numbers() {
        let mut rest = "M10-20 ,  L.5z";
        let mut items = Vec::new();
        loop {
            let (token, r) = next_path_item(rest);
            if token.is_empty() {
                break;
            }
            items.push(token);
            rest = r;
        }
        assert_eq!(items, ["M", "10", "-20", "L", ".5", "z"]);
    }

    #[test]
    fn arc_flags_split_packed_digits() {
        let (a, rest) = next_arc_flag("11 5");
        assert_eq!(a, "1");
        let (b, rest) = next_arc_flag(rest);
        assert_eq!(b, "1");
        let (c, _) = next_arc_flag(rest);
        assert_eq!(c, "");
    }

    #[test]
    fn dash_items_stop_at_separators() {
        let (a, rest) = next_dash_item("5, 10;rest");
        assert_eq!(a, "5");
        let (b, rest) = next_dash_item(rest);
        assert_eq!(b, "10");
        let (c, _) = next_dash_item(rest);
        assert_eq!(c, "");
    }

    #[test]
    fn non_ascii_path_chars_scan_without_panicking() {
        let (token, rest) = next_path_item("£10 10");
        assert_eq!(token, "£");
        let (n, _) = next_path_item(rest);
        assert_eq!(n, "10");
    }

    #[test]
    fn dash_item_cap_respects_char_boundaries() {
        let long: String = "£".repeat(40);
        let (token, rest) = next_dash_item(&long);
        // 63-byte cap backs up to the nearest 2-byte boundary
        assert_eq!(token.len(), 62);
        assert!(rest.is_empty());
    }

    #[test]
    fn coordinate_detection() {
        assert!(is_coordinate("-5"));
        assert!(is_coordinate(".5"));
        assert!(is_coordinate("+2"));
        assert!(!is_coordinate("M"));
        assert!(!is_coordinate(""));
        assert!(!is_coordinate("-M"));
    }
}
