use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Three numeric groups joined by the separators seen in scanner output:
    // 13-11-2025, 2025-11-13, 13.11.2025, 13_11_2025, 13/11/2025, 03-04-21.
    static ref DATE_TOKEN: Regex = Regex::new(r"\d{1,4}[-._/]\d{1,2}[-._/]\d{1,4}").unwrap();
}

/// Extract a date from a filename.
///
/// Matches the *last* date-shaped token in the name, so leading scanner or
/// invoice identifiers do not produce false positives. Returns `None` when
/// no token parses to a valid calendar date.
pub fn extract(filename: &str) -> Option<NaiveDate> {
    let bytes = filename.as_bytes();
    let mut result = None;

    for token in DATE_TOKEN.find_iter(filename) {
        // A token glued to further digits is an identifier, not a date.
        if token.start() > 0 && bytes[token.start() - 1].is_ascii_digit() {
            continue;
        }
        if token.end() < bytes.len() && bytes[token.end()].is_ascii_digit() {
            continue;
        }
        if let Some(date) = parse_token(token.as_str()) {
            result = Some(date);
        }
    }

    result
}

/// Parse one `a<sep>b<sep>c` token.
///
/// A four-digit first group is read as `YYYY-MM-DD`. Otherwise the year is
/// the last group (four digits, or two digits mapped to 2000+YY) and the
/// remaining pair is day-first; when day-first is out of range the
/// month-first reading is tried. When both readings are valid, day-first
/// wins (locale default).
fn parse_token(token: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split(['-', '.', '_', '/']).collect();
    let [a, b, c] = parts[..] else {
        return None;
    };

    if a.len() == 4 {
        return NaiveDate::from_ymd_opt(a.parse().ok()?, b.parse().ok()?, c.parse().ok()?);
    }
    if a.len() > 2 {
        return None;
    }

    let year: i32 = match c.len() {
        4 => c.parse().ok()?,
        2 => 2000 + c.parse::<i32>().ok()?,
        _ => return None,
    };
    let first: u32 = a.parse().ok()?;
    let second: u32 = b.parse().ok()?;

    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}
