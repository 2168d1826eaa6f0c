use crate::types::FieldType;

/// Hand-written recognizers replacing the original's PCRE-based field
/// detection, per spec.md §9's redesign guidance ("patterns are fixed at
/// build time" — no need for a regex engine). Grounded loosely on
/// `examples/original_source/database.cc`'s `timestamp_date` grammar, but
/// rewritten as straightforward character-class scanning instead of a
/// translated PCRE pattern.

/// `8-4-4-4-12` hex digits, hyphen-separated, e.g.
/// `550e8400-e29b-41d4-a716-446655440000`.
pub fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    let expected = [8, 4, 4, 4, 12];
    groups.len() == 5
        && groups.iter().zip(expected).all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// `lat,lon` (optionally `lat, lon`), e.g. `40.7128,-74.0060`. Bounds are
/// not enforced here; callers may reject out-of-range values after typing.
pub fn is_geo(s: &str) -> bool {
    let Some((lat, lon)) = s.split_once(',') else { return false };
    let (lat, lon) = (lat.trim(), lon.trim());
    is_decimal(lat) && is_decimal(lon)
}

fn is_decimal(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in s.chars() {
        if c == '.' {
            if seen_dot {
                return false;
            }
            seen_dot = true;
        } else if c.is_ascii_digit() {
            seen_digit = true;
        } else {
            return false;
        }
    }
    seen_digit
}

fn digits(s: &str, len: usize) -> Option<&str> {
    if s.len() >= len && s.as_bytes()[..len].iter().all(u8::is_ascii_digit) {
        Some(&s[..len])
    } else {
        None
    }
}

/// `YYYY-MM-DD`, optionally followed by `Thh:mm:ss` (with optional
/// fractional seconds and a `Z`/`±hh:mm` offset). Returns whether a time
/// component was present, to distinguish DATE from DATETIME.
fn in_range(s: &str, lo: u32, hi: u32) -> bool {
    s.parse::<u32>().map(|v| (lo..=hi).contains(&v)).unwrap_or(false)
}

fn parse_date_prefix(s: &str) -> Option<(usize, bool)> {
    let year = digits(s, 4)?;
    let rest = &s[4..];
    if !rest.starts_with('-') {
        return None;
    }
    let month = digits(&rest[1..], 2)?;
    if !in_range(month, 1, 12) {
        return None;
    }
    let rest = &rest[3..];
    if !rest.starts_with('-') {
        return None;
    }
    let day = digits(&rest[1..], 2)?;
    if !in_range(day, 1, 31) {
        return None;
    }
    let _ = year;

    let mut pos = 10; // "YYYY-MM-DD"
    let has_time = s.as_bytes().get(pos).map(|b| *b == b'T' || *b == b' ').unwrap_or(false);
    if !has_time {
        return Some((pos, false));
    }
    pos += 1;
    let hh = digits(&s[pos..], 2)?;
    if !in_range(hh, 0, 23) {
        return None;
    }
    if &s[pos + 2..pos + 3] != ":" {
        return None;
    }
    let mm = digits(&s[pos + 3..], 2)?;
    if !in_range(mm, 0, 59) {
        return None;
    }
    if &s[pos + 5..pos + 6] != ":" {
        return None;
    }
    let ss = digits(&s[pos + 6..], 2)?;
    if !in_range(ss, 0, 60) {
        return None;
    }
    pos += 8;

    if s.as_bytes().get(pos) == Some(&b'.') {
        let frac_start = pos + 1;
        let mut end = frac_start;
        while s.as_bytes().get(end).map(u8::is_ascii_digit).unwrap_or(false) {
            end += 1;
        }
        if end > frac_start {
            pos = end;
        }
    }

    if let Some(rest) = s[pos..].strip_prefix('Z') {
        let _ = rest;
        pos += 1;
    } else if let Some(sign) = s.as_bytes().get(pos).filter(|b| **b == b'+' || **b == b'-') {
        let _ = sign;
        if digits(&s[pos + 1..], 2).is_some() && s.as_bytes().get(pos + 3) == Some(&b':') && digits(&s[pos + 4..], 2).is_some() {
            pos += 6;
        }
    }

    Some((pos, true))
}

pub fn is_date(s: &str) -> bool {
    matches!(parse_date_prefix(s), Some((end, false)) if end == s.len())
}

pub fn is_datetime(s: &str) -> bool {
    matches!(parse_date_prefix(s), Some((end, true)) if end == s.len())
}

/// Bare `hh:mm:ss` with no date component.
pub fn is_time(s: &str) -> bool {
    let Some(hh) = digits(s, 2) else { return false };
    if s.as_bytes().get(2) != Some(&b':') {
        return false;
    }
    let Some(mm) = digits(&s[3..], 2) else { return false };
    if s.as_bytes().get(5) != Some(&b':') {
        return false;
    }
    let Some(ss) = digits(&s[6..], 2) else { return false };
    s.len() == 8 && in_range(hh, 0, 23) && in_range(mm, 0, 59) && in_range(ss, 0, 60)
}

/// `keyword` (exact-match term) vs `text` (tokenized) heuristic: short,
/// whitespace-free strings index as keyword; anything with internal
/// whitespace indexes as text (field-detection pass this spec distills
/// from `database.cc`'s string handling).
pub fn is_keyword_like(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && !s.chars().any(char::is_whitespace)
}

pub fn infer_string_type(s: &str) -> FieldType {
    if is_uuid(s) {
        FieldType::Uuid
    } else if is_datetime(s) {
        FieldType::DateTime
    } else if is_date(s) {
        FieldType::Date
    } else if is_time(s) {
        FieldType::Time
    } else if is_geo(s) {
        FieldType::Geo
    } else if is_keyword_like(s) {
        FieldType::Keyword
    } else {
        FieldType::Text
    }
}

pub fn infer_json_type(value: &serde_json::Value) -> Option<FieldType> {
    match value {
        serde_json::Value::Bool(_) => Some(FieldType::Boolean),
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some(FieldType::Integer)
            } else {
                Some(FieldType::Float)
            }
        }
        serde_json::Value::String(s) => Some(infer_string_type(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid("not-a-uuid"));
    }

    #[test]
    fn recognizes_date_and_datetime() {
        assert!(is_date("2024-03-05"));
        assert!(!is_datetime("2024-03-05"));
        assert!(is_datetime("2024-03-05T10:15:00"));
        assert!(is_datetime("2024-03-05T10:15:00.123Z"));
        assert!(is_datetime("2024-03-05T10:15:00+02:00"));
        assert!(!is_date("2024-13-05"));
    }

    #[test]
    fn recognizes_time() {
        assert!(is_time("10:15:00"));
        assert!(!is_time("10:15"));
    }

    #[test]
    fn recognizes_geo() {
        assert!(is_geo("40.7128,-74.0060"));
        assert!(!is_geo("hello,world"));
    }

    #[test]
    fn keyword_vs_text() {
        assert!(is_keyword_like("red"));
        assert!(!is_keyword_like("a red bicycle"));
    }

    #[test]
    fn infers_json_scalars() {
        assert_eq!(infer_json_type(&serde_json::json!(true)), Some(FieldType::Boolean));
        assert_eq!(infer_json_type(&serde_json::json!(42)), Some(FieldType::Integer));
        assert_eq!(infer_json_type(&serde_json::json!(4.2)), Some(FieldType::Float));
        assert_eq!(infer_json_type(&serde_json::json!("red")), Some(FieldType::Keyword));
        assert_eq!(infer_json_type(&serde_json::json!("a red bicycle")), Some(FieldType::Text));
    }
}
