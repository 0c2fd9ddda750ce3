//! Two-place fixed-point amounts (money, marks, percentages) stored as
//! integer hundredths.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("value must be a number or numeric string")]
    NotNumeric,
    #[error("value must not be negative")]
    Negative,
    #[error("value allows at most two decimal places")]
    TooPrecise,
    #[error("value is too large")]
    Overflow,
}

pub fn parse_hundredths(v: &serde_json::Value) -> Result<i64, DecimalError> {
    match v {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i < 0 {
                    return Err(DecimalError::Negative);
                }
                return i.checked_mul(100).ok_or(DecimalError::Overflow);
            }
            // Display of an f64 is the shortest round-trip form, so "12.5" stays "12.5".
            parse_hundredths_str(&n.to_string())
        }
        serde_json::Value::String(s) => parse_hundredths_str(s),
        _ => Err(DecimalError::NotNumeric),
    }
}

pub fn parse_hundredths_str(raw: &str) -> Result<i64, DecimalError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(DecimalError::NotNumeric);
    }
    if t.starts_with('-') {
        return Err(DecimalError::Negative);
    }
    let t = t.strip_prefix('+').unwrap_or(t);
    let (int_part, frac_part) = match t.split_once('.') {
        Some((i, f)) => (i, f),
        None => (t, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(DecimalError::NotNumeric);
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(DecimalError::NotNumeric);
    }
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > 2 {
        return Err(DecimalError::TooPrecise);
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| DecimalError::Overflow)?
    };
    let mut cents: i64 = 0;
    for (i, c) in frac_trimmed.chars().enumerate() {
        let d = i64::from(c as u8 - b'0');
        cents += if i == 0 { d * 10 } else { d };
    }
    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or(DecimalError::Overflow)
}

pub fn format_hundredths(v: i64) -> String {
    let sign = if v < 0 { "-" } else { "" };
    let abs = v.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_strings() {
        assert_eq!(parse_hundredths(&json!(1500)), Ok(150_000));
        assert_eq!(parse_hundredths(&json!(12.5)), Ok(1250));
        assert_eq!(parse_hundredths(&json!("87.25")), Ok(8725));
        assert_eq!(parse_hundredths(&json!(" 40 ")), Ok(4000));
        assert_eq!(parse_hundredths(&json!(".5")), Ok(50));
        assert_eq!(parse_hundredths(&json!("3.10")), Ok(310));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_hundredths(&json!(-1)), Err(DecimalError::Negative));
        assert_eq!(parse_hundredths(&json!("-0.5")), Err(DecimalError::Negative));
        assert_eq!(parse_hundredths(&json!("1.234")), Err(DecimalError::TooPrecise));
        assert_eq!(parse_hundredths(&json!("abc")), Err(DecimalError::NotNumeric));
        assert_eq!(parse_hundredths(&json!("")), Err(DecimalError::NotNumeric));
        assert_eq!(parse_hundredths(&json!(".")), Err(DecimalError::NotNumeric));
        assert_eq!(parse_hundredths(&json!(true)), Err(DecimalError::NotNumeric));
    }

    #[test]
    fn formats_two_places() {
        assert_eq!(format_hundredths(0), "0.00");
        assert_eq!(format_hundredths(5), "0.05");
        assert_eq!(format_hundredths(150_050), "1500.50");
        assert_eq!(format_hundredths(-250), "-2.50");
    }
}
