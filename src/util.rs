// Utility helpers for parsing and basic statistics.
//
// This module centralizes the "dirty" cell handling so the rest of the code
// can assume clean, typed values.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Storage format for occurrence timestamps; SQLite's `strftime` reads it.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 10] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
];

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Returns the trimmed cell, or `None` when it is absent or blank.
pub fn non_blank(s: Option<&str>) -> Option<&str> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse a cell into `f64`, stripping thousands separators.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = non_blank(s)?;
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok()
}

/// Parse a cell into `i64`. Whole floats such as `"3.0"` are accepted
/// because spreadsheet exports often widen integer columns.
pub fn parse_i64_safe(s: Option<&str>) -> Option<i64> {
    let s = non_blank(s)?;
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Some(v as i64),
        _ => None,
    }
}

/// Parse an occurrence timestamp. Values carrying a UTC offset keep their
/// local wall-clock time; a bare date means midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Some(ts.naive_local());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Zero-equivalent timestamp used when the occurrence date is missing.
pub fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn average(v: &[f64]) -> f64 {
    // Returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 below two values.
pub fn std_dev(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = average(v);
    let ss: f64 = v.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (v.len() - 1) as f64).sqrt()
}

/// Percentage change of each value against the one before it.
///
/// The first entry has no predecessor and a zero predecessor would divide
/// by zero; both resolve to 0.
pub fn pct_change(values: &[i64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<i64> = None;
    for &cur in values {
        let change = match prev {
            Some(p) if p != 0 => (cur - p) as f64 / p as f64 * 100.0,
            _ => 0.0,
        };
        out.push(if change.is_finite() { change } else { 0.0 });
        prev = Some(cur);
    }
    out
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234.56`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
