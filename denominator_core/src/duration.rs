//! Duration literals in the `"1h30m"`, `"250ms"`, `"1.5s"` style.
//!
//! Configuration values and chat-rate payloads are written this way.
//! Accepted units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. A bare `"0"` is
//! zero; every other number needs a unit.

use crate::error::CoreError;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parses a duration literal.
pub fn parse_duration(literal: &str) -> Result<Duration, CoreError> {
    let s = literal.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(CoreError::invalid_duration(literal));
    }

    let mut rest = s;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(CoreError::invalid_duration(literal));
        }
        let (number, tail) = rest.split_at(number_end);

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let scale = unit_scale(unit).ok_or_else(|| CoreError::invalid_duration(literal))?;
        let nanos =
            scaled_nanos(number, scale).ok_or_else(|| CoreError::invalid_duration(literal))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| CoreError::invalid_duration(literal))?;
        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| CoreError::invalid_duration(literal))?;
    Ok(Duration::from_nanos(nanos))
}

/// Formats a duration as the shortest exact literal `parse_duration` accepts.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0".to_string();
    }
    for (unit, scale) in [
        ("h", 3600 * NANOS_PER_SEC),
        ("m", 60 * NANOS_PER_SEC),
        ("s", NANOS_PER_SEC),
        ("ms", 1_000_000),
        ("us", 1_000),
    ] {
        if nanos % scale == 0 {
            return format!("{}{}", nanos / scale, unit);
        }
    }
    format!("{}ns", nanos)
}

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

fn scaled_nanos(number: &str, scale: u128) -> Option<u128> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.checked_mul(scale)?;

    // Digits past nanosecond precision are truncated
    let mut place = scale;
    for c in frac.chars() {
        let digit = c.to_digit(10)? as u128;
        place /= 10;
        value = value.checked_add(digit * place)?;
    }
    Some(value)
}

/// Serde adapter storing a `Duration` as a literal string.
pub mod literal {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
