//! Purpose: Parse human-written sizes and durations for configuration values.
//! Exports: `parse_size`, `parse_duration`.
//! Invariants: Size suffixes K/M/G are 1024-based; durations accept ms|s|m|h.
use std::time::Duration;

use super::error::{Error, ErrorKind};

pub fn parse_size(input: &str) -> Result<u64, Error> {
    let trimmed = input.trim();
    let split = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    let digits = trimmed[..split].trim();
    let suffix = trimmed[split..].trim();

    let value: u64 = digits.parse().map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid size")
            .with_hint("Use bytes or K/M/G (e.g. 10M).")
            .with_source(err)
    })?;

    let multiplier = match suffix {
        "" => 1,
        "K" | "k" => 1024,
        "M" | "m" => 1024 * 1024,
        "G" | "g" => 1024 * 1024 * 1024,
        _ => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("invalid size suffix")
                .with_hint("Use K/M/G (e.g. 10M)."));
        }
    };

    value.checked_mul(multiplier).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("size overflow")
            .with_hint("Use a smaller size value.")
    })
}

fn invalid_duration() -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("invalid duration")
        .with_hint("Use a number plus ms|s|m|h (e.g. 50ms).")
}

pub fn parse_duration(input: &str) -> Result<Duration, Error> {
    let trimmed = input.trim();
    let Some(split) = trimmed.find(|ch: char| !ch.is_ascii_digit()) else {
        return Err(invalid_duration());
    };
    let (num_str, unit) = trimmed.split_at(split);
    if num_str.is_empty() {
        return Err(invalid_duration());
    }
    let value: u64 = num_str.parse().map_err(|_| invalid_duration())?;
    let millis = match unit {
        "ms" => value,
        "s" => value.saturating_mul(1_000),
        "m" => value.saturating_mul(60_000),
        "h" => value.saturating_mul(3_600_000),
        _ => return Err(invalid_duration()),
    };
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::{parse_duration, parse_size};
    use std::time::Duration;

    #[test]
    fn parse_size_accepts_bytes_and_kmg() {
        assert_eq!(parse_size("42").unwrap(), 42);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("2k").unwrap(), 2048);
        assert_eq!(parse_size("10M").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("4g").unwrap(), 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn parse_size_rejects_iec_suffixes_and_garbage() {
        assert!(parse_size("1MiB").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("99999999999999999999G").is_err());
    }

    #[test]
    fn parse_duration_accepts_ms_s_m_h() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parse_duration_rejects_bare_numbers_and_units() {
        for input in ["", "10", "ms", "5d", "-1s"] {
            assert!(parse_duration(input).is_err(), "input {input:?}");
        }
    }
}
