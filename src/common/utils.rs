//! Utility functions for minielect

use rand::RngCore;
use std::time::Duration;

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| crate::Error::InvalidConfig(format!("missing duration unit: {}", s)))?;
    let (num_str, unit) = s.split_at(split);

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let secs = |factor: u64| {
        num.checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| crate::Error::InvalidConfig(format!("duration out of range: {}", s)))
    };

    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        "s" => Ok(Duration::from_secs(num)),
        "m" => secs(60),
        "h" => secs(3600),
        _ => Err(crate::Error::InvalidConfig(format!(
            "unknown duration unit: {}",
            unit
        ))),
    }
}

/// Whole milliseconds in `d`, as stored in [`ElectionConfig`](crate::ElectionConfig)
pub fn duration_to_millis(d: Duration) -> crate::Result<u64> {
    u64::try_from(d.as_millis())
        .map_err(|_| crate::Error::InvalidConfig(format!("duration too large: {:?}", d)))
}

/// Random hex identity, `len` bytes of entropy (`2 * len` characters)
pub fn random_identity(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration(" 1h ").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("7d").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(matches!(
            parse_duration("18446744073709551615h"),
            Err(crate::Error::InvalidConfig(_))
        ));
        assert!(matches!(
            parse_duration("18446744073709551615m"),
            Err(crate::Error::InvalidConfig(_))
        ));
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_duration_to_millis() {
        assert_eq!(duration_to_millis(Duration::from_secs(3)).unwrap(), 3_000);
        assert!(matches!(
            duration_to_millis(Duration::from_secs(u64::MAX)),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_random_identity() {
        let a = random_identity(5);
        let b = random_identity(5);
        assert_eq!(a.len(), 10);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
