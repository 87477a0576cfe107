//! Built-in dynamic placeholder values

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

/// Resolves a built-in dynamic placeholder name, or `None` when the name is
/// not a built-in.
///
/// Supported names:
/// - `$guid`: a random v4 UUID
/// - `$timestamp`: current Unix time in seconds
/// - `$randomInt`: a random integer in `0..=1000`
///
/// Each occurrence produces a fresh value.
#[must_use]
pub fn resolve_builtin(name: &str) -> Option<String> {
    match name {
        "$guid" => Some(Uuid::new_v4().to_string()),
        "$timestamp" => Some(Utc::now().timestamp().to_string()),
        "$randomInt" => Some(rand::rng().random_range(0..=1000).to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_is_valid_uuid() {
        let value = resolve_builtin("$guid").unwrap();
        assert!(Uuid::parse_str(&value).is_ok());
    }

    #[test]
    fn test_timestamp_is_seconds() {
        let value = resolve_builtin("$timestamp").unwrap();
        let parsed: i64 = value.parse().unwrap();
        // Seconds, not millis: anything past 1e12 would be a millisecond clock.
        assert!(parsed > 1_600_000_000 && parsed < 1_000_000_000_000);
    }

    #[test]
    fn test_random_int_is_in_range() {
        for _ in 0..100 {
            let value = resolve_builtin("$randomInt").unwrap();
            let parsed: u32 = value.parse().unwrap();
            assert!(parsed <= 1000);
        }
    }

    #[test]
    fn test_unknown_names_are_not_builtins() {
        assert!(resolve_builtin("$unknown").is_none());
        assert!(resolve_builtin("guid").is_none());
    }
}
