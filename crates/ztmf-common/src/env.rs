//! Typed lookups over process environment variables.
//!
//! Blank values are treated the same as unset ones, so an `.env` file with
//! `DB_PASS=` falls back to the default instead of producing an empty string.

use crate::error::{Result, ZtmfError};
use std::str::FromStr;

/// Value of `name`, trimmed, or `None` when unset or blank.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

/// First non-blank value among `names`, checked in order.
pub fn first_of(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| var(name))
}

pub fn required(name: &str) -> Result<String> {
    var(name).ok_or_else(|| ZtmfError::MissingEnv(name.to_string()))
}

/// Parses `name` into `T`, falling back to `default` when unset.
///
/// A value that is present but unparsable is an error rather than a silent
/// fallback.
pub fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ZtmfError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
    }
}

pub fn parse_opt<T: FromStr>(name: &str) -> Result<Option<T>> {
    match var(name) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| ZtmfError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
    }
}

/// Boolean flag accepting `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn flag(name: &str, default: bool) -> Result<bool> {
    match var(name) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ZtmfError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn blank_values_count_as_unset() {
        std::env::set_var("ZTMF_TEST_BLANK", "   ");
        assert_eq!(var("ZTMF_TEST_BLANK"), None);
        assert_eq!(var_or("ZTMF_TEST_BLANK", "fallback"), "fallback");
        std::env::remove_var("ZTMF_TEST_BLANK");
    }

    #[test]
    #[serial]
    fn parse_or_rejects_garbage() {
        std::env::set_var("ZTMF_TEST_NUM", "12x");
        assert!(matches!(
            parse_or::<u32>("ZTMF_TEST_NUM", 5),
            Err(ZtmfError::InvalidEnv { .. })
        ));
        std::env::set_var("ZTMF_TEST_NUM", "12");
        assert_eq!(parse_or::<u32>("ZTMF_TEST_NUM", 5).unwrap(), 12);
        std::env::remove_var("ZTMF_TEST_NUM");
        assert_eq!(parse_or::<u32>("ZTMF_TEST_NUM", 5).unwrap(), 5);
    }

    #[test]
    #[serial]
    fn first_of_respects_order() {
        std::env::remove_var("ZTMF_TEST_A");
        std::env::set_var("ZTMF_TEST_B", "b");
        std::env::set_var("ZTMF_TEST_C", "c");
        assert_eq!(
            first_of(&["ZTMF_TEST_A", "ZTMF_TEST_B", "ZTMF_TEST_C"]).as_deref(),
            Some("b")
        );
        std::env::remove_var("ZTMF_TEST_B");
        std::env::remove_var("ZTMF_TEST_C");
    }

    #[test]
    #[serial]
    fn flag_accepts_common_spellings() {
        for (raw, expected) in [("YES", true), ("0", false), ("on", true), ("False", false)] {
            std::env::set_var("ZTMF_TEST_FLAG", raw);
            assert_eq!(flag("ZTMF_TEST_FLAG", !expected).unwrap(), expected);
        }
        std::env::set_var("ZTMF_TEST_FLAG", "maybe");
        assert!(flag("ZTMF_TEST_FLAG", false).is_err());
        std::env::remove_var("ZTMF_TEST_FLAG");
    }
}
