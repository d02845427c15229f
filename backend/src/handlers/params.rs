//! Helpers for raw query-string parameters
//!
//! Search and export accept `filters[column]=value` pairs, which do not map
//! onto a fixed struct, so those handlers take the raw pair list.

use shared::{parse_optional_int, validate_days};

use crate::error::{AppError, AppResult};

/// Raw `key=value` pairs in request order
pub type RawParams = Vec<(String, String)>;

/// First value for `key`, blank treated as absent
pub fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// First value for `key`, or a missing parameter error
pub fn required<'a>(pairs: &'a [(String, String)], key: &str) -> AppResult<&'a str> {
    param(pairs, key).ok_or_else(|| AppError::MissingParameter(key.to_string()))
}

/// Collect `name[column]=value` pairs as `(column, value)`
pub fn bracketed(pairs: &[(String, String)], name: &str) -> Vec<(String, String)> {
    let prefix = format!("{}[", name);
    pairs
        .iter()
        .filter_map(|(k, v)| {
            let column = k.strip_prefix(&prefix)?.strip_suffix(']')?;
            if column.is_empty() {
                None
            } else {
                Some((column.to_string(), v.clone()))
            }
        })
        .collect()
}

/// Integer parameter with a default, reported by name when malformed
pub fn int_param(value: Option<&str>, name: &str, default: i64) -> AppResult<i64> {
    parse_optional_int(value, default).map_err(|e| AppError::ValidationError(format!("{}: {}", name, e)))
}

/// Look-back window in days
pub fn days_param(value: Option<&str>, default: i64) -> AppResult<i64> {
    let days = int_param(value, "days", default)?;
    validate_days(days).map_err(|e| AppError::ValidationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> RawParams {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bracketed_filters() {
        let raw = pairs(&[
            ("table", "toner_master"),
            ("filters[toner_model]", "TN-2380"),
            ("filters[]", "ignored"),
            ("filters[id]", "4"),
        ]);
        assert_eq!(
            bracketed(&raw, "filters"),
            vec![
                ("toner_model".to_string(), "TN-2380".to_string()),
                ("id".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_params_are_absent() {
        let raw = pairs(&[("q", "  "), ("limit", "5")]);
        assert_eq!(param(&raw, "q"), None);
        assert!(matches!(required(&raw, "q"), Err(AppError::MissingParameter(_))));
        assert_eq!(int_param(param(&raw, "limit"), "limit", 10).unwrap(), 5);
    }

    #[test]
    fn test_days_bounds() {
        assert_eq!(days_param(None, 30).unwrap(), 30);
        assert!(days_param(Some("0"), 30).is_err());
        assert!(days_param(Some("abc"), 30).is_err());
    }
}
