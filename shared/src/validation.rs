//! Validation utilities for request parameters

// ============================================================================
// Search Term Validations
// ============================================================================

pub const MAX_QUERY_CHARS: usize = 100;

/// Validate a free-text search query
pub fn validate_search_query(query: &str) -> Result<&str, &'static str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err("Search query is required");
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err("Search query is too long");
    }
    Ok(trimmed)
}

/// Escape `LIKE` wildcards so user input matches literally
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Wrap a term for substring matching
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// Wrap a term for prefix matching
pub fn prefix_pattern(term: &str) -> String {
    format!("{}%", escape_like(term))
}

// ============================================================================
// Numeric Parameter Validations
// ============================================================================

/// Validate a low stock threshold
pub fn validate_threshold(threshold: i64) -> Result<i64, &'static str> {
    if !(0..=100_000).contains(&threshold) {
        return Err("Threshold must be between 0 and 100000");
    }
    Ok(threshold)
}

/// Validate a look-back window in days
pub fn validate_days(days: i64) -> Result<i64, &'static str> {
    if !(1..=3650).contains(&days) {
        return Err("Days must be between 1 and 3650");
    }
    Ok(days)
}

/// Parse an optional integer parameter, falling back to `default` when absent
pub fn parse_optional_int(value: Option<&str>, default: i64) -> Result<i64, &'static str> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse::<i64>().map_err(|_| "Expected a whole number"),
    }
}

/// Interpret common truthy query values (`1`, `true`, `yes`, `on`)
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}
