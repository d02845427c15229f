//! Display formatting for report cells

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Placeholder for an optional field that was never filled in
pub const MISSING: &str = "N/A";

/// Placeholder for a cross-table lookup that exhausted every fallback
pub const NOT_AVAILABLE: &str = "Not Available";

/// Maximum characters of free text shown in a report cell
pub const REASON_DISPLAY_CHARS: usize = 50;

pub const DISPLAY_DATE_FORMAT: &str = "%b %d, %Y";

/// Format money as `<symbol>1,234.50`
pub fn format_currency(value: Decimal, symbol: &str) -> String {
    let rounded = value.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let plain = format!("{:.2}", rounded.abs());
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));
    format!("{}{}{}.{}", sign, symbol, group_thousands(whole), fraction)
}

/// Insert `,` between groups of three digits
pub fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_quantity(value: i64) -> String {
    if value < 0 {
        format!("-{}", group_thousands(&value.unsigned_abs().to_string()))
    } else {
        group_thousands(&value.to_string())
    }
}

pub fn format_date(at: NaiveDateTime) -> String {
    at.format(DISPLAY_DATE_FORMAT).to_string()
}

/// Cut text to `max_chars` characters, appending `...` when shortened
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Optional text, or `N/A` when absent or blank
pub fn or_missing(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => MISSING.to_string(),
    }
}

/// Badge markup rendered by the browser table
pub fn badge(label: &str, tone: &str) -> String {
    format!("<span class=\"badge bg-{}\">{}</span>", tone, label)
}

/// Escape text for inclusion in HTML markup
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_currency_groups_and_rounds() {
        let value = Decimal::from_str("1234567.456").unwrap();
        assert_eq!(format_currency(value, "₱"), "₱1,234,567.46");
        assert_eq!(format_currency(Decimal::ZERO, "₱"), "₱0.00");
        assert_eq!(format_currency(Decimal::from(-950), "$"), "-$950.00");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let reason = "é".repeat(60);
        let cut = truncate_text(&reason, REASON_DISPLAY_CHARS);
        assert_eq!(cut.chars().count(), REASON_DISPLAY_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_text("short", REASON_DISPLAY_CHARS), "short");
    }

    #[test]
    fn test_placeholders_are_distinct() {
        assert_eq!(or_missing(Some("  ")), "N/A");
        assert_eq!(or_missing(None), "N/A");
        assert_ne!(MISSING, NOT_AVAILABLE);
        assert_eq!(or_missing(Some("INV-1")), "INV-1");
    }

    #[test]
    fn test_quantity_grouping() {
        assert_eq!(format_quantity(1_000), "1,000");
        assert_eq!(format_quantity(-12_345), "-12,345");
        assert_eq!(format_quantity(7), "7");
    }
}
