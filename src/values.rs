/// Boolean tokens (case-insensitive)
const TRUE_TOKENS: &[&str] = &["true", "yes", "y", "1", "t"];
const FALSE_TOKENS: &[&str] = &["false", "no", "n", "0", "f"];

/// Missing value tokens
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "na", "n/a", "NULL", "null", "NaN", "nan", ".", "-", "--", "missing",
    "MISSING", "None", "none", "#N/A", "#VALUE!", "#REF!", "#DIV/0!", "#NUM!", "#NAME?", "#NULL!",
];

/// Check if a value is a missing token
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    MISSING_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// Parse a numeric cell. Missing tokens, unparseable text and NaN all read as `None`.
pub fn parse_numeric(value: &str) -> Option<f64> {
    if is_missing(value) {
        return None;
    }
    value.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a flag cell written either as a boolean token or as a number.
///
/// Numbers are true only when exactly 1, matching how the extract encodes flags.
pub fn parse_flag(value: &str) -> Option<bool> {
    if is_missing(value) {
        return None;
    }
    let lower = value.trim().to_lowercase();
    if TRUE_TOKENS.contains(&lower.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&lower.as_str()) {
        Some(false)
    } else {
        parse_numeric(&lower).map(|n| n == 1.0)
    }
}

/// Parse an identifier column (integers, possibly written as `123.0` by upstream tools).
pub fn parse_id(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Some(id);
    }
    let float = parse_numeric(trimmed)?;
    if float.fract() == 0.0 && float.is_finite() {
        Some(float as i64)
    } else {
        None
    }
}

/// Render an optional number for a CSV cell; `None` becomes an empty cell.
pub fn format_numeric(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
