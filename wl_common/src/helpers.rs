use std::str::FromStr;

/// Parse a numeric (or any `FromStr`) setting. Missing or unparseable values fall back to `default`.
///
/// The second element of the result is false when a value was supplied but could not be parsed, so that callers can
/// log a warning about it.
pub fn parse_or_default<T: FromStr>(value: Option<String>, default: T) -> (T, bool) {
    match value {
        None => (default, true),
        Some(s) => match s.trim().parse::<T>() {
            Ok(v) => (v, true),
            Err(_) => (default, false),
        },
    }
}
