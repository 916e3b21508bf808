use std::str::FromStr;

use rust_decimal::Decimal;

use crate::errors::LedgerError;

/// Usernames are stored trimmed and lowercased.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn parse_u64(field: &str, raw: &str) -> Result<u64, LedgerError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| LedgerError::invalid(field, format!("{raw:?} is not a whole number: {e}")))
}

pub fn parse_u32(field: &str, raw: &str) -> Result<u32, LedgerError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|e| LedgerError::invalid(field, format!("{raw:?} is not a whole number: {e}")))
}

pub fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| LedgerError::invalid(field, format!("{raw:?} is not a number: {e}")))
}

/// Reads an optional percentage share. Blank, zero and negative values mean
/// "no share" and come back as `None`.
pub fn parse_percent(field: &str, raw: &str) -> Result<Option<u32>, LedgerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let pct = raw
        .parse::<i64>()
        .map_err(|e| LedgerError::invalid(field, format!("{raw:?} is not a whole number: {e}")))?;
    if pct <= 0 {
        return Ok(None);
    }
    u32::try_from(pct)
        .map(Some)
        .map_err(|_| LedgerError::invalid(field, format!("{pct} is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn usernames_are_trimmed_and_lowercased() {
        assert_eq!(normalize_username("  Albert  "), "albert");
        assert_eq!(normalize_username("\tJULI\n"), "juli");
        assert_eq!(normalize_username("   "), "");
    }

    #[test]
    fn numeric_fields_parse_or_name_the_field() {
        assert_eq!(parse_u64("size", " 30000 ").unwrap(), 30000);
        assert_eq!(parse_u32("term", "30").unwrap(), 30);
        assert_eq!(parse_decimal("rate", "1.49").unwrap(), dec!(1.49));

        match parse_u64("size", "thirty") {
            Err(LedgerError::InvalidInput { field, .. }) => assert_eq!(field, "size"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_u32("term", "-3").is_err());
        assert!(parse_decimal("rate", "1,49").is_err());
    }

    #[test]
    fn percentages_skip_blank_and_non_positive() {
        assert_eq!(parse_percent("percent_albert", "40").unwrap(), Some(40));
        assert_eq!(parse_percent("percent_albert", "").unwrap(), None);
        assert_eq!(parse_percent("percent_albert", "0").unwrap(), None);
        assert_eq!(parse_percent("percent_albert", "-10").unwrap(), None);
        assert!(parse_percent("percent_albert", "forty").is_err());
        assert!(parse_percent("percent_albert", "12.5").is_err());
    }
}
