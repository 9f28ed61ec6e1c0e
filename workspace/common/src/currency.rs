use rusty_money::iso;

/// Returns true when `code` is a known ISO 4217 currency code.
/// The lookup is case sensitive; codes are stored upper case.
pub fn is_iso_currency(code: &str) -> bool {
    code.len() == 3 && iso::find(code).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert!(is_iso_currency("USD"));
        assert!(is_iso_currency("EUR"));
        assert!(is_iso_currency("CZK"));
    }

    #[test]
    fn unknown_or_malformed_codes() {
        assert!(!is_iso_currency("usd"));
        assert!(!is_iso_currency("XYZ"));
        assert!(!is_iso_currency("US"));
        assert!(!is_iso_currency("USDT"));
    }
}
