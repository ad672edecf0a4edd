use std::fmt;

/// Money is represented as integer cents (minor units) across the whole ledger.
/// For THB, 1 baht = 100 satang, so ฿50.00 = 5000 cents.
pub type Cents = i64;

/// Absolute tolerance, in major units, applied when comparing an amount read
/// off a slip against the amount due.
pub const AMOUNT_TOLERANCE: f64 = 0.001;

/// Format cents as a human-readable amount string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.strip_prefix('-').unwrap_or(input);

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if units_str.is_empty() && decimal_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    // Digits only on both sides, so the fraction can be sliced by byte.
    if !units_str.bytes().chain(decimal_str.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or truncate the fractional part to 2 digits
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => {
            decimal_str
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        _ => decimal_str[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::InvalidFormat)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert a real-valued major-unit amount (as reported by the slip oracle)
/// into cents, rounding to the nearest cent.
pub fn cents_from_amount(amount: f64) -> Cents {
    (amount * 100.0).round() as Cents
}

/// Convert cents back to a real-valued major-unit amount.
pub fn cents_to_amount(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

/// Split `total` evenly across `count` shares, flooring to the cent.
/// Returns 0 when there is nobody to split across.
pub fn split_evenly(total: Cents, count: usize) -> Cents {
    if count == 0 {
        return 0;
    }
    total.max(0) / count as Cents
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-5000), "-50.00");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50.00"), Ok(5000));
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents("-50.00"), Ok(-5000));
        assert_eq!(parse_cents("100.999"), Ok(10099)); // Truncates
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("").is_err());
        assert!(parse_cents(".").is_err());
        assert!(parse_cents("1.€5").is_err());
        assert!(parse_cents("1.-5").is_err());
        assert!(parse_cents("1.+5").is_err());
        assert!(parse_cents("+1.50").is_err());
        assert!(parse_cents("--5").is_err());
        assert!(parse_cents("1. 5").is_err());
    }

    #[test]
    fn test_cents_from_amount_rounds_to_nearest_cent() {
        assert_eq!(cents_from_amount(100.0), 10000);
        assert_eq!(cents_from_amount(100.0005), 10000);
        assert_eq!(cents_from_amount(99.999), 10000);
        assert_eq!(cents_from_amount(99.0), 9900);
        assert_eq!(cents_from_amount(0.0), 0);
    }

    #[test]
    fn test_split_evenly_floors() {
        assert_eq!(split_evenly(30000, 3), 10000);
        assert_eq!(split_evenly(10000, 3), 3333);
        assert_eq!(split_evenly(10000, 1), 10000);
        assert_eq!(split_evenly(10000, 0), 0);
    }
}
