use std::fmt;

/// Amounts are plain doubles expressed in the trip's home currency.
/// Shares are produced by division, so values are never exact; comparisons
/// against zero go through [`SETTLED_EPSILON`].
pub type Amount = f64;

/// Balances within this distance of zero (inclusive) count as settled.
pub const SETTLED_EPSILON: Amount = 0.01;

/// Returns true if the amount is within [`SETTLED_EPSILON`] of zero,
/// boundary included.
pub fn is_settled(amount: Amount) -> bool {
    amount.abs() <= SETTLED_EPSILON
}

/// Format an amount with two decimals and `,` thousands separators.
/// Example: 1234.5 -> "1,234.50", -0.004 -> "0.00"
pub fn format_amount(amount: Amount) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (units, decimals) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = amount < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    let sign = if negative { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, decimals)
}

/// Parse a user-supplied amount. Thousands separators are accepted.
/// Example: "1,250.75" -> 1250.75, "50" -> 50.0
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let value: Amount = cleaned
        .parse()
        .map_err(|_| ParseAmountError::InvalidFormat(input.trim().to_string()))?;

    if !value.is_finite() {
        return Err(ParseAmountError::NotFinite);
    }
    Ok(value)
}

/// Lenient variant of [`parse_amount`] for rows read back from a sheet:
/// anything that does not parse counts as zero.
pub fn coerce_amount(input: &str) -> Amount {
    parse_amount(input).unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat(String),
    NotFinite,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is empty"),
            ParseAmountError::InvalidFormat(raw) => write!(f, "invalid amount format: '{}'", raw),
            ParseAmountError::NotFinite => write!(f, "amount must be a finite number"),
        }
    }
}

impl std::error::Error for ParseAmountError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(50.0), "50.00");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(1_000_000.0), "1,000,000.00");
        assert_eq!(format_amount(999.999), "1,000.00");
        assert_eq!(format_amount(-12.346), "-12.35");
        assert_eq!(format_amount(-1500.0), "-1,500.00");
    }

    #[test]
    fn test_format_amount_negative_zero() {
        assert_eq!(format_amount(-0.0), "0.00");
        assert_eq!(format_amount(-0.004), "0.00");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50"), Ok(50.0));
        assert_eq!(parse_amount("12.5"), Ok(12.5));
        assert_eq!(parse_amount(" 1,250.75 "), Ok(1250.75));
        assert_eq!(parse_amount("-20"), Ok(-20.0));
        assert_eq!(parse_amount(".5"), Ok(0.5));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), Err(ParseAmountError::Empty));
        assert_eq!(parse_amount("   "), Err(ParseAmountError::Empty));
        assert!(matches!(
            parse_amount("abc"),
            Err(ParseAmountError::InvalidFormat(_))
        ));
        assert!(parse_amount("12.34.56").is_err());
        assert_eq!(parse_amount("inf"), Err(ParseAmountError::NotFinite));
        assert_eq!(parse_amount("NaN"), Err(ParseAmountError::NotFinite));
    }

    #[test]
    fn test_coerce_amount() {
        assert_eq!(coerce_amount("300"), 300.0);
        assert_eq!(coerce_amount("n/a"), 0.0);
        assert_eq!(coerce_amount(""), 0.0);
    }

    #[test]
    fn test_is_settled() {
        assert!(is_settled(0.0));
        assert!(is_settled(0.009));
        assert!(is_settled(-0.009));
        assert!(is_settled(0.01));
        assert!(is_settled(-0.01));
        assert!(!is_settled(0.011));
        assert!(!is_settled(-5.0));
    }
}
