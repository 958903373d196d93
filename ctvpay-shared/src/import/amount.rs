/// Salary amount normalization for spreadsheet imports
///
/// Amounts arrive in thousands with a comma as the decimal separator
/// (`"150,5"` means 150 500). Normalization replaces the comma with a period,
/// parses the value, scales it and rounds to the nearest whole unit.

/// Default multiplier applied to spreadsheet amounts
pub const DEFAULT_AMOUNT_SCALE: i64 = 1000;

/// Why an amount was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount has more than one comma")]
    MultipleCommas,

    #[error("amount is not a number")]
    NotANumber,

    #[error("amount is negative")]
    Negative,

    #[error("amount is too large")]
    Overflow,
}

/// Parses a raw spreadsheet amount and applies `scale`
///
/// ```
/// use ctvpay_shared::import::amount::normalize_amount;
///
/// assert_eq!(normalize_amount("150,5", 1000), Ok(150_500));
/// assert_eq!(normalize_amount("200", 1000), Ok(200_000));
/// assert!(normalize_amount("1,2,3", 1000).is_err());
/// ```
pub fn normalize_amount(raw: &str, scale: i64) -> Result<i64, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    if trimmed.matches(',').count() > 1 {
        return Err(AmountError::MultipleCommas);
    }

    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| AmountError::NotANumber)?;

    if !value.is_finite() {
        return Err(AmountError::NotANumber);
    }

    if value < 0.0 {
        return Err(AmountError::Negative);
    }

    let scaled = (value * scale as f64).round();
    if !scaled.is_finite() || scaled >= i64::MAX as f64 {
        return Err(AmountError::Overflow);
    }

    Ok(scaled as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_comma() {
        assert_eq!(normalize_amount("150,5", 1000), Ok(150_500));
        assert_eq!(normalize_amount(" 0,25 ", 1000), Ok(250));
    }

    #[test]
    fn test_integer_and_period() {
        assert_eq!(normalize_amount("200", 1000), Ok(200_000));
        assert_eq!(normalize_amount("12.75", 1000), Ok(12_750));
        assert_eq!(normalize_amount("0", 1000), Ok(0));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(normalize_amount("1,0006", 1000), Ok(1001));
        assert_eq!(normalize_amount("0,0004", 1000), Ok(0));
    }

    #[test]
    fn test_custom_scale() {
        assert_eq!(normalize_amount("3,5", 1), Ok(4));
        assert_eq!(normalize_amount("42", 1), Ok(42));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(normalize_amount("abc", 1000), Err(AmountError::NotANumber));
        assert_eq!(normalize_amount("1,2,3", 1000), Err(AmountError::MultipleCommas));
        assert_eq!(normalize_amount("", 1000), Err(AmountError::Empty));
        assert_eq!(normalize_amount("   ", 1000), Err(AmountError::Empty));
        assert_eq!(normalize_amount("-5", 1000), Err(AmountError::Negative));
        assert_eq!(normalize_amount("NaN", 1000), Err(AmountError::NotANumber));
        assert_eq!(normalize_amount("inf", 1000), Err(AmountError::NotANumber));
        assert_eq!(normalize_amount("1e300", 1000), Err(AmountError::Overflow));
    }

    #[test]
    fn test_trailing_text_rejected() {
        assert_eq!(normalize_amount("150 VND", 1000), Err(AmountError::NotANumber));
        assert_eq!(normalize_amount("150,5k", 1000), Err(AmountError::NotANumber));
        assert_eq!(normalize_amount("VND 150", 1000), Err(AmountError::NotANumber));
    }
}
