//! Human-readable currency amount parsing and token unit conversion.
//!
//! [`MoneyAmount`] parses strings like `"1.50"`, `"$4.02"`, or `"10 USDC"`
//! into a precise decimal. [`convert_to_token_amount`] and
//! [`convert_from_token_amount`] shift between decimal strings and atomic
//! token units using pure string arithmetic, so no floating-point error can
//! creep into an on-chain amount.

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

/// A parsed monetary amount with decimal precision.
///
/// Preserves the precision of the original input; `scale()` is the number of
/// decimal places and `mantissa()` the value with the point removed, so
/// `"10.50"` has scale 2 and mantissa 1050.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

impl MoneyAmount {
    /// Returns the number of decimal places in the parsed value.
    #[must_use]
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Returns the value as an unsigned integer with the point removed.
    #[must_use]
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }
}

mod bounds {
    use super::*;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));

/// Errors that can occur when parsing a monetary amount.
#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    /// The input could not be parsed as a number.
    #[error("Invalid number format")]
    InvalidFormat,
    /// The value is outside the allowed range.
    #[error("Amount must be between {} and {}", bounds::MIN_STR, bounds::MAX_STR)]
    OutOfRange,
    /// Negative values are not allowed.
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too much precision: {money} decimals vs {token} on token")]
    WrongPrecision {
        /// Decimal places in the input.
        money: u32,
        /// Decimal places supported by the token.
        token: u32,
    },
}

impl MoneyAmount {
    /// Parses a human-readable currency string.
    ///
    /// Currency symbols (`$`), code suffixes (`USD`, `USDC`), thousand
    /// separators, and whitespace are stripped before parsing.
    ///
    /// # Errors
    ///
    /// Returns an error for non-numeric input, negative values, and values
    /// outside the allowed range.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = NON_NUMERIC.replace_all(input, "").to_string();

        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < *bounds::MIN || parsed > *bounds::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }

        Ok(Self(parsed))
    }

    /// Converts this amount into atomic token units for a token with the
    /// given number of decimals.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError::WrongPrecision`] if the amount has
    /// more decimal places than the token supports.
    pub fn as_token_amount(&self, decimals: u32) -> Result<String, MoneyAmountParseError> {
        if self.scale() > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: self.scale(),
                token: decimals,
            });
        }
        convert_to_token_amount(&self.0.to_string(), decimals)
            .map_err(|_| MoneyAmountParseError::InvalidFormat)
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl From<u64> for MoneyAmount {
    fn from(value: u64) -> Self {
        Self(Decimal::from(value))
    }
}

impl TryFrom<f64> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::from_f64(value).ok_or(MoneyAmountParseError::OutOfRange)?;
        if decimal.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if decimal < *bounds::MIN || decimal > *bounds::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(Self(decimal))
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Error returned by the decimal-string shift conversions.
#[derive(Debug, thiserror::Error)]
pub enum TokenAmountError {
    /// The input is not a non-negative decimal number.
    #[error("not a decimal number: {0}")]
    NotDecimal(String),
    /// The input carries more fractional digits than the token supports.
    #[error("precision {got} exceeds token decimals {decimals}")]
    TooPrecise {
        /// Fractional digits in the input.
        got: usize,
        /// Decimals the token supports.
        decimals: u32,
    },
}

/// Shifts a decimal string into atomic token units.
///
/// Splits on the decimal point, right-pads the fraction to `decimals`
/// digits, and concatenates. No intermediate numeric type is involved, so
/// there is no precision loss at any magnitude.
///
/// ```
/// use pay402::amount::convert_to_token_amount;
///
/// assert_eq!(convert_to_token_amount("1.50", 6).unwrap(), "1500000");
/// assert_eq!(convert_to_token_amount("0.000001", 6).unwrap(), "1");
/// ```
///
/// # Errors
///
/// Rejects non-decimal input and fractions longer than `decimals`.
pub fn convert_to_token_amount(value: &str, decimals: u32) -> Result<String, TokenAmountError> {
    let value = value.trim();
    let (integral, fraction) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    if integral.is_empty() && fraction.is_empty() {
        return Err(TokenAmountError::NotDecimal(value.to_owned()));
    }
    let integral = if integral.is_empty() { "0" } else { integral };
    if !integral.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(TokenAmountError::NotDecimal(value.to_owned()));
    }
    if fraction.len() > decimals as usize {
        // Trailing zeros beyond the token's precision are harmless.
        let (keep, drop) = fraction.split_at(decimals as usize);
        if drop.bytes().any(|b| b != b'0') {
            return Err(TokenAmountError::TooPrecise {
                got: fraction.len(),
                decimals,
            });
        }
        return convert_to_token_amount(&format!("{integral}.{keep}"), decimals);
    }

    let mut digits = String::with_capacity(integral.len() + decimals as usize);
    digits.push_str(integral);
    digits.push_str(fraction);
    for _ in fraction.len()..decimals as usize {
        digits.push('0');
    }
    let trimmed = digits.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    })
}

/// Shifts an atomic token amount back into a normalized decimal string.
///
/// The inverse of [`convert_to_token_amount`]: trailing fractional zeros and
/// the decimal point itself are dropped when not needed.
///
/// ```
/// use pay402::amount::convert_from_token_amount;
///
/// assert_eq!(convert_from_token_amount("1500000", 6).unwrap(), "1.5");
/// assert_eq!(convert_from_token_amount("1", 6).unwrap(), "0.000001");
/// ```
///
/// # Errors
///
/// Rejects input that is not a plain non-negative integer string.
pub fn convert_from_token_amount(value: &str, decimals: u32) -> Result<String, TokenAmountError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenAmountError::NotDecimal(value.to_owned()));
    }
    let digits = value.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let decimals = decimals as usize;
    let (integral, fraction) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (&digits[..split], &digits[split..])
    } else {
        ("0", digits)
    };
    let mut fraction_padded = String::with_capacity(decimals);
    for _ in 0..decimals.saturating_sub(fraction.len()) {
        fraction_padded.push('0');
    }
    fraction_padded.push_str(fraction);
    let fraction_trimmed = fraction_padded.trim_end_matches('0');

    Ok(if fraction_trimmed.is_empty() {
        integral.to_owned()
    } else {
        format!("{integral}.{fraction_trimmed}")
    })
}
