//! Local input validation
//!
//! User-entered amounts and fund parameters are checked before any network
//! or contract call is attempted. Invalid input is rejected with a message
//! suitable for display; it is never silently coerced.

use thiserror::Error;

/// Highest management fee, in basis points
pub const MAX_FEE_BPS: u32 = 10_000;

/// Errors produced by input validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter an amount")]
    EmptyAmount,

    #[error("Amount must be a positive number")]
    InvalidAmount,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount has more than {0} decimal places")]
    TooPrecise(u8),

    #[error("Amount is too large")]
    Overflow,

    #[error("Amount exceeds your balance")]
    InsufficientBalance,

    #[error("Fund name must be 1-{0} characters")]
    InvalidName(usize),

    #[error("Fund symbol must be 1-{0} letters or digits")]
    InvalidSymbol(usize),

    #[error("Not a valid address: {0}")]
    InvalidAddress(String),

    #[error("Fee cannot exceed 100%")]
    FeeTooHigh,
}

/// Parse a decimal token amount into smallest units
///
/// `"1.5"` with 6 decimals is `1_500_000`.
pub fn parse_token_amount(input: &str, decimals: u8) -> Result<u128, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::EmptyAmount);
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };

    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(ValidationError::InvalidAmount);
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(ValidationError::TooPrecise(decimals));
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or(ValidationError::Overflow)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| ValidationError::Overflow)?
            .checked_mul(scale)
            .ok_or(ValidationError::Overflow)?
    };
    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse::<u128>().map_err(|_| ValidationError::Overflow)?
    };

    let amount = whole_units
        .checked_add(fraction_units)
        .ok_or(ValidationError::Overflow)?;

    if amount == 0 {
        return Err(ValidationError::ZeroAmount);
    }

    Ok(amount)
}

/// Validate an investment against the investor's balance
pub fn validate_investment(
    input: &str,
    decimals: u8,
    balance: u128,
) -> Result<u128, ValidationError> {
    let amount = parse_token_amount(input, decimals)?;
    if amount > balance {
        return Err(ValidationError::InsufficientBalance);
    }
    Ok(amount)
}

/// Check an EVM address (`0x` + 40 hex digits)
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"));

    match hex {
        Some(hex) if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) => Ok(()),
        _ => Err(ValidationError::InvalidAddress(address.to_string())),
    }
}

/// Parameters for creating a fund
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundParams {
    pub name: String,
    pub symbol: String,
    pub manager: String,
    /// Management fee in basis points
    pub fee_bps: u32,
}

impl FundParams {
    pub const MAX_NAME_LEN: usize = 64;
    pub const MAX_SYMBOL_LEN: usize = 11;

    /// Check every field, reporting the first problem
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > Self::MAX_NAME_LEN {
            return Err(ValidationError::InvalidName(Self::MAX_NAME_LEN));
        }

        let symbol = self.symbol.trim();
        if symbol.is_empty()
            || symbol.len() > Self::MAX_SYMBOL_LEN
            || !symbol.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidSymbol(Self::MAX_SYMBOL_LEN));
        }

        validate_address(&self.manager)?;

        if self.fee_bps > MAX_FEE_BPS {
            return Err(ValidationError::FeeTooHigh);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amounts() {
        assert_eq!(parse_token_amount("1", 6), Ok(1_000_000));
        assert_eq!(parse_token_amount("1.5", 6), Ok(1_500_000));
        assert_eq!(parse_token_amount(" 0.000001 ", 6), Ok(1));
        assert_eq!(parse_token_amount(".25", 2), Ok(25));
        assert_eq!(parse_token_amount("2.50", 1), Ok(25));
        assert_eq!(parse_token_amount("3", 0), Ok(3));
    }

    #[test]
    fn test_rejects_bad_amounts() {
        assert_eq!(parse_token_amount("", 6), Err(ValidationError::EmptyAmount));
        assert_eq!(parse_token_amount("-1", 6), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_token_amount("1e5", 6), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_token_amount(".", 6), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_token_amount("1.2.3", 6), Err(ValidationError::InvalidAmount));
        assert_eq!(parse_token_amount("0.0", 6), Err(ValidationError::ZeroAmount));
        assert_eq!(
            parse_token_amount("0.0000001", 6),
            Err(ValidationError::TooPrecise(6))
        );
        assert_eq!(
            parse_token_amount("999999999999999999999999999999999999999", 18),
            Err(ValidationError::Overflow)
        );
    }

    #[test]
    fn test_investment_against_balance() {
        assert_eq!(validate_investment("1", 6, 1_000_000), Ok(1_000_000));
        assert_eq!(
            validate_investment("1.000001", 6, 1_000_000),
            Err(ValidationError::InsufficientBalance)
        );
    }

    #[test]
    fn test_fund_params() {
        let params = FundParams {
            name: "Alpha Fund".into(),
            symbol: "ALPHA".into(),
            manager: "0x52908400098527886E0F7030069857D2E4169EE7".into(),
            fee_bps: 200,
        };
        assert!(params.validate().is_ok());

        let bad_fee = FundParams {
            fee_bps: 10_001,
            ..params.clone()
        };
        assert_eq!(bad_fee.validate(), Err(ValidationError::FeeTooHigh));

        let bad_symbol = FundParams {
            symbol: "AL PHA".into(),
            ..params.clone()
        };
        assert!(matches!(
            bad_symbol.validate(),
            Err(ValidationError::InvalidSymbol(_))
        ));

        let bad_manager = FundParams {
            manager: "0x1234".into(),
            ..params
        };
        assert!(matches!(
            bad_manager.validate(),
            Err(ValidationError::InvalidAddress(_))
        ));
    }
}
