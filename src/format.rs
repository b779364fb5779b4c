//! Display formatting for token amounts

/// Seconds in the 30-day month used for flow-rate display
pub const SECONDS_PER_MONTH: u128 = 30 * 24 * 3600;

/// Render smallest units as a decimal string
///
/// Truncates (never rounds up) to `precision` fractional digits and trims
/// trailing zeros.
pub fn format_units(amount: u128, decimals: u8, precision: u8) -> String {
    let Some(scale) = 10u128.checked_pow(decimals as u32) else {
        return amount.to_string();
    };

    let whole = amount / scale;
    let fraction = amount % scale;

    if decimals == 0 || precision == 0 {
        return whole.to_string();
    }

    let digits = format!("{:0width$}", fraction, width = decimals as usize);
    let shown = &digits[..precision.min(decimals) as usize];
    let shown = shown.trim_end_matches('0');

    if shown.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, shown)
    }
}

/// Amount streamed over a 30-day month at `rate_per_sec`
pub fn flow_rate_per_month(rate_per_sec: u128) -> u128 {
    rate_per_sec.saturating_mul(SECONDS_PER_MONTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_000_050, 6, 6), "1.00005");
        assert_eq!(format_units(1_000_050, 6, 2), "1");
        assert_eq!(format_units(1_999_999, 6, 2), "1.99");
        assert_eq!(format_units(42, 0, 4), "42");
        assert_eq!(format_units(5, 18, 18), "0.000000000000000005");
        assert_eq!(format_units(0, 18, 4), "0");
    }

    #[test]
    fn test_flow_rate_per_month() {
        assert_eq!(flow_rate_per_month(1), 2_592_000);
        assert_eq!(flow_rate_per_month(385_802), 999_998_784_000);
        assert_eq!(flow_rate_per_month(u128::MAX), u128::MAX);
    }
}
