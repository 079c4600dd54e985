//! Fixed-point amount helpers.
//!
//! Token balances and native-currency values are unsigned integers in
//! subunits: 10^18 subunits make one whole token (or one ether in wei).

use crate::error::TypeError;

/// Amount in subunits (token subunits or wei).
pub type Amount = u128;

/// Decimal places of the token and of the native currency.
pub const DECIMALS: u8 = 18;

/// Subunits in one whole token.
pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000;

/// Whole tokens to subunits. Intended for literals; panics on overflow.
pub const fn tokens(whole: u128) -> Amount {
    whole * ONE_TOKEN
}

/// Parse a decimal string such as `"1.5"` or `"10000"` into subunits.
///
/// Underscores are accepted as digit separators. More fractional digits than
/// `decimals`, a sign, or a result above `u128::MAX` are rejected.
pub fn parse_units(input: &str, decimals: u8) -> Result<Amount, TypeError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(TypeError::amount(input, "empty"));
    }

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(TypeError::amount(input, "no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(TypeError::amount(input, "not a non-negative decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(TypeError::amount(
            input,
            format!("more than {decimals} fractional digits"),
        ));
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| TypeError::amount(input, "decimals out of range"))?;
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| TypeError::amount(input, "overflow"))?
    };

    let padded = format!("{fraction:0<width$}", width = decimals as usize);
    let fraction_value: u128 = if padded.is_empty() {
        0
    } else {
        padded
            .parse()
            .map_err(|_| TypeError::amount(input, "overflow"))?
    };

    whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(|| TypeError::amount(input, "overflow"))
}

/// Render subunits as a decimal string, trimming trailing fractional zeros.
pub fn format_units(value: Amount, decimals: u8) -> String {
    let Some(scale) = 10u128.checked_pow(decimals as u32) else {
        return value.to_string();
    };
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0>width$}", width = decimals as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_whole_tokens() {
        assert_eq!(parse_units("10000", DECIMALS).unwrap(), tokens(10_000));
        assert_eq!(parse_units("0", DECIMALS).unwrap(), 0);
    }

    #[test]
    fn parse_fractional_values() {
        assert_eq!(parse_units("0.5", DECIMALS).unwrap(), ONE_TOKEN / 2);
        assert_eq!(parse_units("0.01", DECIMALS).unwrap(), 10_000_000_000_000_000);
        assert_eq!(parse_units(".25", DECIMALS).unwrap(), ONE_TOKEN / 4);
        assert_eq!(parse_units("1_000.000_1", 4).unwrap(), 10_000_001);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse_units("", DECIMALS).is_err());
        assert!(parse_units(".", DECIMALS).is_err());
        assert!(parse_units("-1", DECIMALS).is_err());
        assert!(parse_units("1.2.3", DECIMALS).is_err());
        assert!(parse_units("abc", DECIMALS).is_err());
        assert!(parse_units("0.0000000000000000001", DECIMALS).is_err());
    }

    #[test]
    fn parse_rejects_overflow() {
        let err = parse_units("340282366920938463464", DECIMALS).unwrap_err();
        assert!(matches!(err, TypeError::InvalidAmount { .. }));
    }

    #[test]
    fn format_trims_zeros() {
        assert_eq!(format_units(tokens(10_000), DECIMALS), "10000");
        assert_eq!(format_units(ONE_TOKEN / 2, DECIMALS), "0.5");
        assert_eq!(format_units(1, DECIMALS), "0.000000000000000001");
        assert_eq!(format_units(0, DECIMALS), "0");
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(value in any::<u128>()) {
            let rendered = format_units(value, DECIMALS);
            prop_assert_eq!(parse_units(&rendered, DECIMALS).unwrap(), value);
        }
    }
}
