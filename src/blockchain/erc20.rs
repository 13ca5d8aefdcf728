// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! ERC-20 interface and unit conversion helpers.

use alloy::{primitives::U256, sol};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::gateway::ChainError;

// ERC-20 interface via alloy's sol! macro. The Transfer event doubles as
// the source for historical transfer listings.
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

/// Convert a whole-asset quantity to base units, truncating any precision
/// beyond the token's decimals.
pub fn to_base_units(quantity: Decimal, decimals: u8) -> Result<U256, ChainError> {
    if quantity <= Decimal::ZERO {
        return Err(ChainError::InvalidQuantity(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    let factor = Decimal::from(10u64.pow(decimals as u32));
    let scaled = quantity
        .checked_mul(factor)
        .ok_or_else(|| ChainError::InvalidQuantity(format!("quantity {quantity} overflows")))?
        .trunc();
    let units = scaled
        .to_u128()
        .ok_or_else(|| ChainError::InvalidQuantity(format!("quantity {quantity} overflows")))?;
    Ok(U256::from(units))
}

/// Format a base-unit balance with the specified number of decimals.
pub fn format_units(balance: U256, decimals: u8) -> String {
    if balance.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = balance / divisor;
    let remainder = balance % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_whole_asset_units_to_base_units() {
        // 0.0008 of an 8-decimal asset = 80_000 base units
        let units = to_base_units("0.0008".parse().unwrap(), 8).unwrap();
        assert_eq!(units, U256::from(80_000u64));

        let one = to_base_units(Decimal::ONE, 18).unwrap();
        assert_eq!(one, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn truncates_excess_precision() {
        // 9 fractional digits against 8 decimals: the last digit is dropped
        let units = to_base_units("0.000000019".parse().unwrap(), 8).unwrap();
        assert_eq!(units, U256::from(1u64));
    }

    #[test]
    fn rejects_non_positive_quantities() {
        assert!(to_base_units(Decimal::ZERO, 8).is_err());
        assert!(to_base_units("-1".parse().unwrap(), 8).is_err());
    }

    #[test]
    fn formats_base_units() {
        assert_eq!(format_units(U256::ZERO, 8), "0");
        assert_eq!(format_units(U256::from(100_000_000u64), 8), "1");
        assert_eq!(format_units(U256::from(80_000u64), 8), "0.0008");
        assert_eq!(
            format_units(U256::from(1_500_000_000_000_000_000u64), 18),
            "1.5"
        );
    }
}
