//! Catalog values that arrive either as JSON numbers or as numeric strings.

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a number")]
pub struct InvalidNumber(pub String);

/// A price or stock level as stored in the catalog documents.
///
/// Numeric strings are accepted on input; text that does not parse is kept
/// as-is so the failure surfaces where the value is used, not when the
/// document is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Numeric {
    Number(Decimal),
    Text(String),
}

impl Numeric {
    /// The value as money. Non-numeric text is an error, never zero.
    pub fn amount(&self) -> Result<Decimal, InvalidNumber> {
        match self {
            Numeric::Number(value) => Ok(*value),
            Numeric::Text(text) => text
                .trim()
                .parse::<Decimal>()
                .map_err(|_| InvalidNumber(text.clone())),
        }
    }

    /// The value as a stock count. Unparseable stock means "unknown".
    pub fn as_stock(&self) -> Option<u32> {
        let value = match self {
            Numeric::Number(value) => *value,
            Numeric::Text(text) => text.trim().parse::<Decimal>().ok()?,
        };
        if value.is_sign_negative() {
            return Some(0);
        }
        value.trunc().to_u32()
    }
}

impl From<Decimal> for Numeric {
    fn from(value: Decimal) -> Self {
        Numeric::Number(value)
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Numeric::Number(Decimal::from(value))
    }
}

impl From<&str> for Numeric {
    fn from(value: &str) -> Self {
        Numeric::Text(value.to_string())
    }
}

/// Formats an amount the way the storefront shows prices: `.` groups
/// thousands and `,` separates up to two decimals, e.g. `1.500` or `1.500,5`.
pub fn format_ars(amount: Decimal) -> String {
    let rounded = amount.round_dp(2).normalize();
    let text = rounded.abs().to_string();
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer.to_string(), fraction.to_string()),
        None => (text, String::new()),
    };

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.iter().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped},{fraction}")
    }
}
