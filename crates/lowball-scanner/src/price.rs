//! Price text validation.

use crate::error::ExtractionError;
use lowball_core::{Currency, Price};

/// Numeric value of a scraped price string.
///
/// Everything except ASCII digits and `.` is discarded, then the longest
/// leading decimal number is read, so `"$1,299.00"` is `1299.0` and
/// `"12.50.3"` is `12.5`. Returns `None` when no digits remain or the value
/// is not a finite non-negative number.
#[must_use]
pub fn parse_amount(text: &str) -> Option<f64> {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut end = 0;
    let mut seen_point = false;
    for (i, c) in stripped.char_indices() {
        if c == '.' {
            if seen_point {
                break;
            }
            seen_point = true;
        }
        end = i + 1;
    }

    let number = &stripped[..end];
    if !number.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Validate candidate price text into a price and its currency.
///
/// # Errors
/// Returns `ExtractionError::InvalidPrice` carrying the original text when
/// no valid amount can be read.
pub fn validate(text: &str) -> Result<(Price, Currency), ExtractionError> {
    let amount =
        parse_amount(text).ok_or_else(|| ExtractionError::InvalidPrice(text.to_string()))?;
    let price =
        Price::new(amount).map_err(|_| ExtractionError::InvalidPrice(text.to_string()))?;
    Ok((price, Currency::detect(text)))
}
