//! Decimal string <-> fixed-point integer conversion.
//!
//! Amounts are parsed digit by digit into a `U256` scaled by `10^scale`, so no
//! floating point is ever involved. Fractional digits beyond the scale are
//! only accepted when they are all zero; anything else would truncate.

use ethers::types::U256;

use crate::error::NumberError;

/// Largest scale whose power of ten still fits in 256 bits.
pub const MAX_SCALE: u32 = 77;

pub fn normalize(value: &str, scale: u32) -> Result<U256, NumberError> {
    let invalid = |reason| NumberError::Invalid {
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(invalid("empty value"));
    }
    if scale > MAX_SCALE {
        return Err(NumberError::ScaleOutOfRange { scale });
    }

    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };

    // A missing side of the point reads as zero: ".5" and "5." are fine.
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if fraction.contains('.') {
        return Err(invalid("more than one decimal point"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a non-negative decimal"));
    }
    let whole = if whole.is_empty() { "0" } else { whole };

    let scale_digits = scale as usize;
    let kept = if fraction.len() > scale_digits {
        if fraction.trim_end_matches('0').len() > scale_digits {
            return Err(NumberError::PrecisionLoss {
                value: value.to_string(),
                digits: fraction.len(),
                scale,
            });
        }
        &fraction[..scale_digits]
    } else {
        fraction
    };

    let mut digits = String::with_capacity(whole.len() + scale_digits);
    digits.push_str(whole);
    digits.push_str(kept);
    digits.extend(std::iter::repeat_n('0', scale_digits - kept.len()));

    U256::from_dec_str(&digits).map_err(|_| invalid("exceeds 256 bits"))
}

/// Count-like fields are carried unscaled.
pub fn normalize_count(value: &str) -> Result<U256, NumberError> {
    normalize(value, 0)
}

/// Inverse of [`normalize`], without trailing fractional zeros.
pub fn descale(amount: U256, scale: u32) -> String {
    let digits = amount.to_string();
    let scale = scale as usize;
    if scale == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}
