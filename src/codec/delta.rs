//! Scalar delta encoding
//!
//! Reference implementation; the vectorized encoder must match it bit for bit.

use crate::error::{CapacityError, Result};

/// Delta-encode ascending timestamps: `output[0]` is the base, every other
/// slot the difference to its predecessor. Deltas wrap on overflow.
pub fn encode_timestamps(input: &[i64], output: &mut [i64]) -> Result<()> {
    ensure_capacity(input.len(), output.len())?;

    let mut prev = 0i64;
    for (i, &ts) in input.iter().enumerate() {
        output[i] = if i == 0 { ts } else { ts.wrapping_sub(prev) };
        prev = ts;
    }

    Ok(())
}

/// Rebuild timestamps by running sum over the deltas
pub fn decode_timestamps(input: &[i64], output: &mut [i64]) -> Result<()> {
    ensure_capacity(input.len(), output.len())?;

    let mut acc = 0i64;
    for (i, &delta) in input.iter().enumerate() {
        acc = if i == 0 { delta } else { acc.wrapping_add(delta) };
        output[i] = acc;
    }

    Ok(())
}

/// Encode prices as fixed-point deltas.
///
/// Returns the base `round(input[0] * scale)`. `output[0]` is a zero sentinel,
/// `output[i]` is `round(input[i] * scale) - round(input[i - 1] * scale)`.
/// Fails with `DeltaOverflow` at the first delta outside the i32 range.
pub fn encode_prices(input: &[f64], output: &mut [i32], scale: f64) -> Result<i64> {
    ensure_capacity(input.len(), output.len())?;

    let Some(&first) = input.first() else {
        return Ok(0);
    };

    let base = to_fixed(first, scale);
    output[0] = 0;

    let mut prev = base;
    for i in 1..input.len() {
        let current = to_fixed(input[i], scale);
        output[i] = narrow_delta(prev, current, i)?;
        prev = current;
    }

    Ok(base)
}

/// Decode fixed-point deltas back to prices.
///
/// `input[0]` is ignored (sentinel); the running sum starts at `base`.
/// The result matches the encoded prices to within `1 / scale`.
pub fn decode_prices(input: &[i32], output: &mut [f64], base: i64, scale: f64) -> Result<()> {
    ensure_capacity(input.len(), output.len())?;

    let mut acc = base;
    for (i, &delta) in input.iter().enumerate() {
        if i > 0 {
            acc = acc.wrapping_add(i64::from(delta));
        }
        output[i] = acc as f64 / scale;
    }

    Ok(())
}

/// `original / compressed`, or 0 when nothing was compressed
pub fn compression_ratio(original_bytes: usize, compressed_bytes: usize) -> f64 {
    if compressed_bytes == 0 {
        return 0.0;
    }
    original_bytes as f64 / compressed_bytes as f64
}

// =============================================================================
// Shared Helpers (used by the SIMD encoder)
// =============================================================================

/// Fixed-point value `round(value * scale)`, as the price encoder computes it
#[inline]
pub fn to_fixed(value: f64, scale: f64) -> i64 {
    (value * scale).round() as i64
}

#[inline]
pub(super) fn narrow_delta(prev: i64, current: i64, index: usize) -> Result<i32> {
    let wide = i128::from(current) - i128::from(prev);
    i32::try_from(wide).map_err(|_| {
        CapacityError::DeltaOverflow {
            index,
            delta: current.saturating_sub(prev),
        }
        .into()
    })
}

#[inline]
pub(super) fn ensure_capacity(required: usize, available: usize) -> Result<()> {
    if available < required {
        return Err(CapacityError::OutputTooSmall {
            required,
            available,
        }
        .into());
    }
    Ok(())
}
