//! # Vectorized Price Encoding
//!
//! The expensive part of price encoding is the fixed-point step,
//! `round(price * scale)`, done once per value. This module runs that step
//! several lanes at a time and leaves the (inherently sequential) delta pass
//! to the shared scalar helper.
//!
//! ## Determinism
//!
//! Output must be bit-identical to [`encode_prices`](super::encode_prices).
//! The vector path therefore never uses fused multiply-add, and rounds half
//! away from zero exactly like `f64::round`:
//!
//! ```text
//! t    = trunc(x)
//! frac = x - t                  (exact for every finite x)
//! r    = t + (|frac| >= 0.5 ? copysign(1, x) : 0)
//! ```
//!
//! NaN and infinities pass through unchanged, so the final `as i64`
//! conversion saturates the same way on both paths.
//!
//! ## Dispatch
//! 1. x86_64: AVX (4 x f64), detected at runtime
//! 2. aarch64: NEON (2 x f64), always present
//! 3. Scalar fallback

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

use super::delta::{ensure_capacity, narrow_delta};
use crate::error::Result;

/// Values scaled per batch before the delta pass
const BATCH: usize = 256;

/// Vectorized [`encode_prices`](super::encode_prices).
///
/// Same contract, same output, same error for identical input.
pub fn encode_prices_simd(input: &[f64], output: &mut [i32], scale: f64) -> Result<i64> {
    ensure_capacity(input.len(), output.len())?;

    if input.is_empty() {
        return Ok(0);
    }

    let mut scaled = [0.0f64; BATCH];
    let mut base = 0i64;
    let mut prev = 0i64;

    for (chunk_idx, chunk) in input.chunks(BATCH).enumerate() {
        let lanes = &mut scaled[..chunk.len()];
        scale_round_batch(chunk, scale, lanes);

        for (j, &value) in lanes.iter().enumerate() {
            let index = chunk_idx * BATCH + j;
            let current = value as i64;
            if index == 0 {
                base = current;
                output[0] = 0;
            } else {
                output[index] = narrow_delta(prev, current, index)?;
            }
            prev = current;
        }
    }

    Ok(base)
}

/// Name of the backend `encode_prices_simd` dispatches to on this CPU
#[allow(unreachable_code)]
pub fn simd_backend() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            return "avx";
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return "neon";
    }

    "scalar"
}

/// `out[i] = round(input[i] * scale)` as f64, using the widest lanes available
#[inline]
#[allow(unreachable_code)]
fn scale_round_batch(input: &[f64], scale: f64, out: &mut [f64]) {
    debug_assert_eq!(input.len(), out.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            return unsafe { scale_round_avx(input, scale, out) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { scale_round_neon(input, scale, out) };
    }

    scale_round_scalar(input, scale, out);
}

#[inline]
fn scale_round_scalar(input: &[f64], scale: f64, out: &mut [f64]) {
    for (o, &x) in out.iter_mut().zip(input) {
        *o = (x * scale).round();
    }
}

// ============================================================================
// AVX implementation (256-bit, 4 doubles at a time)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn scale_round_avx(input: &[f64], scale: f64, out: &mut [f64]) {
    let n = input.len();
    let chunks = n / 4;

    let vscale = _mm256_set1_pd(scale);
    let sign_mask = _mm256_set1_pd(-0.0);
    let one = _mm256_set1_pd(1.0);
    let half = _mm256_set1_pd(0.5);

    let in_ptr = input.as_ptr();
    let out_ptr = out.as_mut_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let x = _mm256_mul_pd(_mm256_loadu_pd(in_ptr.add(offset)), vscale);
        let t = _mm256_round_pd::<{ _MM_FROUND_TO_ZERO | _MM_FROUND_NO_EXC }>(x);
        let frac = _mm256_andnot_pd(sign_mask, _mm256_sub_pd(x, t));
        let signed_one = _mm256_or_pd(_mm256_and_pd(x, sign_mask), one);
        let step = _mm256_and_pd(_mm256_cmp_pd::<_CMP_GE_OQ>(frac, half), signed_one);
        _mm256_storeu_pd(out_ptr.add(offset), _mm256_add_pd(t, step));
    }

    let base = chunks * 4;
    scale_round_scalar(&input[base..], scale, &mut out[base..]);
}

// ============================================================================
// NEON implementation (128-bit, 2 doubles at a time)
// ============================================================================

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn scale_round_neon(input: &[f64], scale: f64, out: &mut [f64]) {
    let n = input.len();
    let chunks = n / 2;

    let vscale = vdupq_n_f64(scale);
    let sign_bit = vdupq_n_u64(1 << 63);
    let one = vdupq_n_f64(1.0);
    let half = vdupq_n_f64(0.5);
    let zero = vdupq_n_f64(0.0);

    let in_ptr = input.as_ptr();
    let out_ptr = out.as_mut_ptr();

    for i in 0..chunks {
        let offset = i * 2;
        let x = vmulq_f64(vld1q_f64(in_ptr.add(offset)), vscale);
        let t = vrndq_f64(x);
        let frac = vabsq_f64(vsubq_f64(x, t));
        let signed_one = vreinterpretq_f64_u64(vorrq_u64(
            vandq_u64(vreinterpretq_u64_f64(x), sign_bit),
            vreinterpretq_u64_f64(one),
        ));
        let step = vbslq_f64(vcgeq_f64(frac, half), signed_one, zero);
        vst1q_f64(out_ptr.add(offset), vaddq_f64(t, step));
    }

    let base = chunks * 2;
    scale_round_scalar(&input[base..], scale, &mut out[base..]);
}
