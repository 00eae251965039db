//! Tests for the compression codec
//!
//! These tests verify:
//! - Timestamp delta round trips
//! - Fixed-point price round trips within 1/scale
//! - Vectorized encoder matching the scalar encoder exactly
//! - Capacity and overflow errors
//! - Bit packing with random access

use candlestore::codec::{
    bit_width, bitpack_len, compression_ratio, decode_prices, decode_timestamps, encode_prices,
    encode_prices_simd, encode_timestamps, pack, unpack, unpack_all,
};
use candlestore::error::CapacityError;
use candlestore::CandleError;

// =============================================================================
// Helper Functions
// =============================================================================

fn roundtrip_timestamps(input: &[i64]) -> Vec<i64> {
    let mut encoded = vec![0i64; input.len()];
    encode_timestamps(input, &mut encoded).unwrap();
    let mut decoded = vec![0i64; input.len()];
    decode_timestamps(&encoded, &mut decoded).unwrap();
    decoded
}

fn encode_both(prices: &[f64], scale: f64) -> ((i64, Vec<i32>), (i64, Vec<i32>)) {
    let mut scalar = vec![0i32; prices.len()];
    let mut simd = vec![0i32; prices.len()];
    let scalar_base = encode_prices(prices, &mut scalar, scale).unwrap();
    let simd_base = encode_prices_simd(prices, &mut simd, scale).unwrap();
    ((scalar_base, scalar), (simd_base, simd))
}

// =============================================================================
// Timestamp Tests
// =============================================================================

#[test]
fn test_encode_timestamps_minute_bars() {
    let input = [1_700_000_000, 1_700_000_060, 1_700_000_120];
    let mut encoded = [0i64; 3];

    encode_timestamps(&input, &mut encoded).unwrap();

    assert_eq!(encoded, [1_700_000_000, 60, 60]);
    assert_eq!(roundtrip_timestamps(&input), input);
}

#[test]
fn test_encode_timestamps_empty() {
    let mut out: [i64; 0] = [];
    encode_timestamps(&[], &mut out).unwrap();
    decode_timestamps(&[], &mut out).unwrap();
}

#[test]
fn test_timestamps_wrap_at_extremes() {
    let input = [i64::MIN, i64::MAX, 0, i64::MIN];
    assert_eq!(roundtrip_timestamps(&input), input);
}

#[test]
fn test_encode_timestamps_output_too_small() {
    let mut out = [0i64; 2];
    let err = encode_timestamps(&[1, 2, 3], &mut out).unwrap_err();

    assert!(matches!(
        err,
        CandleError::Capacity(CapacityError::OutputTooSmall {
            required: 3,
            available: 2
        })
    ));
}

// =============================================================================
// Price Tests
// =============================================================================

#[test]
fn test_encode_prices_layout() {
    let mut out = [7i32; 3];
    let base = encode_prices(&[10.25, 10.5, 10.0], &mut out, 100.0).unwrap();

    assert_eq!(base, 1_025);
    assert_eq!(out, [0, 25, -50]);
}

#[test]
fn test_encode_prices_empty_returns_zero_base() {
    let mut out: [i32; 0] = [];
    assert_eq!(encode_prices(&[], &mut out, 100.0).unwrap(), 0);
    assert_eq!(encode_prices_simd(&[], &mut out, 100.0).unwrap(), 0);
}

#[test]
fn test_price_roundtrip_within_one_unit() {
    let prices = [100.0, 100.12345, 99.99991, 101.5, 0.00004, 250.0];
    let scale = 10_000.0;
    let mut encoded = vec![0i32; prices.len()];
    let base = encode_prices(&prices, &mut encoded, scale).unwrap();

    let mut decoded = vec![0f64; prices.len()];
    decode_prices(&encoded, &mut decoded, base, scale).unwrap();

    for (original, restored) in prices.iter().zip(&decoded) {
        assert!((original - restored).abs() <= 1.0 / scale, "{} vs {}", original, restored);
    }
}

#[test]
fn test_encode_prices_delta_overflow() {
    let mut out = [0i32; 3];
    let err = encode_prices(&[0.0, 1.0, 1.0e6], &mut out, 10_000.0).unwrap_err();

    match err {
        CandleError::Capacity(CapacityError::DeltaOverflow { index, delta }) => {
            assert_eq!(index, 2);
            assert_eq!(delta, 9_999_990_000);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_simd_overflow_matches_scalar() {
    let prices = [0.0, 1.0, 1.0e6];
    let mut scalar = [0i32; 3];
    let mut simd = [0i32; 3];

    let a = encode_prices(&prices, &mut scalar, 10_000.0).unwrap_err();
    let b = encode_prices_simd(&prices, &mut simd, 10_000.0).unwrap_err();

    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn test_simd_output_too_small() {
    let mut out = [0i32; 1];
    assert!(matches!(
        encode_prices_simd(&[1.0, 2.0], &mut out, 1.0),
        Err(CandleError::Capacity(CapacityError::OutputTooSmall { .. }))
    ));
}

#[test]
fn test_simd_matches_scalar_across_batches() {
    // Crosses several internal batch boundaries and ends on a partial one
    let prices: Vec<f64> = (0..1_037)
        .map(|i| 100.0 + (i as f64 * 0.37).sin() * 5.0 + (i % 7) as f64 * 0.00005)
        .collect();

    let (scalar, simd) = encode_both(&prices, 10_000.0);
    assert_eq!(scalar, simd);
}

#[test]
fn test_simd_matches_scalar_on_half_ties() {
    let prices = [0.5, 1.5, 2.5, -0.5, -1.5, -2.5, 0.49999999999999994, -0.49999999999999994];
    let (scalar, simd) = encode_both(&prices, 1.0);
    assert_eq!(scalar, simd);
}

#[test]
fn test_simd_matches_scalar_on_extremes() {
    let prices = [
        1.0,
        1.0 + f64::EPSILON,
        -0.0,
        f64::MIN_POSITIVE,
        2.5,
        f64::INFINITY,
        f64::INFINITY,
        -1.0e300,
        -1.0e300,
    ];
    let mut scalar = [0i32; 9];
    let mut simd = [0i32; 9];

    let a = encode_prices(&prices[..5], &mut scalar, 1.0).unwrap();
    let b = encode_prices_simd(&prices[..5], &mut simd, 1.0).unwrap();
    assert_eq!((a, scalar), (b, simd));

    // Saturated values overflow the delta identically on both paths
    let a = encode_prices(&prices, &mut scalar, 1.0).unwrap_err();
    let b = encode_prices_simd(&prices, &mut simd, 1.0).unwrap_err();
    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn test_compression_ratio() {
    assert_eq!(compression_ratio(800, 200), 4.0);
    assert_eq!(compression_ratio(800, 0), 0.0);
}

// =============================================================================
// Bit Packing Tests
// =============================================================================

#[test]
fn test_pack_width_and_length() {
    let values = [0, 5, -10, 3];
    let mut block = Vec::new();
    let width = pack(&values, &mut block);

    assert_eq!(width, bit_width(&values));
    assert_eq!(width, 5); // zigzag(-10) = 19
    assert_eq!(block.len(), bitpack_len(values.len(), width));
    assert_eq!(unpack_all(&block, values.len()).unwrap(), values);
}

#[test]
fn test_unpack_random_access() {
    let values: Vec<i32> = (0..100).map(|i| (i * 37 % 23) - 11).collect();
    let mut block = Vec::new();
    pack(&values, &mut block);

    let mut window = [0i32; 10];
    unpack(&block, 45, &mut window).unwrap();
    assert_eq!(&window[..], &values[45..55]);
}

#[test]
fn test_pack_extreme_values() {
    let values = [i32::MIN, i32::MAX, 0, -1];
    let mut block = Vec::new();

    assert_eq!(pack(&values, &mut block), 32);
    assert_eq!(unpack_all(&block, values.len()).unwrap(), values);
}

#[test]
fn test_unpack_truncated_block_is_corrupt() {
    let values = [1, 2, 3, 4, 5, 6, 7, 8];
    let mut block = Vec::new();
    pack(&values, &mut block);
    block.pop();

    assert!(matches!(
        unpack_all(&block, values.len()),
        Err(CandleError::Format(_))
    ));
}

// =============================================================================
// Property Tests
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_timestamps_roundtrip(xs in prop::collection::vec(any::<i64>(), 1..500)) {
            prop_assert_eq!(roundtrip_timestamps(&xs), xs);
        }

        #[test]
        fn test_prices_roundtrip_within_scale(
            xs in prop::collection::vec(-10_000.0f64..10_000.0, 1..500),
        ) {
            let scale = 10_000.0;
            let mut encoded = vec![0i32; xs.len()];
            let base = encode_prices(&xs, &mut encoded, scale).unwrap();
            let mut decoded = vec![0f64; xs.len()];
            decode_prices(&encoded, &mut decoded, base, scale).unwrap();

            for (x, y) in xs.iter().zip(&decoded) {
                prop_assert!((x - y).abs() <= 1.0 / scale);
            }
        }

        #[test]
        fn test_simd_identical_to_scalar(
            xs in prop::collection::vec(-1.0e5f64..1.0e5, 0..1_000),
            scale in prop::sample::select(vec![1.0, 100.0, 10_000.0]),
        ) {
            let mut scalar = vec![0i32; xs.len()];
            let mut simd = vec![0i32; xs.len()];
            let a = encode_prices(&xs, &mut scalar, scale).map_err(|e| e.to_string());
            let b = encode_prices_simd(&xs, &mut simd, scale).map_err(|e| e.to_string());

            prop_assert_eq!(&a, &b);
            if a.is_ok() {
                prop_assert_eq!(scalar, simd);
            }
        }

        #[test]
        fn test_simd_identical_to_scalar_any_input(
            xs in prop::collection::vec(any::<f64>(), 0..600),
            scale in prop::sample::select(vec![1.0, 100.0, 10_000.0]),
        ) {
            let mut scalar = vec![0i32; xs.len()];
            let mut simd = vec![0i32; xs.len()];
            let a = encode_prices(&xs, &mut scalar, scale).map_err(|e| e.to_string());
            let b = encode_prices_simd(&xs, &mut simd, scale).map_err(|e| e.to_string());

            prop_assert_eq!(&a, &b);
            if a.is_ok() {
                prop_assert_eq!(scalar, simd);
            }
        }

        #[test]
        fn test_bitpack_roundtrip(values in prop::collection::vec(any::<i32>(), 0..300)) {
            let mut block = Vec::new();
            pack(&values, &mut block);
            prop_assert_eq!(unpack_all(&block, values.len()).unwrap(), values);
        }
    }
}
