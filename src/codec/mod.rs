//! Codec Module
//!
//! Delta compression for time-ordered numeric columns.
//!
//! ## Responsibilities
//! - Timestamps: base value followed by i64 deltas (lossless)
//! - Prices/volume: fixed-point i64 base plus i32 deltas (exact to `1/scale`)
//! - Vectorized price encoding, bit-identical to the scalar path
//! - Optional zig-zag bit packing of the i32 deltas
//!
//! ## Encodings
//! ```text
//! timestamps  [t0, t1, t2, ...]       → [t0, t1-t0, t2-t1, ...]     (i64)
//! prices      [p0, p1, p2, ...] * s   → base = round(p0*s)
//!                                       [0, Δ1, Δ2, ...]            (i32)
//! bitpack     [Δ0, Δ1, ...]           → [width: u8][zigzag(Δ) in `width` bits, LSB first]
//! ```
//!
//! Consecutive candles differ by small amounts, so the deltas are narrow and
//! the work is paid on encode/decode only, never on random access to the
//! mapped file.

mod bitpack;
mod delta;
mod simd;

pub use bitpack::{bit_width, bitpack_len, pack, unpack, unpack_all, unzigzag, zigzag};
pub use delta::{
    compression_ratio, decode_prices, decode_timestamps, encode_prices, encode_timestamps,
    to_fixed,
};
pub use simd::{encode_prices_simd, simd_backend};
