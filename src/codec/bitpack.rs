//! Zig-zag bit packing for i32 deltas
//!
//! Block layout: `[width: u8][packed values]`, each value occupying `width`
//! bits, least significant bit first. Fixed width makes element `i` start at
//! bit `i * width`, so any row can be unpacked without touching its
//! predecessors.

use crate::error::{FormatError, Result};

/// Map signed to unsigned so small magnitudes get small codes
#[inline]
pub fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
pub fn unzigzag(code: u32) -> i32 {
    ((code >> 1) as i32) ^ -((code & 1) as i32)
}

/// Bits needed for the widest zig-zag code in `values` (0 when all are zero)
pub fn bit_width(values: &[i32]) -> u8 {
    let widest = values.iter().fold(0u32, |acc, &v| acc | zigzag(v));
    (32 - widest.leading_zeros()) as u8
}

/// Size in bytes of a packed block, width prefix included
pub fn bitpack_len(count: usize, width: u8) -> usize {
    1 + (count * width as usize).div_ceil(8)
}

/// Append a packed block for `values` to `output`; returns the chosen width
pub fn pack(values: &[i32], output: &mut Vec<u8>) -> u8 {
    let width = bit_width(values);
    output.reserve(bitpack_len(values.len(), width));
    output.push(width);

    if width == 0 {
        return width;
    }

    let mut acc: u64 = 0;
    let mut bits: u32 = 0;
    for &v in values {
        acc |= u64::from(zigzag(v)) << bits;
        bits += u32::from(width);
        while bits >= 8 {
            output.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        output.push(acc as u8);
    }

    width
}

/// Unpack `output.len()` values starting at element `start` of `block`
pub fn unpack(block: &[u8], start: usize, output: &mut [i32]) -> Result<()> {
    let Some((&width, packed)) = block.split_first() else {
        return Err(FormatError::Corrupt("empty bit-packed block".to_string()).into());
    };
    if width > 32 {
        return Err(FormatError::Corrupt(format!("bit width {} exceeds 32", width)).into());
    }

    let end = start + output.len();
    if block.len() < bitpack_len(end, width) {
        return Err(FormatError::Corrupt(format!(
            "bit-packed block of {} bytes cannot hold {} values of width {}",
            block.len(),
            end,
            width
        ))
        .into());
    }

    if width == 0 {
        output.fill(0);
        return Ok(());
    }

    let width = usize::from(width);
    let mask: u64 = (1u64 << width) - 1;

    for (i, slot) in output.iter_mut().enumerate() {
        let bit = (start + i) * width;
        let byte = bit / 8;
        let shift = bit % 8;

        // A value spans at most 5 bytes (32 bits + 7 bit shift)
        let mut word = [0u8; 8];
        let avail = (packed.len() - byte).min(5);
        word[..avail].copy_from_slice(&packed[byte..byte + avail]);
        let code = (u64::from_le_bytes(word) >> shift) & mask;
        *slot = unzigzag(code as u32);
    }

    Ok(())
}

/// Unpack an entire block holding `count` values
pub fn unpack_all(block: &[u8], count: usize) -> Result<Vec<i32>> {
    let mut values = Vec::new();
    values.try_reserve_exact(count)?;
    values.resize(count, 0);
    unpack(block, 0, &mut values)?;
    Ok(values)
}
