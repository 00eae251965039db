//! CSV candle ingestion
//!
//! Accepts `timestamp,open,high,low,close,volume` rows. A first line whose
//! timestamp field is not an integer is treated as a header; blank lines are
//! skipped anywhere.

use std::io::BufRead;

use crate::candle::Candle;
use crate::error::{CandleError, Result};

const FIELDS: usize = 6;

/// Parse every candle in `input`; errors carry the 1-based line number
pub fn parse_csv<R: BufRead>(input: R) -> Result<Vec<Candle>> {
    let mut candles = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let number = idx + 1;

        if candles.is_empty() && is_header(line) {
            continue;
        }
        candles.push(parse_line(line, number)?);
    }

    Ok(candles)
}

/// Parse one `timestamp,open,high,low,close,volume` row
pub fn parse_line(line: &str, number: usize) -> Result<Candle> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELDS {
        return Err(invalid(
            number,
            format!("expected {} fields, found {}", FIELDS, fields.len()),
        ));
    }

    let timestamp = fields[0]
        .parse::<i64>()
        .map_err(|e| invalid(number, format!("timestamp {:?}: {}", fields[0], e)))?;

    let mut values = [0.0f64; FIELDS - 1];
    for (slot, field) in values.iter_mut().zip(&fields[1..]) {
        *slot = field
            .parse::<f64>()
            .map_err(|e| invalid(number, format!("value {:?}: {}", field, e)))?;
    }
    let [open, high, low, close, volume] = values;

    Ok(Candle::new(timestamp, open, high, low, close, volume))
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|first| first.trim().parse::<i64>().is_err())
}

fn invalid(line: usize, message: String) -> CandleError {
    CandleError::InvalidInput(format!("line {}: {}", line, message))
}
