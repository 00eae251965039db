//! Tests for candle tables
//!
//! These tests verify:
//! - Writer/reader round trips under every column encoding
//! - Range queries through the timestamp index
//! - Checkpoint-anchored decoding
//! - Ordering and corruption errors

use std::path::{Path, PathBuf};

use candlestore::error::{FormatError, RangeError};
use candlestore::storage::{Compression, FileStorage, FLAG_BITPACK, FLAG_DELTA, FLAG_INDEX};
use candlestore::{Candle, CandleError, Config, TableReader, TableWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_table() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("BTCUSD.ohlcv");
    (temp_dir, path)
}

fn test_config() -> Config {
    Config::builder().checkpoint_stride(16).build()
}

/// Minute bars whose prices and volumes survive fixed-point encoding exactly
fn minute_bars(count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let base = 100.0 + ((i * 37) % 101) as f64 * 0.0625;
            Candle::new(
                1_700_000_000 + i as i64 * 60,
                base,
                base + 0.5,
                base - 0.25,
                base + 0.125,
                (i % 13) as f64 * 10.5,
            )
        })
        .collect()
}

fn write_table(path: &Path, config: &Config, candles: &[Candle]) {
    let mut writer = TableWriter::create(path, config).unwrap();
    writer.append(candles).unwrap();
    writer.finish().unwrap();
}

fn assert_close(actual: &[Candle], expected: &[Candle], config: &Config) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_eq!(a.timestamp, e.timestamp);
        for (x, y) in [(a.open, e.open), (a.high, e.high), (a.low, e.low), (a.close, e.close)] {
            assert!((x - y).abs() <= 1.0 / config.price_scale, "{} vs {}", x, y);
        }
        assert!((a.volume - e.volume).abs() <= 1.0 / config.volume_scale);
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_scan_round_trip() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(1_000);
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(reader.row_count(), 1_000);
    assert_close(&reader.scan().unwrap(), &candles, &config);
}

#[test]
fn test_grid_values_decode_exactly() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(200);
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(reader.scan().unwrap(), candles);
}

#[test]
fn test_round_trip_without_bitpack_or_simd() {
    let (_temp, path) = setup_temp_table();
    let config = Config::builder()
        .bitpack(false)
        .use_simd(false)
        .persist_index(false)
        .build();
    let candles = minute_bars(300);
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();
    let info = reader.info();

    assert!(info.columns.iter().all(|c| c.compression == Compression::Delta));
    assert!(reader.checkpoints().is_empty());
    assert!(!reader.header().has_flag(FLAG_INDEX));
    assert!(!reader.header().has_flag(FLAG_BITPACK));
    assert_close(&reader.query(i64::MIN, i64::MAX).unwrap(), &candles, &config);
}

#[test]
fn test_empty_table() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let summary = TableWriter::create(&path, &config).unwrap().finish().unwrap();

    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(summary.rows, 0);
    assert!(reader.is_empty());
    assert!(reader.scan().unwrap().is_empty());
    assert!(reader.query(0, i64::MAX).unwrap().is_empty());
    assert_eq!(reader.min_timestamp(), None);
}

#[test]
fn test_summary_reports_compression() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let mut writer = TableWriter::create(&path, &config).unwrap();
    writer.append(&minute_bars(5_000)).unwrap();
    assert_eq!(writer.len(), 5_000);

    let summary = writer.finish().unwrap();

    assert_eq!(summary.rows, 5_000);
    assert_eq!(summary.raw_bytes, 5_000 * 48);
    assert!(summary.compressed_bytes < summary.raw_bytes / 3);
    assert!(summary.compression_ratio > 3.0);
    assert_eq!(summary.file_size, std::fs::metadata(&path).unwrap().len());
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_query_inclusive_range() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(500);
    write_table(&path, &config, &candles);
    let reader = TableReader::open(&path, &config).unwrap();

    let start = candles[100].timestamp;
    let end = candles[149].timestamp;
    let hits = reader.query(start, end).unwrap();

    assert_eq!(hits, candles[100..150].to_vec());
}

#[test]
fn test_query_between_bars() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(100);
    write_table(&path, &config, &candles);
    let reader = TableReader::open(&path, &config).unwrap();

    // Bounds fall strictly between bar timestamps
    let hits = reader
        .query(candles[10].timestamp + 1, candles[20].timestamp - 1)
        .unwrap();

    assert_eq!(hits, candles[11..20].to_vec());
    assert!(reader.query(0, candles[0].timestamp - 1).unwrap().is_empty());
    assert!(reader.query(100, 50).unwrap().is_empty());
}

#[test]
fn test_query_every_checkpoint_offset() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(100);
    write_table(&path, &config, &candles);
    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(reader.checkpoints().len(), 7); // rows 0, 16, ..., 96
    for start in 0..40 {
        let end = start + 25;
        let rows = reader.read_rows(start as u64, end as u64).unwrap();
        assert_eq!(rows, candles[start..end].to_vec(), "rows {}..{}", start, end);
    }
}

#[test]
fn test_get_exact_timestamp() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(300);
    write_table(&path, &config, &candles);
    let reader = TableReader::open(&path, &config).unwrap();

    for candle in candles.iter().step_by(7) {
        assert_eq!(reader.get(candle.timestamp).unwrap(), Some(*candle));
    }
    assert_eq!(reader.get(candles[3].timestamp + 1).unwrap(), None);
}

#[test]
fn test_read_rows_out_of_range() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    write_table(&path, &config, &minute_bars(10));
    let reader = TableReader::open(&path, &config).unwrap();

    assert!(matches!(
        reader.read_rows(5, 11),
        Err(CandleError::Range(RangeError::SeekOutOfRange { row: 11, count: 10 }))
    ));
    assert!(reader.read_rows(10, 10).unwrap().is_empty());
}

#[test]
fn test_info() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles = minute_bars(64);
    write_table(&path, &config, &candles);
    let reader = TableReader::open(&path, &config).unwrap();

    let info = reader.info();

    assert_eq!(info.rows, 64);
    assert_eq!(info.min_timestamp, Some(candles[0].timestamp));
    assert_eq!(info.max_timestamp, Some(candles[63].timestamp));
    assert_eq!(info.checkpoints, 4);
    assert_eq!(info.columns.len(), 6);
    assert_eq!(info.columns[0].name, "timestamp");
    for flag in [FLAG_DELTA, FLAG_BITPACK, FLAG_INDEX] {
        assert!(reader.header().has_flag(flag));
    }
}

// =============================================================================
// Fallback Encoding Tests
// =============================================================================

#[test]
fn test_overflowing_column_stored_raw() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let mut candles = minute_bars(50);
    candles[25].volume = 1.0e12;
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();
    let info = reader.info();

    assert_eq!(info.columns[5].compression, Compression::None);
    assert_eq!(info.columns[1].compression, Compression::DeltaBitpack);
    assert_eq!(reader.scan().unwrap(), candles);
    assert_eq!(
        reader
            .query(candles[30].timestamp, candles[40].timestamp)
            .unwrap(),
        candles[30..=40].to_vec()
    );
}

#[test]
fn test_non_finite_values_preserved() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let mut candles = minute_bars(20);
    candles[3].high = f64::INFINITY;
    candles[4].low = f64::NAN;
    write_table(&path, &config, &candles);

    let rows = TableReader::open(&path, &config).unwrap().scan().unwrap();

    assert_eq!(rows[3].high, f64::INFINITY);
    assert!(rows[4].low.is_nan());
    assert_eq!(rows[5], candles[5]);
}

#[test]
fn test_huge_negative_price_stored_raw() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let mut candles = minute_bars(2);
    for candle in &mut candles {
        candle.open = -1.0e16;
    }
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(reader.info().columns[1].compression, Compression::None);
    assert_eq!(reader.scan().unwrap(), candles);
}

#[test]
fn test_price_crossing_fixed_range_stored_raw() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    // The second close scales past i64::MAX while the step itself is small
    let mut candles = minute_bars(2);
    candles[0].close = 9.2233720368547e14;
    candles[1].close = 1.0e15;
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(reader.info().columns[4].compression, Compression::None);
    assert_eq!(reader.info().columns[1].compression, Compression::DeltaBitpack);
    assert_eq!(reader.scan().unwrap(), candles);
}

#[test]
fn test_wide_timestamp_deltas() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    let candles: Vec<Candle> = [i64::MIN + 1, -5, 0, 1 << 40, i64::MAX]
        .into_iter()
        .map(|ts| Candle::new(ts, 1.0, 1.0, 1.0, 1.0, 1.0))
        .collect();
    write_table(&path, &config, &candles);

    let reader = TableReader::open(&path, &config).unwrap();

    assert_eq!(reader.info().columns[0].compression, Compression::Delta);
    assert_eq!(reader.scan().unwrap(), candles);
    assert_eq!(reader.query(-10, 10).unwrap(), candles[1..3].to_vec());
}

#[test]
fn test_file_scale_overrides_reader_default() {
    let (_temp, path) = setup_temp_table();
    let write_config = Config::builder().price_scale(100.0).build();
    let candles = vec![Candle::new(1, 1.25, 1.5, 1.0, 1.25, 3.0)];
    write_table(&path, &write_config, &candles);

    let reader = TableReader::open(&path, &Config::default()).unwrap();

    assert_eq!(reader.scan().unwrap(), candles);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_append_rejects_unordered_timestamps() {
    let (_temp, path) = setup_temp_table();
    let mut writer = TableWriter::create(&path, &test_config()).unwrap();
    writer.append(&minute_bars(3)).unwrap();

    // Older than the buffered rows
    assert!(matches!(
        writer.append(&minute_bars(1)),
        Err(CandleError::InvalidInput(_))
    ));

    // Duplicate inside one batch
    let mut batch = minute_bars(6)[3..].to_vec();
    batch[2].timestamp = batch[1].timestamp;
    assert!(matches!(
        writer.append(&batch),
        Err(CandleError::InvalidInput(_))
    ));

    assert_eq!(writer.len(), 3);
}

#[test]
fn test_invalid_config_rejected() {
    let (_temp, path) = setup_temp_table();
    let config = Config::builder().price_scale(0.0).build();

    assert!(matches!(
        TableWriter::create(&path, &config),
        Err(CandleError::Config(_))
    ));
}

#[test]
fn test_corrupt_column_count_detected() {
    let (_temp, path) = setup_temp_table();
    let config = test_config();
    write_table(&path, &config, &minute_bars(10));

    // Claim one more row than the columns hold, keeping the checksum valid
    {
        let mut storage = FileStorage::open(&path, true).unwrap();
        storage.update_header(|h| h.row_count = 11).unwrap();
    }

    assert!(matches!(
        TableReader::open(&path, &config),
        Err(CandleError::Format(FormatError::Corrupt(_)))
    ));
}
