//! Tests for CandleStore
//!
//! These tests verify:
//! - Symbol resolution and validation
//! - Write, append and query through the store
//! - Replacing a table while a reader holds the old one
//! - CSV ingestion into the store

use std::io::Cursor;

use candlestore::ingest::parse_csv;
use candlestore::{Candle, CandleError, CandleStore, Config};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, CandleStore) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .initial_file_size(64 * 1024)
        .checkpoint_stride(8)
        .build();
    let store = CandleStore::open(config).unwrap();
    (temp_dir, store)
}

fn bars(start_ts: i64, count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let p = 50.0 + (i % 9) as f64 * 0.25;
            Candle::new(start_ts + i as i64 * 60, p, p + 1.0, p - 1.0, p + 0.5, i as f64)
        })
        .collect()
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("nested").join("candles");

    let config = Config::builder().data_dir(&data_dir).build();
    let store = CandleStore::open(config).unwrap();

    assert!(data_dir.is_dir());
    assert_eq!(store.data_dir(), data_dir.as_path());
    assert!(store.symbols().unwrap().is_empty());
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .checkpoint_stride(0)
        .build();

    assert!(matches!(
        CandleStore::open(config),
        Err(CandleError::Config(_))
    ));
}

// =============================================================================
// Write / Query Tests
// =============================================================================

#[test]
fn test_write_then_query() {
    let (_temp, store) = setup_temp_store();
    let candles = bars(1_700_000_000, 120);

    let summary = store.write("BTCUSD", &candles).unwrap();
    assert_eq!(summary.rows, 120);
    assert!(store.path_for("BTCUSD").exists());

    let hits = store
        .query("BTCUSD", candles[10].timestamp, candles[19].timestamp)
        .unwrap();
    assert_eq!(hits, candles[10..20].to_vec());
}

#[test]
fn test_write_replaces_previous_rows() {
    let (_temp, store) = setup_temp_store();
    store.write("ETHUSD", &bars(1_000, 50)).unwrap();

    let replacement = bars(9_000, 5);
    store.write("ETHUSD", &replacement).unwrap();

    assert_eq!(store.query("ETHUSD", i64::MIN, i64::MAX).unwrap(), replacement);
}

#[test]
fn test_reader_keeps_old_table_after_rewrite() {
    let (_temp, store) = setup_temp_store();
    let original = bars(1_000, 40);
    store.write("SOLUSD", &original).unwrap();

    let reader = store.reader("SOLUSD").unwrap();
    store.write("SOLUSD", &bars(5_000, 3)).unwrap();

    assert_eq!(reader.scan().unwrap(), original);
    assert_eq!(store.info("SOLUSD").unwrap().rows, 3);
}

#[test]
fn test_append_extends_table() {
    let (_temp, store) = setup_temp_store();
    let all = bars(1_000, 30);
    store.append("BTCUSD", &all[..20]).unwrap();
    let summary = store.append("BTCUSD", &all[20..]).unwrap();

    assert_eq!(summary.rows, 30);
    assert_eq!(store.query("BTCUSD", i64::MIN, i64::MAX).unwrap(), all);
}

#[test]
fn test_append_rejects_overlap() {
    let (_temp, store) = setup_temp_store();
    store.write("BTCUSD", &bars(1_000, 10)).unwrap();

    let err = store.append("BTCUSD", &bars(1_000, 2)).unwrap_err();

    assert!(matches!(err, CandleError::InvalidInput(_)));
    assert_eq!(store.info("BTCUSD").unwrap().rows, 10);
}

#[test]
fn test_failed_write_keeps_previous_table() {
    let (_temp, store) = setup_temp_store();
    let original = bars(1_000, 10);
    store.write("BTCUSD", &original).unwrap();

    let mut unordered = bars(2_000, 3);
    unordered.swap(0, 2);
    assert!(store.write("BTCUSD", &unordered).is_err());
    assert!(!store.data_dir().join("BTCUSD.ohlcv.tmp").exists());

    assert_eq!(store.query("BTCUSD", i64::MIN, i64::MAX).unwrap(), original);
    assert_eq!(store.symbols().unwrap(), vec!["BTCUSD".to_string()]);
}

#[test]
fn test_info_reports_table() {
    let (_temp, store) = setup_temp_store();
    let candles = bars(1_700_000_000, 64);
    store.write("BTCUSD", &candles).unwrap();

    let info = store.info("BTCUSD").unwrap();

    assert_eq!(info.rows, 64);
    assert_eq!(info.min_timestamp, Some(candles[0].timestamp));
    assert_eq!(info.max_timestamp, Some(candles[63].timestamp));
    assert_eq!(info.checkpoints, 8);
    assert!(info.compression_ratio > 1.0);
}

// =============================================================================
// Symbol Tests
// =============================================================================

#[test]
fn test_symbols_sorted() {
    let (temp, store) = setup_temp_store();
    for symbol in ["ETHUSD", "BTCUSD", "BRK.B"] {
        store.write(symbol, &bars(0, 3)).unwrap();
    }
    std::fs::write(temp.path().join("notes.txt"), b"ignored").unwrap();

    assert_eq!(store.symbols().unwrap(), vec!["BRK.B", "BTCUSD", "ETHUSD"]);
}

#[test]
fn test_unknown_symbol() {
    let (_temp, store) = setup_temp_store();

    assert!(matches!(
        store.query("NOPE", 0, 1),
        Err(CandleError::SymbolNotFound(s)) if s == "NOPE"
    ));
    assert!(matches!(
        store.info("NOPE"),
        Err(CandleError::SymbolNotFound(_))
    ));
}

#[test]
fn test_invalid_symbols_rejected() {
    let (_temp, store) = setup_temp_store();

    for symbol in ["", "..", "../etc", "BTC/USD", "BTC USD"] {
        assert!(
            matches!(store.write(symbol, &bars(0, 1)), Err(CandleError::InvalidInput(_))),
            "symbol {:?}",
            symbol
        );
    }
}

// =============================================================================
// CSV Ingestion Tests
// =============================================================================

#[test]
fn test_csv_into_store() {
    let (_temp, store) = setup_temp_store();
    let csv = "timestamp,open,high,low,close,volume\n\
               1700000000,42000.5,42100,41950.25,42050,12.5\n\
               1700000060,42050,42075.75,42000,42010.5,3.25\n\
               \n\
               1700000120,42010.5,42020,41990,42000,7\n";

    let candles = parse_csv(Cursor::new(csv)).unwrap();
    store.write("BTCUSD", &candles).unwrap();

    let hits = store.query("BTCUSD", 1_700_000_060, 1_700_000_120).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0], Candle::new(1_700_000_060, 42050.0, 42075.75, 42000.0, 42010.5, 3.25));
}
