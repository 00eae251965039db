//! Candle record and column identifiers

use crate::storage::ColumnType;

/// One OHLCV record keyed by timestamp
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Candle {
    /// Epoch timestamp (unit chosen by the writer)
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// The six fixed columns, in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnId {
    Timestamp = 0,
    Open = 1,
    High = 2,
    Low = 3,
    Close = 4,
    Volume = 5,
}

impl ColumnId {
    pub const ALL: [ColumnId; 6] = [
        ColumnId::Timestamp,
        ColumnId::Open,
        ColumnId::High,
        ColumnId::Low,
        ColumnId::Close,
        ColumnId::Volume,
    ];

    /// The float columns
    pub const VALUES: [ColumnId; 5] = [
        ColumnId::Open,
        ColumnId::High,
        ColumnId::Low,
        ColumnId::Close,
        ColumnId::Volume,
    ];

    /// Position in `FileHeader::column_offsets`
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnId::Timestamp => "timestamp",
            ColumnId::Open => "open",
            ColumnId::High => "high",
            ColumnId::Low => "low",
            ColumnId::Close => "close",
            ColumnId::Volume => "volume",
        }
    }

    pub fn column_type(self) -> ColumnType {
        match self {
            ColumnId::Timestamp => ColumnType::Timestamp,
            ColumnId::Volume => ColumnType::Volume,
            _ => ColumnType::Price,
        }
    }

    /// Float value of this column in `candle`; timestamps are converted
    pub fn value_of(self, candle: &Candle) -> f64 {
        match self {
            ColumnId::Timestamp => candle.timestamp as f64,
            ColumnId::Open => candle.open,
            ColumnId::High => candle.high,
            ColumnId::Low => candle.low,
            ColumnId::Close => candle.close,
            ColumnId::Volume => candle.volume,
        }
    }

    /// Store `value` into this column of `candle`; ignored for timestamps
    pub fn set_value(self, candle: &mut Candle, value: f64) {
        match self {
            ColumnId::Timestamp => {}
            ColumnId::Open => candle.open = value,
            ColumnId::High => candle.high = value,
            ColumnId::Low => candle.low = value,
            ColumnId::Close => candle.close = value,
            ColumnId::Volume => candle.volume = value,
        }
    }
}
