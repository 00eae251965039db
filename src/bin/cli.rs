//! candlestore CLI
//!
//! Load CSV candles into a store, query them back and benchmark the codec.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use candlestore::codec::{encode_prices, encode_prices_simd, simd_backend};
use candlestore::ingest::parse_csv;
use candlestore::{CandleStore, Config, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// candlestore CLI
#[derive(Parser, Debug)]
#[command(name = "candlestore")]
#[command(about = "Columnar memory-mapped OHLCV candle store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./candlestore_data")]
    data_dir: PathBuf,

    /// Fixed-point multiplier for open/high/low/close
    #[arg(long, default_value = "10000")]
    price_scale: f64,

    /// Fixed-point multiplier for volume
    #[arg(long, default_value = "100")]
    volume_scale: f64,

    /// Store deltas as plain 32-bit integers
    #[arg(long)]
    no_bitpack: bool,

    /// Always use the scalar price encoder
    #[arg(long)]
    no_simd: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load candles from a CSV file
    Write {
        /// Symbol to write
        symbol: String,

        /// CSV with timestamp,open,high,low,close,volume rows
        csv: PathBuf,

        /// Add to the stored rows instead of replacing them
        #[arg(long)]
        append: bool,
    },

    /// Print candles with start <= timestamp <= end
    Query {
        symbol: String,
        start: i64,
        end: i64,
    },

    /// Show size and compression of a symbol's table
    Info { symbol: String },

    /// List stored symbols
    List,

    /// Time the scalar and vectorized price encoders
    Bench {
        /// Prices to encode
        #[arg(short, long, default_value = "1000000")]
        rows: usize,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,candlestore=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .price_scale(args.price_scale)
        .volume_scale(args.volume_scale)
        .bitpack(!args.no_bitpack)
        .use_simd(!args.no_simd)
        .build();

    match args.command {
        Commands::Write {
            symbol,
            csv,
            append,
        } => {
            let candles = parse_csv(BufReader::new(File::open(&csv)?))?;
            let store = CandleStore::open(config)?;
            let summary = if append {
                store.append(&symbol, &candles)?
            } else {
                store.write(&symbol, &candles)?
            };
            println!(
                "{}: {} rows, {} bytes on disk, ratio {:.2}x",
                symbol, summary.rows, summary.file_size, summary.compression_ratio
            );
        }

        Commands::Query { symbol, start, end } => {
            let store = CandleStore::open(config)?;
            println!("timestamp,open,high,low,close,volume");
            for c in store.query(&symbol, start, end)? {
                println!(
                    "{},{},{},{},{},{}",
                    c.timestamp, c.open, c.high, c.low, c.close, c.volume
                );
            }
        }

        Commands::Info { symbol } => {
            let store = CandleStore::open(config)?;
            let info = store.info(&symbol)?;
            println!("path:        {}", info.path.display());
            println!("rows:        {}", info.rows);
            println!("file size:   {} bytes", info.file_size);
            println!("raw size:    {} bytes", info.raw_bytes);
            println!("compressed:  {} bytes", info.compressed_bytes);
            println!("ratio:       {:.2}x", info.compression_ratio);
            if let (Some(min), Some(max)) = (info.min_timestamp, info.max_timestamp) {
                println!("range:       {} ..= {}", min, max);
            }
            println!("checkpoints: {}", info.checkpoints);
            for col in &info.columns {
                println!(
                    "  {:<9} {:?} {} -> {} bytes",
                    col.name, col.compression, col.uncompressed_size, col.compressed_size
                );
            }
        }

        Commands::List => {
            let store = CandleStore::open(config)?;
            for symbol in store.symbols()? {
                println!("{}", symbol);
            }
        }

        Commands::Bench { rows } => bench(rows, config.price_scale)?,
    }

    Ok(())
}

fn bench(rows: usize, scale: f64) -> Result<()> {
    let prices = random_walk(rows);
    let mut scalar = vec![0i32; rows];
    let mut vectorized = vec![0i32; rows];

    let started = Instant::now();
    let scalar_base = encode_prices(&prices, &mut scalar, scale)?;
    let scalar_time = started.elapsed();

    let started = Instant::now();
    let simd_base = encode_prices_simd(&prices, &mut vectorized, scale)?;
    let simd_time = started.elapsed();

    let mb = (rows * 8) as f64 / (1024.0 * 1024.0);
    println!("rows:    {}", rows);
    println!(
        "scalar:  {:>10.3} ms  {:>8.1} MB/s",
        scalar_time.as_secs_f64() * 1e3,
        mb / scalar_time.as_secs_f64()
    );
    println!(
        "{:<7}  {:>10.3} ms  {:>8.1} MB/s",
        format!("{}:", simd_backend()),
        simd_time.as_secs_f64() * 1e3,
        mb / simd_time.as_secs_f64()
    );
    println!(
        "outputs: {}",
        if scalar_base == simd_base && scalar == vectorized {
            "identical"
        } else {
            "DIFFERENT"
        }
    );
    Ok(())
}

/// Deterministic price walk around 100.0
fn random_walk(rows: usize) -> Vec<f64> {
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut price = 100.0f64;
    (0..rows)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let step = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            price = (price + step * 0.05).max(0.01);
            price
        })
        .collect()
}
