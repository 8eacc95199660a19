//! planetile: decode serialized image planes and split them into tiles.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use planetile_core::{
    tile_records, Plane, RawPlaneRecord, TileGeometry, TileParams, TileRecord, TileSummary,
};
use planetile_io::{PlaneRecordReader, TileFormat, TileRecordReader, TileRecordWriter};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PlanetileIo(#[from] planetile_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] planetile_core::Error),

    #[error("record {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: planetile_core::Error,
    },
}

/// Tiling flags shared by the subcommands.
#[derive(Args, Debug, Clone, Copy)]
struct TilingArgs {
    /// Tile width (default = image width)
    #[arg(short = 'W', long = "width", value_name = "INT")]
    width: Option<usize>,

    /// Tile height (default = image height)
    #[arg(short = 'H', long = "height", value_name = "INT")]
    height: Option<usize>,

    /// Horizontal distance between consecutive tiles (default = tile width)
    #[arg(short = 'x', long = "delta-x", value_name = "INT")]
    delta_x: Option<usize>,

    /// Vertical distance between consecutive tiles (default = tile height)
    #[arg(short = 'y', long = "delta-y", value_name = "INT")]
    delta_y: Option<usize>,

    /// Initial x-offset of the first tile
    #[arg(long, value_name = "INT")]
    offset_x: Option<usize>,

    /// Initial y-offset of the first tile
    #[arg(long, value_name = "INT")]
    offset_y: Option<usize>,
}

impl From<TilingArgs> for TileParams {
    fn from(args: TilingArgs) -> Self {
        TileParams {
            width: args.width,
            height: args.height,
            dx: args.delta_x,
            dy: args.delta_y,
            ox: args.offset_x,
            oy: args.offset_y,
        }
    }
}

/// Decode serialized image planes and split them into tiles.
#[derive(Parser)]
#[command(name = "planetile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace or 0-5)
    #[arg(long, global = true, default_value = "info", value_parser = parse_log_level)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of each record in a record file
    Dump {
        /// Input record file (JSON lines)
        input: PathBuf,

        /// Number of records to show (default: all)
        #[arg(short, long, value_name = "INT")]
        num_records: Option<usize>,
    },

    /// List the planes in a record file with their coordinates and size
    Planes {
        /// Input record file (JSON lines)
        input: PathBuf,
    },

    /// Show the tile layout for an image of the given size
    Tiles {
        /// Image width
        #[arg(value_name = "WIDTH")]
        image_width: usize,

        /// Image height
        #[arg(value_name = "HEIGHT")]
        image_height: usize,

        #[command(flatten)]
        tiling: TilingArgs,
    },

    /// Split every plane into tiles and write one descriptor per tile
    Split {
        /// Input record file (JSON lines)
        input: PathBuf,

        /// Output file (.csv or .jsonl); CSV on stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        tiling: TilingArgs,

        /// Include tile pixels (JSON lines output only)
        #[arg(long)]
        pixels: bool,

        /// Log and skip records that do not describe a valid plane
        #[arg(long)]
        skip_invalid: bool,

        /// Number of records decoded in parallel per batch
        #[arg(long, default_value = "64", value_name = "INT")]
        batch_size: usize,
    },

    /// Summarize the field values of a tile descriptor file
    Summarize {
        /// Tile file written by `split` (.csv or .jsonl)
        input: PathBuf,

        /// Output file; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Options of the `split` subcommand.
#[derive(Debug, Clone, Copy)]
struct SplitOptions {
    params: TileParams,
    pixels: bool,
    skip_invalid: bool,
    batch_size: usize,
}

/// Counters reported at the end of `split`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SplitStats {
    planes: usize,
    tiles: usize,
    skipped: usize,
}

/// Extracts and tiles records batch by batch, decoding each batch in
/// parallel. Descriptors are written in input order.
fn split_records<I, W>(
    records: I,
    writer: &mut TileRecordWriter<W>,
    options: &SplitOptions,
) -> Result<SplitStats>
where
    I: Iterator<Item = planetile_io::Result<RawPlaneRecord>>,
    W: Write,
{
    let mut records = records;
    let mut stats = SplitStats::default();
    let mut index = 0usize;

    loop {
        let batch: Vec<RawPlaneRecord> = records
            .by_ref()
            .take(options.batch_size.max(1))
            .collect::<planetile_io::Result<_>>()?;
        if batch.is_empty() {
            break;
        }

        let results: Vec<planetile_core::Result<Vec<TileRecord>>> = batch
            .par_iter()
            .map(|record| {
                let plane = Plane::extract(record)?;
                log::info!("processing {}", plane.tag());
                tile_records(&plane, &options.params, options.pixels)
            })
            .collect();

        for result in results {
            match result {
                Ok(tiles) => {
                    writer.write_batch(&tiles)?;
                    stats.planes += 1;
                    stats.tiles += tiles.len();
                }
                Err(e) if options.skip_invalid && e.is_data_error() => {
                    log::warn!("skipping record {}: {}", index, e);
                    stats.skipped += 1;
                }
                Err(source) => return Err(CliError::InvalidRecord { index, source }),
            }
            index += 1;
        }
    }
    Ok(stats)
}

/// Prints the tile origins and sizes of `geometry` and its coverage.
fn write_layout<W: Write>(out: &mut W, geometry: &TileGeometry) -> std::io::Result<()> {
    writeln!(out, "x\ty\tw\th")?;
    for (i, j) in geometry.positions() {
        let (h, w) = geometry.tile_dim(i, j);
        writeln!(out, "{}\t{}\t{}\t{}", j, i, w, h)?;
    }
    writeln!(
        out,
        "{} tiles, {}/{} pixels covered ({:.1}%)",
        geometry.count(),
        geometry.covered_pixels(),
        geometry.rows as u128 * geometry.cols as u128,
        100.0 * geometry.coverage()
    )
}

/// Opens `path` for writing, or stdout if `None`.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            log::info!("writing to {}", path.display());
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(std::io::stdout().lock()),
    })
}

fn parse_log_level(s: &str) -> std::result::Result<LevelFilter, String> {
    match s.parse::<usize>() {
        Ok(0) => Ok(LevelFilter::Off),
        Ok(1) => Ok(LevelFilter::Error),
        Ok(2) => Ok(LevelFilter::Warn),
        Ok(3) => Ok(LevelFilter::Info),
        Ok(4) => Ok(LevelFilter::Debug),
        Ok(5) => Ok(LevelFilter::Trace),
        Ok(n) => Err(format!("{n} is not a valid log level (0-5)")),
        Err(_) => s
            .parse()
            .map_err(|_| format!("{s:?} is not a valid log level")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Dump { input, num_records } => {
            let reader = PlaneRecordReader::open(&input)?;
            let limit = num_records.unwrap_or(usize::MAX);
            for record in reader.records().take(limit) {
                let r = record?;
                let p = &r.pixel_data;
                println!(
                    "{}\tseries={}\torder={}\tdtype={}\tlittle_endian={}\tshape={:?}\toffsets={:?}\tdeltas={:?}\tbytes={}",
                    r.name,
                    r.series,
                    r.dimension_order,
                    p.dtype,
                    p.little_endian,
                    p.shape,
                    p.offsets,
                    p.deltas,
                    p.data.len()
                );
            }
        }

        Commands::Planes { input } => {
            let reader = PlaneRecordReader::open(&input)?;
            for (index, record) in reader.records().enumerate() {
                let record = record?;
                match Plane::extract(&record) {
                    Ok(plane) => println!(
                        "{}\tseries={}\t{}x{}\t{}",
                        plane.tag(),
                        plane.series(),
                        plane.size_x(),
                        plane.size_y(),
                        plane.dtype()
                    ),
                    Err(e) => println!("{}\t#{}\tERROR: {}", record.name, index, e),
                }
            }
        }

        Commands::Tiles {
            image_width,
            image_height,
            tiling,
        } => {
            let geometry = TileParams::from(tiling).resolve(image_height, image_width)?;
            let mut out = std::io::stdout().lock();
            write_layout(&mut out, &geometry)?;
        }

        Commands::Split {
            input,
            output,
            tiling,
            pixels,
            skip_invalid,
            batch_size,
        } => {
            let options = SplitOptions {
                params: TileParams::from(tiling),
                pixels,
                skip_invalid,
                batch_size,
            };
            let reader = PlaneRecordReader::open(&input)?;
            let format = match &output {
                Some(path) => TileFormat::from_path(path)?,
                None => TileFormat::Csv,
            };
            let mut writer = TileRecordWriter::new(open_output(output.as_deref())?, format);
            if pixels && format == TileFormat::Csv {
                log::warn!("--pixels has no effect on CSV output");
            }

            let start = Instant::now();
            let stats = split_records(reader.records(), &mut writer, &options)?;
            writer.finish()?;

            log::info!(
                "{} planes, {} tiles, {} skipped in {:.2}s",
                stats.planes,
                stats.tiles,
                stats.skipped,
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Summarize { input, output } => {
            let reader = TileRecordReader::open(&input)?;
            let summary: TileSummary = reader
                .records()
                .collect::<planetile_io::Result<_>>()?;
            let mut out = open_output(output.as_deref())?;
            write!(out, "{summary}")?;
            out.flush()?;
        }
    }

    Ok(())
}
