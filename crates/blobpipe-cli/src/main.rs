use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use blobpipe_core::{
    spawn_reader, BlobDecoder, BlobPipeline, EntityMask, FrameWriter, PipelineOptions, TaskPool,
    DEFAULT_QUEUE_CAPACITY,
};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "blobpipe",
    version,
    about = "Blob stream pipeline CLI",
    long_about = "Inspect block-framed blob streams and synthesize test streams."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a framed blob stream and report block statistics.
    Inspect {
        /// Stream file to inspect.
        input: PathBuf,

        /// Decode on the producer thread instead of a worker pool.
        #[arg(long, default_value_t = false)]
        no_pool: bool,

        /// Number of decode workers (defaults to CPU count).
        #[arg(long, default_value_t = num_cpus::get())]
        workers: usize,

        /// Capacity of the ordered result queue.
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Entity categories to decode: all, none, or a comma-separated list
        /// of nodes, ways, relations, changesets.
        #[arg(long, default_value = "all", value_parser = parse_entities)]
        entities: EntityMask,

        /// Read chunk size (binary suffixes: 64K, 1M, 8MiB).
        #[arg(long, default_value = "64K", value_parser = parse_size)]
        chunk_size: usize,

        /// Emit the report as JSON on stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a synthetic stream for benchmarks and tests.
    Synth {
        /// Destination stream file.
        output: PathBuf,

        /// Number of data blocks to write.
        #[arg(long, default_value_t = 64)]
        blocks: u64,

        /// Payload size per data block (binary suffixes: 16K, 1MiB).
        #[arg(long, default_value = "16K", value_parser = parse_size)]
        block_size: usize,

        /// Header block payload size.
        #[arg(long, default_value = "256", value_parser = parse_size)]
        header_size: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
struct HeaderInfo {
    payload_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
struct BlockStats {
    payload_bytes: usize,
    byte_sum: u64,
}

/// Treats payloads as opaque and reports their sizes and byte sums.
struct StatsDecoder;

impl BlobDecoder for StatsDecoder {
    type Header = HeaderInfo;
    type Buffer = Option<BlockStats>;

    fn decode_header(&self, payload: Bytes) -> blobpipe_core::Result<Self::Header> {
        Ok(HeaderInfo {
            payload_bytes: payload.len() as u64,
        })
    }

    fn decode_data(
        &self,
        payload: Bytes,
        _entities: EntityMask,
    ) -> blobpipe_core::Result<Self::Buffer> {
        let byte_sum = payload.iter().map(|&b| u64::from(b)).sum();
        Ok(Some(BlockStats {
            payload_bytes: payload.len(),
            byte_sum,
        }))
    }
}

#[derive(Serialize)]
struct InspectReport {
    input: String,
    stream_bytes: u64,
    read_bytes: u64,
    header_payload_bytes: u64,
    data_blocks: u64,
    payload_bytes: u64,
    payload_byte_sum: u64,
    elapsed_ms: u64,
    pooled: bool,
    workers: usize,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            input,
            no_pool,
            workers,
            queue_capacity,
            entities,
            chunk_size,
            json,
        } => inspect_command(
            input,
            no_pool,
            workers,
            queue_capacity,
            entities,
            chunk_size,
            json,
        )?,
        Commands::Synth {
            output,
            blocks,
            block_size,
            header_size,
        } => synth_command(output, blocks, block_size, header_size)?,
    }

    Ok(())
}

fn inspect_command(
    input: PathBuf,
    no_pool: bool,
    workers: usize,
    queue_capacity: usize,
    entities: EntityMask,
    chunk_size: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream_bytes = std::fs::metadata(&input)?.len();
    let file = File::open(&input)?;

    let mut options = PipelineOptions {
        entities,
        queue_capacity: queue_capacity.max(1),
        ..Default::default()
    };
    if no_pool {
        options.use_pool = false;
    } else {
        options.pool = Some(Arc::new(TaskPool::new(workers.max(1))));
    }
    let pooled = options.use_pool;

    let started_at = Instant::now();
    let (chunks, reader) = spawn_reader(file, chunk_size.max(1), 8)?;
    let mut pipeline = BlobPipeline::open(chunks, Arc::new(StatsDecoder), options)?;

    let header = pipeline.header()?;
    let mut data_blocks = 0u64;
    let mut payload_bytes = 0u64;
    let mut payload_byte_sum = 0u64;
    while let Some(stats) = pipeline.read()? {
        data_blocks += 1;
        payload_bytes += stats.payload_bytes as u64;
        payload_byte_sum = payload_byte_sum.wrapping_add(stats.byte_sum);
    }
    pipeline.close()?;
    let read_bytes = reader.join().map_err(|_| "stream reader thread panicked")??;
    let elapsed = started_at.elapsed();

    let report = InspectReport {
        input: input.display().to_string(),
        stream_bytes,
        read_bytes,
        header_payload_bytes: header.payload_bytes,
        data_blocks,
        payload_bytes,
        payload_byte_sum,
        elapsed_ms: elapsed.as_millis() as u64,
        pooled,
        workers: if pooled { workers.max(1) } else { 1 },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_inspect_summary(&report, elapsed);
    }
    Ok(())
}

fn synth_command(
    output: PathBuf,
    blocks: u64,
    block_size: usize,
    header_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let started_at = Instant::now();
    let mut writer = FrameWriter::new(BufWriter::new(File::create(&output)?));
    writer.write_header_block(&pattern(header_size.max(1), 0))?;
    for index in 0..blocks {
        writer.write_data_block(&pattern(block_size.max(1), index + 1))?;
    }
    let blocks_written = writer.blocks_written();
    let bytes_written = writer.bytes_written();
    writer.finish()?;
    let elapsed = started_at.elapsed();

    println!("synth complete");
    println!("  output: {}", output.display());
    println!("  blocks: {blocks_written} (1 header + {blocks} data)");
    println!("  bytes: {}", format_bytes(bytes_written));
    println!("  elapsed: {}", format_duration(elapsed));
    Ok(())
}

fn print_inspect_summary(report: &InspectReport, elapsed: Duration) {
    let elapsed_secs = elapsed.as_secs_f64().max(1e-6);
    let read_bps = report.read_bytes as f64 / elapsed_secs;
    let avg_block = if report.data_blocks > 0 {
        report.payload_bytes / report.data_blocks
    } else {
        0
    };

    println!("inspect complete");
    println!("  stream: {}", report.input);
    println!("  stream bytes: {}", format_bytes(report.stream_bytes));
    println!(
        "  header payload: {}",
        format_bytes(report.header_payload_bytes)
    );
    println!(
        "  data blocks: {} (avg payload {})",
        report.data_blocks,
        format_bytes(avg_block)
    );
    println!("  payload bytes: {}", format_bytes(report.payload_bytes));
    println!("  payload byte sum: {:#018x}", report.payload_byte_sum);
    println!(
        "  decode mode: {}",
        if report.pooled { "pooled" } else { "inline" }
    );
    println!("  workers: {}", report.workers);
    println!("  elapsed: {}", format_duration(elapsed));
    println!("  throughput: {}", format_rate(read_bps));
}

/// Deterministic filler so synthesized streams are reproducible.
fn pattern(size: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        out.push((state >> 56) as u8);
    }
    out
}

fn parse_entities(value: &str) -> Result<EntityMask, String> {
    let trimmed = value.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "all" => return Ok(EntityMask::ALL),
        "none" => return Ok(EntityMask::NOTHING),
        _ => {}
    }

    let mut mask = EntityMask::NOTHING;
    for part in trimmed.split(',') {
        mask |= match part.trim().to_ascii_lowercase().as_str() {
            "nodes" => EntityMask::NODES,
            "ways" => EntityMask::WAYS,
            "relations" => EntityMask::RELATIONS,
            "changesets" => EntityMask::CHANGESETS,
            other => return Err(format!("unknown entity category '{other}' in '{value}'")),
        };
    }
    Ok(mask)
}

/// Parses a byte count for chunk and payload sizes: digits with an optional
/// binary suffix, so `4096`, `64K`, and `8MiB` all work.
fn parse_size(value: &str) -> Result<usize, String> {
    let text = value.trim();
    let digits = text.chars().take_while(|ch| ch.is_ascii_digit()).count();
    let (number, unit) = text.split_at(digits);
    if number.is_empty() {
        return Err(format!("size must start with digits: '{value}'"));
    }

    let count: usize = number
        .parse()
        .map_err(|_| format!("size number out of range: '{value}'"))?;
    let shift = match unit.trim_start().to_ascii_lowercase().as_str() {
        "" | "b" => 0u32,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        _ => return Err(format!("unknown size unit in '{value}'")),
    };

    count
        .checked_mul(1usize << shift)
        .ok_or_else(|| format!("size too large: '{value}'"))
}

/// Renders a byte count with the binary unit it fits, e.g. `512 B`,
/// `16.0 KiB`, `1.5 GiB`.
fn format_bytes(bytes: u64) -> String {
    const SCALE: u64 = 1024;
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < SCALE {
        return format!("{bytes} B");
    }
    let mut divisor = SCALE;
    let mut unit = 1usize;
    while unit + 1 < UNITS.len() && bytes >= divisor * SCALE {
        divisor *= SCALE;
        unit += 1;
    }
    format!("{:.1} {}", bytes as f64 / divisor as f64, UNITS[unit])
}

/// Decode throughput for the summary lines; stream rates below one byte per
/// second collapse to zero.
fn format_rate(bytes_per_second: f64) -> String {
    if !bytes_per_second.is_finite() || bytes_per_second < 1.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", format_bytes(bytes_per_second as u64))
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.subsec_millis());
    }
    if secs < 60 {
        return format!("{:.1}s", duration.as_secs_f64());
    }
    let minutes = secs / 60;
    if minutes < 60 {
        return format!("{minutes}m{:02}s", secs % 60);
    }
    format!("{}h{:02}m{:02}s", minutes / 60, minutes % 60, secs % 60)
}
