//! groupwal Benchmark Binary
//!
//! Drives concurrent commits through a group committer and reports
//! throughput measured between the 10% and 90% completion marks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use rand::Rng;
use tracing_subscriber::{fmt, EnvFilter};

use groupwal::writer::{FileWriter, MemWriter, SleepWriter};
use groupwal::{Config, GroupCommitter, SyncStrategy, Writer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WriterKind {
    /// Latency + bandwidth simulator
    Sleep,
    /// In-memory image
    Memory,
    /// Positional writes into one file, fsync per write
    File,
}

/// groupwal throughput benchmark
#[derive(Parser, Debug)]
#[command(name = "groupwal-bench")]
#[command(about = "Group-commit log throughput benchmark")]
#[command(version)]
struct Args {
    /// Writer backend
    #[arg(short, long, value_enum, default_value = "sleep")]
    writer: WriterKind,

    /// Total number of commits across all threads
    #[arg(short, long, default_value = "100000")]
    commits: u64,

    /// Payload size in bytes (upper bound with --random-size)
    #[arg(short, long, default_value = "256")]
    size: usize,

    /// Draw each payload size uniformly from 1..=size
    #[arg(long)]
    random_size: bool,

    /// Number of committing threads
    #[arg(short, long, default_value = "8")]
    threads: usize,

    /// Slot capacity in bytes
    #[arg(long, default_value = "16384")]
    slot_capacity: usize,

    /// Number of slots in the ring
    #[arg(long, default_value = "16")]
    ring_size: usize,

    /// Per-wait timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Sleep writer: fixed latency per write in microseconds
    #[arg(long, default_value = "50")]
    latency_us: u64,

    /// Sleep writer: bandwidth in MB/s (0 = unlimited)
    #[arg(long, default_value = "200")]
    bandwidth: u64,

    /// File writer: log file path
    #[arg(short, long, default_value = "./groupwal-bench.log")]
    path: PathBuf,
}

/// Completion marks shared by all workers
struct Progress {
    total: u64,
    done: AtomicU64,
    bytes: AtomicU64,
    latency_ns: AtomicU64,
    /// (instant, bytes) at the 10% mark
    start: Mutex<Option<(Instant, u64)>>,
    /// (instant, bytes) at the 90% mark
    end: Mutex<Option<(Instant, u64)>>,
}

impl Progress {
    fn new(total: u64) -> Self {
        Self {
            total,
            done: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            latency_ns: AtomicU64::new(0),
            start: Mutex::new(None),
            end: Mutex::new(None),
        }
    }

    fn record(&self, bytes: u64, latency: Duration) {
        self.latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        let bytes = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;

        if done == self.total / 10 {
            *self.start.lock() = Some((Instant::now(), bytes));
        }
        if done == self.total * 9 / 10 {
            *self.end.lock() = Some((Instant::now(), bytes));
        }
    }
}

fn build_writer(args: &Args) -> groupwal::Result<Box<dyn Writer>> {
    Ok(match args.writer {
        WriterKind::Sleep => Box::new(SleepWriter::new(
            Duration::from_micros(args.latency_us),
            args.bandwidth,
        )),
        WriterKind::Memory => Box::new(MemWriter::new()),
        WriterKind::File => Box::new(FileWriter::create(&args.path, SyncStrategy::EveryWrite)?),
    })
}

fn run(args: &Args) -> groupwal::Result<()> {
    let config = Config::builder()
        .slot_capacity(args.slot_capacity)
        .ring_size(args.ring_size)
        .wait_timeout_ms(args.timeout_ms)
        .build();
    let log = Arc::new(GroupCommitter::new(config, build_writer(args)?)?);
    let progress = Arc::new(Progress::new(args.commits));

    let threads = args.threads.max(1) as u64;
    let began = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let log = Arc::clone(&log);
            let progress = Arc::clone(&progress);
            let count = args.commits / threads + u64::from(t < args.commits % threads);
            let (size, random) = (args.size.max(1), args.random_size);

            thread::spawn(move || -> groupwal::Result<()> {
                let mut rng = rand::thread_rng();
                let payload = vec![0xA5u8; size];
                for i in 0..count {
                    let len = if random { rng.gen_range(1..=size) } else { size };
                    let started = Instant::now();
                    log.commit(i, &payload[..len], t as i32)?;
                    progress.record(log.format().total_length(len) as u64, started.elapsed());
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => tracing::error!("worker thread panicked"),
        }
    }
    let elapsed = began.elapsed();

    let stats = log.stats();
    let done = progress.done.load(Ordering::Relaxed);
    tracing::info!(commits = done, ?elapsed, ?stats, "benchmark finished");

    let start = *progress.start.lock();
    let end = *progress.end.lock();
    match (start, end) {
        (Some((t0, b0)), Some((t1, b1))) if t1 > t0 => {
            let secs = (t1 - t0).as_secs_f64();
            println!(
                "throughput: {:.2} MB/s ({:.0} commits/s)",
                (b1 - b0) as f64 / secs / 1e6,
                (args.commits * 8 / 10) as f64 / secs
            );
        }
        _ => println!("too few commits to measure the 10%-90% window"),
    }
    if done > 0 {
        let mean = progress.latency_ns.load(Ordering::Relaxed) / done;
        println!("mean commit latency: {:.1} us", mean as f64 / 1e3);
    }
    println!(
        "group size: {:.2} records per slot write",
        done as f64 / (stats.full_flushes + stats.partial_flushes).max(1) as f64
    );
    Ok(())
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,groupwal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("groupwal bench v{}", groupwal::VERSION);
    tracing::info!(
        writer = ?args.writer,
        commits = args.commits,
        threads = args.threads,
        size = args.size,
        "starting"
    );

    if let Err(e) = run(&args) {
        tracing::error!("Benchmark failed: {}", e);
        std::process::exit(1);
    }
}
