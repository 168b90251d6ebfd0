use anyhow::{Context, bail};
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
#[cfg(feature = "progress")]
use std::sync::atomic::{AtomicBool, Ordering};
use treediff::{DiffOptions, TreeDiff, progress};

fn print_usage(program: &str) {
    println!("Usage: {} <dir1> <dir2> [--walk-workers N] [--compare-workers N] [--ignore PATTERN]... [--stats] [--synthetic-benchmark]", program);
    println!("\nPrints one line per changed path: M (modified), A (added) or D (deleted), a tab, and the path.");
    println!("\nOptions:");
    println!("  --walk-workers N         Number of directory walking workers (default: 8)");
    println!("  --compare-workers N      Number of content comparison workers (default: 8)");
    println!("  --ignore PATTERN         Skip paths matching a gitignore-style pattern (repeatable)");
    println!("  --stats                  Print run statistics to stderr");
    println!("  --synthetic-benchmark    Run a synthetic benchmark (creates and diffs two large fake trees)");
    println!("  --help                   Show this help message");
}

struct Args {
    left: PathBuf,
    right: PathBuf,
    options: DiffOptions,
    stats: bool,
}

fn utf8_value<'a>(flag: &str, value: Option<&'a OsString>) -> anyhow::Result<&'a str> {
    let value = value.with_context(|| format!("{} requires a value", flag))?;
    value
        .to_str()
        .with_context(|| format!("value for {} is not valid UTF-8: {:?}", flag, value))
}

fn parse_count(flag: &str, value: Option<&OsString>) -> anyhow::Result<usize> {
    let value = utf8_value(flag, value)?;
    value
        .parse::<usize>()
        .with_context(|| format!("invalid value for {}: {}", flag, value))
}

enum Command {
    Help,
    Benchmark(DiffOptions),
    Diff(Args),
}

fn parse_args(args: &[OsString]) -> anyhow::Result<Command> {
    let mut options = DiffOptions::default();
    let mut stats = false;
    let mut benchmark = false;
    let mut dirs = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].to_str() {
            Some("--help" | "-h") => return Ok(Command::Help),
            Some("--walk-workers") => {
                options = options.walk_workers(parse_count("--walk-workers", args.get(i + 1))?);
                i += 1;
            }
            Some("--compare-workers") => {
                options = options.compare_workers(parse_count("--compare-workers", args.get(i + 1))?);
                i += 1;
            }
            Some("--ignore") => {
                options = options.ignore([utf8_value("--ignore", args.get(i + 1))?]);
                i += 1;
            }
            Some("--stats") => stats = true,
            Some("--synthetic-benchmark") => benchmark = true,
            _ => dirs.push(PathBuf::from(&args[i])),
        }
        i += 1;
    }
    if benchmark {
        return Ok(Command::Benchmark(options));
    }
    if dirs.len() != 2 {
        print_usage(&program(args));
        bail!("expected exactly two directories, got {}", dirs.len());
    }
    let right = dirs.pop().unwrap_or_default();
    let left = dirs.pop().unwrap_or_default();
    Ok(Command::Diff(Args {
        left,
        right,
        options,
        stats,
    }))
}

fn program(args: &[OsString]) -> String {
    args.first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "treediff".to_string())
}

#[cfg(feature = "benchmarking")]
fn run_benchmark(options: DiffOptions) -> anyhow::Result<()> {
    progress::run_synthetic_benchmark(options)?;
    Ok(())
}

#[cfg(not(feature = "benchmarking"))]
fn run_benchmark(_options: DiffOptions) -> anyhow::Result<()> {
    bail!("treediff was built without the `benchmarking` feature")
}

fn run() -> anyhow::Result<()> {
    let raw: Vec<OsString> = std::env::args_os().collect();
    let args = match parse_args(&raw)? {
        Command::Help => {
            print_usage(&program(&raw));
            return Ok(());
        }
        Command::Benchmark(options) => return run_benchmark(options),
        Command::Diff(args) => args,
    };
    let (left, right) = (args.left.as_path(), args.right.as_path());
    let differ = TreeDiff::new(args.options);
    let stats = differ.stats();

    #[cfg(feature = "progress")]
    let result = {
        let pb = progress::spinner();
        let done = AtomicBool::new(false);
        let result = std::thread::scope(|s| {
            s.spawn(|| progress::watch(&pb, &stats, &done));
            let result = differ.run(left, right);
            done.store(true, Ordering::Release);
            result
        });
        pb.finish_and_clear();
        result
    };
    #[cfg(not(feature = "progress"))]
    let result = differ.run(left, right);

    let changes = result?;
    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for change in &changes {
        change.write_name_status(&mut writer)?;
    }
    writer.flush()?;

    if args.stats {
        eprintln!("[STATS] {}", progress::summary(&stats));
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = run() {
        eprintln!("treediff encountered an error: {:#}", err);
        std::process::exit(1);
    }
}
