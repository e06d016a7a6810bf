//! aosched command-line demo driver
//!
//! Exercises the scheduler primitives end to end: one-shot and periodic
//! timers, the synchronous thread bridge, the file readers and the mailbox.

mod commands;

use aosched_engine::{Scheduler, SchedulerStats};
use aosched_runtime::DEFAULT_CHUNK_SIZE;
use clap::{Parser, Subcommand};
use commands::read::ReadMode;
use commands::{messaging, read, thread, timers};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "aosched")]
#[command(about = "Active-object scheduler demos", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print scheduler statistics every time the scheduler thread waits
    #[arg(long, global = true)]
    dump: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One-shot timer plus two periodic timers; stops after a countdown
    Timers {
        /// Delay of the one-shot timer
        #[arg(long, default_value_t = 3000)]
        oneshot_ms: u64,
        /// Period of the countdown timer
        #[arg(long, default_value_t = 2000)]
        periodic_ms: u64,
        /// Period of the heartbeat timer
        #[arg(long, default_value_t = 1000)]
        fast_ms: u64,
        /// Countdown firings before every timer is deleted
        #[arg(long, default_value_t = 10)]
        count: u32,
    },

    /// Run a blocking sleep on a worker thread through the synchronous bridge
    Thread {
        /// How long the worker sleeps
        #[arg(long, default_value_t = 3000)]
        millis: u64,
    },

    /// Read a file through the chunked and/or continuous reader
    Read {
        /// File to read
        path: PathBuf,
        /// Bytes per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Which reader to use
        #[arg(long, value_enum, default_value_t = ReadMode::Both)]
        mode: ReadMode,
    },

    /// Worker threads send requests to a mailbox after random delays
    Messaging {
        /// Number of worker threads
        #[arg(long, default_value_t = 5)]
        workers: usize,
        /// Upper bound of each worker's random delay
        #[arg(long, default_value_t = 500)]
        max_delay_ms: u64,
    },
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("aosched={log_level},aosched_engine={log_level},aosched_runtime={log_level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn print_stats(stats: &SchedulerStats) {
    let next = stats
        .next_expiry_in
        .map(|d| format!("{:.3}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string());
    eprintln!(
        "[dump] idle={} active={} completed={} timers={} next={}",
        stats.idle, stats.active, stats.completed, stats.timers, next
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let scheduler = Scheduler::new();
    if cli.dump {
        scheduler.set_dump(print_stats);
    }

    match cli.command {
        Commands::Timers {
            oneshot_ms,
            periodic_ms,
            fast_ms,
            count,
        } => timers::execute(
            &scheduler,
            timers::TimersOptions::from_millis(oneshot_ms, periodic_ms, fast_ms, count),
        ),
        Commands::Thread { millis } => thread::execute(&scheduler, millis),
        Commands::Read {
            path,
            chunk_size,
            mode,
        } => read::execute(&scheduler, &path, chunk_size, mode),
        Commands::Messaging {
            workers,
            max_delay_ms,
        } => messaging::execute(&scheduler, workers, max_delay_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_timers_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["aosched", "timers"])?;
        assert_eq!(cli.verbose, 0);
        assert!(!cli.dump);
        assert!(matches!(
            cli.command,
            Commands::Timers {
                oneshot_ms: 3000,
                periodic_ms: 2000,
                fast_ms: 1000,
                count: 10,
            }
        ));
        Ok(())
    }

    #[test]
    fn parse_global_flags_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from(["aosched", "thread", "--millis", "5", "-vv", "--dump"])?;
        assert_eq!(cli.verbose, 2);
        assert!(cli.dump);
        assert!(matches!(cli.command, Commands::Thread { millis: 5 }));
        Ok(())
    }

    #[test]
    fn parse_read_mode() -> TestResult {
        let cli = Cli::try_parse_from(["aosched", "read", "data.txt", "--mode", "continuous"])?;
        match cli.command {
            Commands::Read {
                path,
                chunk_size,
                mode,
            } => {
                assert_eq!(path, PathBuf::from("data.txt"));
                assert_eq!(chunk_size, DEFAULT_CHUNK_SIZE);
                assert_eq!(mode, ReadMode::Continuous);
            }
            _ => return Err("expected read command".into()),
        }
        Ok(())
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["aosched", "read", "x", "--mode", "mmap"]).is_err());
    }
}
