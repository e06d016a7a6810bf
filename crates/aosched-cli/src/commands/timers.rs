//! `aosched timers` - one-shot, countdown and heartbeat timers

use aosched_engine::{HookResult, PeriodicTimer, Scheduler, Timer, TimerHandler};
use std::time::{Duration, Instant};

/// Timer demo configuration
#[derive(Debug, Clone, Copy)]
pub struct TimersOptions {
    pub oneshot: Duration,
    pub periodic: Duration,
    pub fast: Duration,
    pub count: u32,
}

impl TimersOptions {
    pub fn from_millis(oneshot: u64, periodic: u64, fast: u64, count: u32) -> Self {
        Self {
            oneshot: Duration::from_millis(oneshot),
            periodic: Duration::from_millis(periodic),
            fast: Duration::from_millis(fast),
            count: count.max(1),
        }
    }
}

/// Heartbeat that only reports
struct Heartbeat {
    start: Instant,
}

impl TimerHandler for Heartbeat {
    fn fire(&mut self, timer: &Timer) -> HookResult {
        println!("[{:>7.3}s] heartbeat {}", self.start.elapsed().as_secs_f64(), timer.id());
        Ok(())
    }
}

pub fn execute(scheduler: &Scheduler, options: TimersOptions) -> anyhow::Result<()> {
    let start = Instant::now();

    Timer::once(scheduler, options.oneshot, move |timer| {
        println!("[{:>7.3}s] one-shot {} fired", start.elapsed().as_secs_f64(), timer.id());
        Ok(())
    });

    let heartbeat = PeriodicTimer::with_handler(scheduler, options.fast, Heartbeat { start })
        .into_timer();

    let mut remaining = options.count;
    PeriodicTimer::new(scheduler, options.periodic, move |timer| {
        remaining -= 1;
        println!(
            "[{:>7.3}s] countdown {} fired, {} left",
            start.elapsed().as_secs_f64(),
            timer.id(),
            remaining
        );
        if remaining == 0 {
            timer.delete();
            heartbeat.delete();
        }
        Ok(())
    });

    tracing::info!(timers = scheduler.timer_count(), "timers registered");
    scheduler.run()?;
    println!(
        "countdown finished after {:.3}s",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
