//! `aosched thread` - blocking work through the synchronous bridge

use aosched_engine::{ActiveThread, Scheduler};
use std::time::{Duration, Instant};

pub fn execute(scheduler: &Scheduler, millis: u64) -> anyhow::Result<()> {
    let start = Instant::now();
    println!("moving for {millis}ms on a worker thread");

    let slept = ActiveThread::run(scheduler, move || {
        let began = Instant::now();
        std::thread::sleep(Duration::from_millis(millis));
        began.elapsed()
    })?;

    println!(
        "worker slept {:.3}s, bridge returned after {:.3}s",
        slept.as_secs_f64(),
        start.elapsed().as_secs_f64()
    );
    scheduler.run()?;
    Ok(())
}
