//! `aosched messaging` - worker threads talk to a mailbox

use aosched_engine::Scheduler;
use aosched_runtime::Mailbox;
use anyhow::Context;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn execute(scheduler: &Scheduler, workers: usize, max_delay_ms: u64) -> anyhow::Result<()> {
    if workers == 0 {
        return Ok(());
    }

    let mailbox = Mailbox::new(scheduler);
    let handled = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let mailbox = mailbox.clone();
        let handled = handled.clone();
        let label = format!("messenger-{i}");
        let handle = scheduler
            .spawn_worker(&label, move || {
                let delay = rand::thread_rng().gen_range(0..=max_delay_ms);
                std::thread::sleep(Duration::from_millis(delay));

                let action = format!("Action {i}");
                tracing::info!(%action, delay, "sending request");
                let closer = mailbox.clone();
                let reply = mailbox.request(move || {
                    println!("handler: {action} Param 1 Param 2 Param 3");
                    if handled.fetch_add(1, Ordering::SeqCst) + 1 == workers {
                        closer.close();
                    }
                    action
                });
                match &reply {
                    Ok(result) => println!("worker {i} got: {result}"),
                    Err(err) => println!("worker {i} failed: {err}"),
                }
                reply
            })
            .with_context(|| format!("spawning {label}"))?;
        handles.push(handle);
    }

    scheduler.run()?;

    for handle in handles {
        match handle.join() {
            Ok(reply) => {
                reply?;
            }
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_worker_gets_a_reply() {
        let scheduler = Scheduler::new();
        execute(&scheduler, 3, 10).unwrap();
        assert!(scheduler.is_quiescent());
    }
}
