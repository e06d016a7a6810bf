//! Mailbox behaviour with real worker threads

use aosched_engine::{Scheduler, Timer};
use aosched_runtime::{Mailbox, MailboxError};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_requests_from_workers_get_their_own_replies() {
    const WORKERS: usize = 5;

    let scheduler = Scheduler::new();
    let mailbox = Mailbox::new(&scheduler);
    let handled = Arc::new(AtomicUsize::new(0));
    let replies = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..WORKERS)
        .map(|i| {
            let mailbox = mailbox.clone();
            let handled = handled.clone();
            let replies = replies.clone();
            thread::spawn(move || {
                let delay = rand::thread_rng().gen_range(0..30);
                thread::sleep(Duration::from_millis(delay));

                let closer = mailbox.clone();
                let reply = mailbox.request(move || {
                    if handled.fetch_add(1, Ordering::SeqCst) + 1 == WORKERS {
                        closer.close();
                    }
                    format!("Action {i}")
                });
                replies.lock().push((i, reply));
            })
        })
        .collect();

    scheduler.run().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut replies = replies.lock().clone();
    replies.sort_by_key(|(i, _)| *i);
    assert_eq!(replies.len(), WORKERS);
    for (i, reply) in replies {
        assert_eq!(reply, Ok(format!("Action {i}")));
    }
    assert!(mailbox.is_closed());
}

#[test]
fn test_post_from_worker_returns_after_delivery() {
    let scheduler = Scheduler::new();
    let mailbox = Mailbox::new(&scheduler);
    let delivered = Arc::new(AtomicBool::new(false));

    let worker = {
        let mailbox = mailbox.clone();
        let delivered = delivered.clone();
        thread::spawn(move || {
            let flag = delivered.clone();
            mailbox
                .post(move || flag.store(true, Ordering::SeqCst))
                .unwrap();
            let seen = delivered.load(Ordering::SeqCst);
            let closer = mailbox.clone();
            mailbox.post(move || closer.close()).unwrap();
            seen
        })
    };

    scheduler.run().unwrap();
    assert!(worker.join().unwrap());
}

#[test]
fn test_request_after_close_fails() {
    let scheduler = Scheduler::new();
    let mailbox = Mailbox::new(&scheduler);
    mailbox.close();
    scheduler.run().unwrap();

    let worker = {
        let mailbox = mailbox.clone();
        thread::spawn(move || mailbox.request(|| 5))
    };
    assert_eq!(worker.join().unwrap(), Err(MailboxError::Closed));
}

#[test]
fn test_timer_closes_mailbox_under_load() {
    const SENDERS: usize = 4;

    let scheduler = Scheduler::new();
    let mailbox = Mailbox::new(&scheduler);
    let delivered = Arc::new(AtomicUsize::new(0));
    let accepted = Arc::new(AtomicUsize::new(0));

    {
        let mailbox = mailbox.clone();
        Timer::once(&scheduler, Duration::from_millis(50), move |_| {
            mailbox.close();
            Ok(())
        });
    }

    let senders: Vec<_> = (0..SENDERS)
        .map(|_| {
            let mailbox = mailbox.clone();
            let delivered = delivered.clone();
            let accepted = accepted.clone();
            thread::spawn(move || loop {
                let delivered = delivered.clone();
                let result = mailbox.post(move || {
                    delivered.fetch_add(1, Ordering::SeqCst);
                });
                match result {
                    Ok(()) => {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => return err,
                }
            })
        })
        .collect();

    scheduler.run().unwrap();

    for sender in senders {
        assert_eq!(sender.join().unwrap(), MailboxError::Closed);
    }
    assert!(delivered.load(Ordering::SeqCst) > 0);
    assert!(delivered.load(Ordering::SeqCst) <= accepted.load(Ordering::SeqCst));
    assert_eq!(scheduler.object_count(), 0);
}

#[test]
fn test_worker_post_waits_for_delivery_behind_local_post() {
    let scheduler = Scheduler::new();
    let mailbox = Mailbox::new(&scheduler);
    let delivered = Arc::new(AtomicBool::new(false));

    // Leaves the object completed with no dispatch yet
    mailbox.post(|| {}).unwrap();

    let worker = {
        let mailbox = mailbox.clone();
        let delivered = delivered.clone();
        thread::spawn(move || {
            let flag = delivered.clone();
            mailbox
                .post(move || flag.store(true, Ordering::SeqCst))
                .unwrap();
            let seen = delivered.load(Ordering::SeqCst);
            mailbox.close();
            seen
        })
    };
    while mailbox.pending() < 2 {
        thread::yield_now();
    }

    scheduler.run().unwrap();
    assert!(worker.join().unwrap());
    assert_eq!(scheduler.object_count(), 0);
}

#[test]
fn test_close_from_worker_while_idle_between_passes() {
    let scheduler = Scheduler::new();
    let mailbox = Mailbox::new(&scheduler);
    let rounds = Arc::new(AtomicUsize::new(0));

    let worker = {
        let mailbox = mailbox.clone();
        let rounds = rounds.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                let rounds = rounds.clone();
                mailbox
                    .post(move || {
                        rounds.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
            mailbox.close();
        })
    };

    scheduler.run().unwrap();
    worker.join().unwrap();
    assert_eq!(rounds.load(Ordering::SeqCst), 20);
    assert!(mailbox.is_closed());
}
