use aosched_engine::{ActiveObject, ActiveThread, ManualClock, Scheduler, SchedulerOptions, Timer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

fn bench_local_completions(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_completions");

    for count in [1usize, 16, 256] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("objects", count), &count, |b, &count| {
            let scheduler = Scheduler::new();
            let objects: Vec<ActiveObject> = (0..count)
                .map(|_| ActiveObject::new(&scheduler, |_| Ok(())))
                .collect();

            b.iter(|| {
                for object in &objects {
                    object.set_active();
                    object.complete();
                }
                scheduler.poll().unwrap();
                black_box(scheduler.is_quiescent())
            });
        });
    }

    group.finish();
}

fn bench_timer_firing(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_firing");

    for count in [16usize, 256] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("one_shot", count), &count, |b, &count| {
            let clock = ManualClock::new();
            let scheduler =
                Scheduler::with_options(SchedulerOptions::default().with_clock(clock.clone()));

            b.iter(|| {
                for i in 0..count {
                    Timer::once(&scheduler, Duration::from_micros(i as u64), |_| Ok(()));
                }
                clock.advance(Duration::from_millis(1));
                scheduler.poll().unwrap();
                black_box(scheduler.timer_count())
            });
        });
    }

    group.finish();
}

fn bench_bridge_round_trip(c: &mut Criterion) {
    c.bench_function("bridge_round_trip", |b| {
        let scheduler = Scheduler::new();
        b.iter(|| ActiveThread::run(&scheduler, || black_box(6 * 7)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_local_completions,
    bench_timer_firing,
    bench_bridge_round_trip
);
criterion_main!(benches);
