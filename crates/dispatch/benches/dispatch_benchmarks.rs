use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::time::Duration;

use herald_core::JobId;
use herald_dispatch::{Backoff, WorkQueue};

/// Queue churn: add / get / done cycles at various batch sizes.
fn bench_queue_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("workqueue_churn");

    for batch in [64usize, 512, 4096] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let ids: Vec<JobId> = (0..batch).map(|_| JobId::new()).collect();
            b.iter(|| {
                let queue = WorkQueue::new();
                for id in &ids {
                    queue.add(*id);
                }
                while let Some(id) = {
                    if queue.is_empty() {
                        None
                    } else {
                        queue.get()
                    }
                } {
                    queue.done(black_box(id));
                }
                queue.shut_down();
            });
        });
    }

    group.finish();
}

/// De-dup cost: repeated adds of the same hot id.
fn bench_queue_dedup(c: &mut Criterion) {
    c.bench_function("workqueue_dedup_hot_id", |b| {
        let queue = WorkQueue::new();
        let id = JobId::new();
        b.iter(|| {
            for _ in 0..100 {
                queue.add(black_box(id));
            }
            queue.get();
            queue.done(id);
        });
        queue.shut_down();
    });
}

fn bench_backoff_delay(c: &mut Criterion) {
    c.bench_function("backoff_delay_for_attempt", |b| {
        let backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(180));
        b.iter(|| {
            for attempt in 1..32u32 {
                black_box(backoff.delay_for_attempt(black_box(attempt)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_queue_churn,
    bench_queue_dedup,
    bench_backoff_delay
);
criterion_main!(benches);
