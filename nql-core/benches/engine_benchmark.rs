//! Throughput benchmarks for the two hot paths: predicate evaluation on a single
//! event, and aggregate ingestion into a grouped, windowed bucket set.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nql_core::{execute, Event, EventKind, World};
use serde_json::json;

fn predicate_eval_benchmark(c: &mut Criterion) {
    let mut w = World::new();
    w.open().unwrap();
    let query = r#"log.level == "ERROR" AND network.latency_ms > 100 AND message contains "timeout""#;
    let event = Event::new(
        EventKind::Log,
        0,
        json!({
            "log.level": "ERROR",
            "network.latency_ms": 150.0,
            "message": "connection timeout after retry",
        }),
    );

    c.bench_function("filter_predicate_match", |b| {
        b.iter(|| execute(black_box(&mut w), black_box(query), black_box(&event), black_box(0)).unwrap())
    });
}

fn aggregation_throughput_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_ingest");
    for service_count in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(service_count), &service_count, |b, &service_count| {
            let mut w = World::new();
            w.open().unwrap();
            w.start().unwrap();
            w.run().unwrap();
            let query = r#"aggregate count(), avg(network.latency_ms), percentile(network.latency_ms, 95) by log.service"#;
            let mut i: u64 = 0;
            b.iter(|| {
                let service = format!("svc-{}", i % service_count as u64);
                let event = Event::new(
                    EventKind::Log,
                    0,
                    json!({"log.service": service, "network.latency_ms": (i % 1000) as f64}),
                );
                execute(black_box(&mut w), black_box(query), black_box(&event), black_box(0)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, predicate_eval_benchmark, aggregation_throughput_benchmark);
criterion_main!(benches);
