use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lumireg_core::{Document, Whitelist, compact, diff_ranges};
use serde_json::json;

const SLICE_COUNTS: &[usize] = &[100, 1_000, 10_000];

/// Synthetic dense sequence: verdicts flip every `stride` slices so the
/// compactor sees realistic range boundaries instead of one giant range.
fn synthetic_slices(count: usize, stride: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let status = if (i / stride) % 2 == 0 { "GOOD" } else { "BAD" };
            Document::from_value(json!({
                "dt": {"status": status, "comment": "", "cause": ""},
                "csc": {"status": "GOOD", "comment": "", "cause": ""},
                "pixel": {"status": "EXCLUDED", "comment": "", "cause": ""},
            }))
            .expect("object value")
        })
        .collect()
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact.dense");
    let whitelist = Whitelist::from_keys(["dt", "csc", "pixel"]);

    for &count in SLICE_COUNTS {
        let slices = synthetic_slices(count, 16);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("whitelisted", count),
            &slices,
            |b, slices| b.iter(|| black_box(compact(slices, &whitelist))),
        );
        group.bench_with_input(BenchmarkId::new("all", count), &slices, |b, slices| {
            b.iter(|| black_box(compact(slices, &Whitelist::All)))
        });
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff.dense");
    let whitelist = Whitelist::from_keys(["dt", "csc", "pixel"]);

    for &count in SLICE_COUNTS {
        let previous = synthetic_slices(count, 16);
        let observed = synthetic_slices(count, 24);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("whitelisted", count),
            &(previous, observed),
            |b, (previous, observed)| {
                b.iter(|| black_box(diff_ranges(previous, observed, &whitelist)))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compact, bench_diff);
criterion_main!(benches);
