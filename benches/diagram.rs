//! Benchmarks for relationship diagram construction.
//!
//! Benchmark targets:
//! - 10 themes / 200 initiatives, all themes: <5ms
//! - Single selected theme: <1ms

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use orgloom::models::{Collection, TypeFilter, fields_from_value};
use orgloom::services::{DiagramBuilder, DiagramData};
use orgloom::storage::{DocumentStore, InMemoryDocumentStore};
use serde_json::json;

/// Seeds a store with `themes` themes, `themes * per_theme` initiatives and
/// a small organization tree.
fn seeded_store(themes: usize, per_theme: usize) -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    let put = |collection, id: String, value| {
        store
            .set(collection, &id, fields_from_value(value).unwrap())
            .unwrap();
    };

    put(Collection::Organizations, "div".to_string(), json!({"name": "Division"}));
    for o in 0..20 {
        let kind = if o % 3 == 0 { "company" } else { "department" };
        put(
            Collection::Organizations,
            format!("o{o}"),
            json!({"name": format!("Org {o}"), "type": kind, "parentId": "div"}),
        );
    }
    for t in 0..50 {
        put(
            Collection::Topics,
            format!("m{}-topic-tp{t}", t % 5),
            json!({"title": format!("Topic {t}")}),
        );
    }
    for t in 0..themes {
        put(
            Collection::Themes,
            format!("t{t}"),
            json!({"title": format!("Theme {t}"), "position": t}),
        );
        for i in 0..per_theme {
            let n = t * per_theme + i;
            put(
                Collection::FocusInitiatives,
                format!("i{n}"),
                json!({
                    "title": format!("Initiative {n}"),
                    "themeIds": [format!("t{t}")],
                    "organizationId": format!("o{}", n % 20),
                    "relatedOrganizations": [format!("o{}", (n + 7) % 20)],
                    "topicIds": [format!("tp{}", n % 50), format!("tp{}", n % 60)],
                }),
            );
        }
    }
    store
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagram_build");
    group.measurement_time(Duration::from_secs(5));

    for (themes, per_theme) in [(2, 5), (10, 20), (25, 40)] {
        let data = DiagramData::load(&seeded_store(themes, per_theme)).unwrap();
        let builder = DiagramBuilder::default();
        let initiatives = (themes * per_theme) as u64;

        group.throughput(Throughput::Elements(initiatives));
        group.bench_with_input(
            BenchmarkId::new("all_themes", initiatives),
            &data,
            |b, data| {
                b.iter(|| builder.build(black_box(data), None, &TypeFilter::All));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("selected_theme", initiatives),
            &data,
            |b, data| {
                b.iter(|| builder.build(black_box(data), Some("t1"), &TypeFilter::All));
            },
        );
    }

    group.finish();
}

fn bench_type_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagram_type_filter");
    let data = DiagramData::load(&seeded_store(10, 20)).unwrap();
    let builder = DiagramBuilder::default();

    for filter in ["all", "company", "department"] {
        let parsed = TypeFilter::parse(filter);
        group.bench_with_input(BenchmarkId::from_parameter(filter), &parsed, |b, parsed| {
            b.iter(|| builder.build(black_box(&data), None, parsed));
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagram_load");
    let store = seeded_store(10, 20);

    group.bench_function("load_from_store", |b| {
        b.iter(|| DiagramData::load(black_box(&store)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_type_filter, bench_load);
criterion_main!(benches);
