// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `PriorityValue` resolution.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Once;

use understory_property::{
    BindingPriority, PriorityValue, PriorityValueBuilder, Subject, Value,
};

const ALL: [BindingPriority; 5] = [
    BindingPriority::ANIMATION,
    BindingPriority::LOCAL_VALUE,
    BindingPriority::STYLE_TRIGGER,
    BindingPriority::TEMPLATED_PARENT,
    BindingPriority::STYLE,
];

fn full() -> PriorityValue {
    PriorityValueBuilder::new("Width").priorities(ALL).build()
}

fn bench_property(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: Value={} BindingPriority={}",
            core::mem::size_of::<Value>(),
            core::mem::size_of::<BindingPriority>(),
        );
    });

    let mut group = c.benchmark_group("property/resolve");

    group.bench_function("read", |b| {
        let value = full();
        value.set_value(100.0, BindingPriority::LOCAL_VALUE);
        b.iter(|| black_box(value.value()));
    });

    group.bench_function("set_local", |b| {
        let value = full();
        let mut x = 0_i64;
        b.iter(|| {
            x += 1;
            value.set_value(Value::Int(x), BindingPriority::LOCAL_VALUE);
        });
    });

    group.bench_function("push_shadowed_by_animation", |b| {
        let value = full();
        let style = Subject::new();
        let animation = Subject::behavior(Value::Int(0));
        value.add_binding(BindingPriority::STYLE, &style);
        value.add_binding(BindingPriority::ANIMATION, &animation);
        let mut x = 0_i64;
        b.iter(|| {
            x += 1;
            style.next(Value::Int(x));
        });
    });

    group.bench_function("push_winning", |b| {
        let value = full();
        let animation = Subject::new();
        value.add_binding(BindingPriority::ANIMATION, &animation);
        let mut x = 0_i64;
        b.iter(|| {
            x += 1;
            animation.next(Value::Int(x));
        });
    });

    for bindings in [1_usize, 8, 64] {
        group.bench_function(BenchmarkId::new("fallback_within_level", bindings), |b| {
            let value = full();
            let sources: Vec<Subject> = (0..bindings)
                .map(|i| Subject::behavior(Value::Int(i64::try_from(i).unwrap())))
                .collect();
            for source in &sources {
                value.add_binding(BindingPriority::STYLE, source);
            }
            let Some(top) = sources.last() else {
                return;
            };
            b.iter(|| {
                top.next(Value::Unset);
                top.next(Value::Int(-1));
            });
        });
    }

    group.finish();

    let mut group = c.benchmark_group("property/bindings");

    group.bench_function("add_remove", |b| {
        b.iter_batched(
            || (full(), Subject::behavior(Value::Int(1))),
            |(value, source)| {
                let handle = value.add_binding(BindingPriority::STYLE, &source);
                handle.remove();
                black_box(value);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_property);
criterion_main!(benches);
