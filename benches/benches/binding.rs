// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for path parsing and expression evaluation.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::rc::Rc;

use understory_binding::{ExpressionObserver, parse_path};
use understory_property::{Observer, PropertyBag, Value, ValueList, ValueStream};

/// Builds `depth` nested bags linked through `Child`, with `Name` on the leaf.
fn nested(depth: usize) -> (Rc<PropertyBag>, Vec<Rc<PropertyBag>>, String) {
    let mut bags = Vec::with_capacity(depth + 1);
    let mut current = Rc::new(PropertyBag::new().with("Name", "leaf"));
    bags.push(current.clone());
    for _ in 0..depth {
        current = Rc::new(PropertyBag::new().with("Child", Value::object(current.clone())));
        bags.push(current.clone());
    }
    let mut path = "Child.".repeat(depth);
    path.push_str("Name");
    (current, bags, path)
}

fn bench_binding(c: &mut Criterion) {
    let mut group = c.benchmark_group("binding/parse");
    for path in ["Foo", "Foo.Bar.Baz", "!Items[0, key].Child().Name"] {
        group.bench_function(BenchmarkId::from_parameter(path), |b| {
            b.iter(|| black_box(parse_path(black_box(path))));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("binding/evaluate");

    for depth in [1_usize, 4, 16] {
        group.bench_function(BenchmarkId::new("subscribe", depth), |b| {
            let (root, _bags, path) = nested(depth);
            b.iter_batched(
                || ExpressionObserver::new(Value::object(root.clone()), &path).unwrap(),
                |expression| {
                    let sub = expression.subscribe(Observer::from_fn(|n| {
                        black_box(n);
                    }));
                    drop(sub);
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(BenchmarkId::new("leaf_change", depth), |b| {
            let (root, bags, path) = nested(depth);
            let expression = ExpressionObserver::new(Value::object(root.clone()), &path).unwrap();
            let _sub = expression.subscribe(Observer::from_fn(|n| {
                black_box(n);
            }));
            let leaf = &bags[0];
            let mut x = 0_i64;
            b.iter(|| {
                x += 1;
                leaf.set("Name", Value::Int(x));
            });
        });

        group.bench_function(BenchmarkId::new("root_change", depth), |b| {
            let (root, bags, path) = nested(depth);
            let expression = ExpressionObserver::new(Value::object(root.clone()), &path).unwrap();
            let _sub = expression.subscribe(Observer::from_fn(|n| {
                black_box(n);
            }));
            let Some(first) = bags.get(depth - 1).cloned() else {
                return;
            };
            let mut toggle = false;
            b.iter(|| {
                toggle = !toggle;
                let child = if toggle { Value::Null } else { Value::object(first.clone()) };
                root.set("Child", child);
            });
        });
    }

    group.bench_function("indexer_change", |b| {
        let list = Rc::new(ValueList::new((0..64).map(Value::Int)));
        let expression = ExpressionObserver::new(Value::object(list.clone()), "[32]").unwrap();
        let _sub = expression.subscribe(Observer::from_fn(|n| {
            black_box(n);
        }));
        let mut x = 0_i64;
        b.iter(|| {
            x += 1;
            list.replace(32, x);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_binding);
criterion_main!(benches);
