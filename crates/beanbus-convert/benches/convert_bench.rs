// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conversion throughput over a nested value graph.

use beanbus_convert::{ConvertOptions, to_json};
use beanbus_core::{BeanValue, CompositeValue};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn nested_value(width: usize, depth: usize) -> BeanValue {
    if depth == 0 {
        return BeanValue::Int(7);
    }
    BeanValue::Seq(
        (0..width)
            .map(|i| {
                BeanValue::Composite(CompositeValue::new(
                    "Row",
                    [
                        ("index", BeanValue::Int(i as i64)),
                        ("child", nested_value(width, depth - 1)),
                    ],
                ))
            })
            .collect(),
    )
}

fn bench_expand(c: &mut Criterion) {
    let value = nested_value(8, 4);
    let options = ConvertOptions::default();
    c.bench_function("expand_nested", |b| {
        b.iter(|| to_json(black_box(&value), &[], &options).unwrap())
    });

    let bounded = ConvertOptions {
        max_objects: Some(500),
        ..Default::default()
    };
    c.bench_function("expand_nested_bounded", |b| {
        b.iter(|| to_json(black_box(&value), &[], &bounded).unwrap())
    });
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);
