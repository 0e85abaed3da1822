//! This bench test builds a configuration over a long dependency chain, where
//! every requirement depends on the one declared after it.

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use requisite::{ConfigurationBuilder, Requirement, RequirementSet, RequirementType};

const LENGTH: usize = 500;

/// Generates a requirement set where each requirement depends on the next
fn chain() -> (Arc<RequirementSet>, Vec<Requirement>) {
    let requirements: Vec<_> = (0..LENGTH)
        .map(|i| {
            Requirement::builder(format!("r{i:04}"), RequirementType::integer())
                .build()
                .unwrap()
        })
        .collect();

    let mut builder = RequirementSet::builder().requirements(requirements.iter().cloned());
    for pair in requirements.windows(2) {
        builder = builder.depends_on(&pair[0], &pair[1]).unwrap();
    }

    (Arc::new(builder.build().unwrap()), requirements)
}

fn build_configuration(c: &mut Criterion) {
    let (set, requirements) = chain();

    c.bench_function("build configuration", |b| {
        b.iter_batched(
            || {
                let builder = ConfigurationBuilder::new(Arc::clone(&set));
                for (i, requirement) in requirements.iter().enumerate() {
                    builder.add(requirement, i64::try_from(i).unwrap()).unwrap();
                }
                builder
            },
            |builder| builder.build().unwrap(),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("build requirement set", |b| b.iter(chain));
}

criterion_group!(benches, build_configuration);
criterion_main!(benches);
