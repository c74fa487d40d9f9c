//! Benchmarks for population operations and genome operators.

use aegis::evolution::{MutationModel, RecombinationModel};
use aegis::simulation::{Config, ConfigBuilder, Population, PopulationParams, ReproductionMode};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::hint::black_box;

fn config(start_pop: usize, mode: ReproductionMode) -> Config {
    ConfigBuilder::new()
        .start_pop(start_pop)
        .reproduction_mode(mode)
        .build()
        .unwrap()
}

fn founders(config: &Config) -> Population {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    Population::founders(
        PopulationParams::from_config(config),
        config.genome_map().unwrap(),
        &mut rng,
    )
}

fn bench_mutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation");
    let config = config(1000, ReproductionMode::Asexual);
    let pop = founders(&config);
    group.throughput(Throughput::Elements(pop.genomes().len() as u64));
    for rate in [1e-4, 1e-3, 0.2] {
        let model = MutationModel::new(rate, 0.1).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rate), &model, |b, model| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
            b.iter_batched(
                || pop.genomes().clone(),
                |mut genomes| black_box(model.mutate_genomes(&mut genomes, &mut rng)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_recombination(c: &mut Criterion) {
    let mut group = c.benchmark_group("recombination");
    let config = config(1000, ReproductionMode::Sexual);
    let pop = founders(&config);
    for rate in [0.01, 0.5] {
        let model = RecombinationModel::new(rate).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rate), &model, |b, model| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
            b.iter_batched(
                || pop.genomes().clone(),
                |mut genomes| black_box(model.recombine_genomes(&mut genomes, 10, &mut rng)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_growth_and_death(c: &mut Criterion) {
    let mut group = c.benchmark_group("demography");
    for pop_size in [500, 5000] {
        let config = config(pop_size, ReproductionMode::Sexual);
        let pop = founders(&config);
        let surv = config.surv_range();
        let repr = config.repr_range();
        group.bench_with_input(BenchmarkId::new("growth", pop_size), &pop, |b, pop| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
            b.iter_batched(
                || pop.clone(),
                |mut p| black_box(p.growth(&repr, 1.0, 0.001, 0.1, 0.01, &mut rng).unwrap()),
                criterion::BatchSize::LargeInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("death", pop_size), &pop, |b, pop| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
            b.iter_batched(
                || pop.clone(),
                |mut p| black_box(p.death(&surv, 1.0, &mut rng)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mutation, bench_recombination, bench_growth_and_death);
criterion_main!(benches);
