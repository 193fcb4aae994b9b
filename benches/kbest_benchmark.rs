use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sales_tour_solver::{
    exact::KBestSearch,
    generator::{DatasetGenerator, GeneratorConfig},
    heuristics::{GreedySolver, TopologicalSolver, TourSolver},
    instance::Scenario,
};

fn benchmark_solvers(c: &mut Criterion) {
    // 4 to 5 sales per scenario keeps the k-best search well under its budget
    let config = GeneratorConfig {
        seed: 2024,
        num_scenarios: 4,
        min_sales: 4,
        max_sales: 5,
        ..GeneratorConfig::default()
    };
    let dataset = DatasetGenerator::new(config)
        .generate("bench")
        .expect("benchmark dataset");
    let scenarios: Vec<Scenario> = dataset.scenarios().expect("benchmark scenarios");

    let search = KBestSearch::default();
    c.bench_function("kbest_top1", |b| {
        b.iter(|| {
            for scenario in &scenarios {
                let _ = search.search(black_box(scenario), &dataset.distances, 1);
            }
        })
    });

    c.bench_function("kbest_top10", |b| {
        b.iter(|| {
            for scenario in &scenarios {
                let _ = search.search(black_box(scenario), &dataset.distances, 10);
            }
        })
    });

    c.bench_function("greedy", |b| {
        let greedy = GreedySolver::new();
        b.iter(|| {
            for scenario in &scenarios {
                let _ = greedy.solve(black_box(scenario), &dataset.distances);
            }
        })
    });

    c.bench_function("topological", |b| {
        let topo = TopologicalSolver::new();
        b.iter(|| {
            for scenario in &scenarios {
                let _ = topo.solve(black_box(scenario), &dataset.distances);
            }
        })
    });
}

criterion_group!(benches, benchmark_solvers);
criterion_main!(benches);
