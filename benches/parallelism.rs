mod common;

use common::{Panel, Scale, Series, Timing, output_path, plot_panels, read_timing};
use criterion::{BenchmarkId, Criterion, criterion_group};
use dualtree::dataset::{random_points, seed};
use dualtree::{BoundingBox, DEFAULT_LEAF_SIZE, KdTree, KernelDensity};

const N_POINTS: usize = 200_000;
const METHODS: [&str; 2] = ["tree_build", "kde"];

fn group_name() -> String {
    format!("parallelism_{}k", N_POINTS / 1000)
}

/// Powers of two up to the available cores, plus the core count itself.
fn thread_counts() -> Vec<usize> {
    let max = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(8);
    let mut counts: Vec<usize> = std::iter::successors(Some(1), |&n| Some(n * 2))
        .take_while(|&n| n <= max)
        .collect();
    if counts.last() != Some(&max) {
        counts.push(max);
    }
    counts
}

fn benchmark_parallelism(c: &mut Criterion) {
    let bounds = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    let points = random_points(N_POINTS, &bounds, seed());
    let kde = KernelDensity::builder()
        .bandwidth(0.02)
        .absolute_error(0.1)
        .build()
        .unwrap();
    let tree = KdTree::build(points.clone(), DEFAULT_LEAF_SIZE).unwrap();

    let mut group = c.benchmark_group(group_name());
    group.sample_size(10);

    for threads in thread_counts() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::new("tree_build", threads), &points, |b, points| {
            b.iter(|| pool.install(|| KdTree::build(points.clone(), DEFAULT_LEAF_SIZE).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("kde", threads), &tree, |b, tree| {
            b.iter(|| pool.install(|| kde.estimate_trees(tree, tree)))
        });
    }
    group.finish();
}

fn plot_parallelism_results() -> Result<(), Box<dyn std::error::Error>> {
    let counts = thread_counts();
    let mut time = Vec::new();
    let mut speedup = Vec::new();

    for method in METHODS {
        let mut timings: Vec<(f64, Timing)> = Vec::new();
        for &threads in &counts {
            if let Some(t) = read_timing(&group_name(), method, &threads.to_string())? {
                timings.push((threads as f64, t));
            }
        }
        let Some(single) = timings.first().filter(|(x, _)| *x == 1.0).map(|(_, t)| *t) else {
            continue;
        };
        // Speedup over one thread; a slow run bounds it from below.
        let ratios: Vec<(f64, Timing)> = timings
            .iter()
            .map(|&(x, t)| {
                let ratio = Timing {
                    mean: single.mean / t.mean,
                    lower: single.mean / t.upper,
                    upper: single.mean / t.lower,
                };
                (x, ratio)
            })
            .collect();
        time.push(Series::timed(method, &timings));
        speedup.push(Series::timed(method, &ratios));
    }
    if time.is_empty() {
        return Ok(());
    }
    speedup.insert(0, Series::reference("Ideal", counts.iter().map(|&n| (n as f64, n as f64)).collect()));

    let panels = [
        Panel {
            x_desc: "Number of Threads".into(),
            y_desc: "Time (ms)".into(),
            x_scale: Scale::Linear,
            y_scale: Scale::Log,
            series: time,
        },
        Panel {
            x_desc: "Number of Threads".into(),
            y_desc: "Speedup over one thread".into(),
            x_scale: Scale::Linear,
            y_scale: Scale::Linear,
            series: speedup,
        },
    ];
    let title = format!("Parallelism Benchmark (N={})", N_POINTS);
    plot_panels(&output_path(&format!("bench_parallelism_{}k", N_POINTS / 1000))?, &title, &panels)
}

criterion_group!(benches, benchmark_parallelism);

fn main() {
    benches();
    if let Err(e) = plot_parallelism_results() {
        eprintln!("Error generating plot: {}", e);
    }
}
