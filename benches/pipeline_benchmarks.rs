//! Benchmarks for the numeric core: filtering and pose solving.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

use head_kinematics::camera::CameraModel;
use head_kinematics::constants::FACE_MODEL_POINTS;
use head_kinematics::filter::Butterworth;
use head_kinematics::pnp::{augment_projection, decompose_projection, project_point, solve_pnp};

fn bench_filter(c: &mut Criterion) {
    let filter = Butterworth::default();
    let mut group = c.benchmark_group("filter");

    for length in [64usize, 1024, 8192] {
        let signal: Vec<f64> = (0..length)
            .map(|i| (i as f64 * 0.05).sin() + 0.1 * (i as f64 * 1.7).sin())
            .collect();
        group.bench_with_input(BenchmarkId::new("filtfilt", length), &signal, |b, s| {
            b.iter(|| black_box(filter.apply(black_box(s)).unwrap()));
        });
    }
    group.finish();
}

fn bench_pose_solve(c: &mut Criterion) {
    let camera = CameraModel::default();
    let object: Vec<Point3<f64>> = FACE_MODEL_POINTS
        .iter()
        .map(|p| Point3::new(p[0], p[1], p[2]))
        .collect();
    let frontal = Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0);
    let rotation = Rotation3::from_matrix(
        &(Rotation3::from_axis_angle(&Vector3::y_axis(), 0.2).into_inner() * frontal),
    );
    let translation = Vector3::new(0.0, 0.0, 50.0);
    let image: Vec<Point2<f64>> = object
        .iter()
        .map(|p| project_point(p, &rotation, &translation, &camera))
        .collect();

    c.bench_function("solve_pnp", |b| {
        b.iter(|| black_box(solve_pnp(black_box(&object), black_box(&image), &camera).unwrap()));
    });

    let rmat = rotation.into_inner();
    c.bench_function("decompose_projection", |b| {
        b.iter(|| black_box(decompose_projection(&augment_projection(black_box(&rmat)))));
    });
}

criterion_group!(benches, bench_filter, bench_pose_solve);
criterion_main!(benches);
