//! Multi-worker tests for the distributed reductions and products.
//!
//! Every test runs a real worker group in-process and checks that each
//! worker ends up holding the result computed on the unpartitioned data.

use ndarray::{array, s, Array1, Array2, ArrayD, IxDyn};
use parallel_ndarray::{Communicator, Error, ParallelLinalg, Reduced, Shard, ThreadGroup};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;
use std::ops::Range;

/// Contiguous split of `n` items; the last rank takes the remainder.
fn contiguous(rank: usize, size: usize, n: usize) -> Range<usize> {
    let step = n / size;
    let start = rank * step;
    let end = if rank == size - 1 { n } else { start + step };
    start..end
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen())
}

fn random_vector(rng: &mut StdRng, n: usize) -> Array1<f64> {
    Array1::from_shape_fn(n, |_| rng.gen())
}

fn assert_all_close(actual: &ArrayD<f64>, expected: &ArrayD<f64>) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!(
            (a - e).abs() <= 1e-10 * e.abs().max(1.0),
            "got {a}, expected {e}"
        );
    }
}

/// Unwrap every worker's result and check they are identical.
fn replicated<R: PartialEq + std::fmt::Debug>(results: Vec<Result<R, Error>>) -> R {
    let mut results = results.into_iter().map(|r| r.unwrap());
    let first = results.next().unwrap();
    for other in results {
        assert_eq!(other, first, "workers disagree");
    }
    first
}

#[rstest]
fn sum_scalar_replicated(#[values(1, 2, 3, 4, 5)] size: usize) {
    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| ParallelLinalg::new(&comm).sum(Shard::scalar(1.0f64)))
        .unwrap();
    assert_eq!(replicated(out), size as f64);
}

#[rstest]
#[case::vector(array![1.0, 2.1, 3.0].into_dyn(), 6.1)]
#[case::matrix(array![[1.0, 2.1, 3.0], [4.0, 5.0, 6.0]].into_dyn(), 21.1)]
fn sum_replicated_array(
    #[case] arr: ArrayD<f64>,
    #[case] local_total: f64,
    #[values(1, 2, 4)] size: usize,
) {
    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| ParallelLinalg::new(&comm).sum(&arr))
        .unwrap();
    let total = replicated(out);
    assert!((total - size as f64 * local_total).abs() < 1e-12 * size as f64 * local_total);
}

#[rstest]
fn max_min_independent_of_split(#[values(1, 2, 3, 4, 5, 6)] size: usize) {
    let global = Array2::from_shape_vec(
        (3, 4),
        vec![-1.0, 1.0, 5.0, 4.0, 4.0, 5.0, 4.0, 5.0, 7.0, 0.0, 1.0, 0.0],
    )
    .unwrap();
    let empty = Array1::<f64>::zeros(0);

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let rank = comm.rank();
            let shard: Shard<'_, f64> = if size >= 4 {
                match rank {
                    0 => global.slice(s![0..2, 0..2]).into(),
                    1 => global.slice(s![0..2, 2..]).into(),
                    2 => global.slice(s![2.., 0..2]).into(),
                    3 => global.slice(s![2.., 2..]).into(),
                    _ => empty.view().into(),
                }
            } else if size >= 2 {
                match rank {
                    0 => global.slice(s![0..2, ..]).into(),
                    1 => global.slice(s![2.., ..]).into(),
                    _ => empty.view().into(),
                }
            } else {
                global.view().into()
            };
            let linalg = ParallelLinalg::new(&comm);
            Ok::<_, Error>((linalg.max(shard.clone())?, linalg.min(shard)?))
        })
        .unwrap();
    assert_eq!(replicated(out), (7.0, -1.0));
}

#[rstest]
fn empty_shard_contributes_identity(#[values(2, 3, 5)] size: usize) {
    let values = array![1.0f64, 0.0, 4.0];
    let empty = Array1::<f64>::zeros(0);

    for empty_rank in [0, size - 1] {
        let out = ThreadGroup::new(size)
            .unwrap()
            .run(|comm| {
                let local = if comm.rank() == empty_rank { &empty } else { &values };
                let linalg = ParallelLinalg::new(&comm);
                Ok::<_, Error>((linalg.max(local)?, linalg.min(local)?))
            })
            .unwrap();
        assert_eq!(replicated(out), (4.0, 0.0));
    }
}

#[rstest]
fn all_shards_empty(#[values(1, 2, 4)] size: usize) {
    let empty = Array2::<f64>::zeros((0, 3));
    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let linalg = ParallelLinalg::new(&comm);
            Ok::<_, Error>((linalg.sum(&empty)?, linalg.max(&empty)?, linalg.min(&empty)?))
        })
        .unwrap();
    assert_eq!(replicated(out), (0.0, f64::NEG_INFINITY, f64::INFINITY));
}

#[rstest]
fn nan_loses_in_max_and_min_but_poisons_sum(#[values(1, 2, 4)] size: usize) {
    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let r = comm.rank() as f64;
            let local = array![f64::NAN, r, -r];
            let linalg = ParallelLinalg::new(&comm);
            Ok::<_, Error>((linalg.sum(&local)?, linalg.max(&local)?, linalg.min(&local)?))
        })
        .unwrap();
    let top = (size - 1) as f64;
    for result in out {
        let (sum, max, min) = result.unwrap();
        assert!(sum.is_nan());
        assert_eq!(max, top);
        assert_eq!(min, -top);
    }
}

#[rstest]
fn reductions_invariant_under_random_partitions(#[values(1, 3, 6)] size: usize) {
    let mut rng = StdRng::seed_from_u64(7);
    let global = Array1::from_shape_fn(37, |_| rng.gen_range(-50.0f64..50.0));

    for _ in 0..5 {
        // Sorted cut points, repeats allowed, so some shards come out empty.
        let mut cuts: Vec<usize> = (0..size - 1).map(|_| rng.gen_range(0..=37)).collect();
        cuts.sort_unstable();
        cuts.insert(0, 0);
        cuts.push(37);

        let out = ThreadGroup::new(size)
            .unwrap()
            .run(|comm| {
                let r = comm.rank();
                let local = global.slice(s![cuts[r]..cuts[r + 1]]);
                let linalg = ParallelLinalg::new(&comm);
                Ok::<_, Error>((linalg.sum(local)?, linalg.max(local)?, linalg.min(local)?))
            })
            .unwrap();
        let (sum, max, min) = replicated(out);
        assert!((sum - global.sum()).abs() < 1e-9);
        assert_eq!(max, global.fold(f64::NEG_INFINITY, |a, &b| a.max(b)));
        assert_eq!(min, global.fold(f64::INFINITY, |a, &b| a.min(b)));
    }
}

#[rstest]
fn dot_vectors(#[values(1, 2, 3, 4, 5, 11)] size: usize) {
    let n = 10;
    let mut rng = StdRng::seed_from_u64(1);
    let a = random_vector(&mut rng, n);
    let b = random_vector(&mut rng, n);

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = contiguous(comm.rank(), size, n);
            ParallelLinalg::new(&comm).dot(a.slice(s![local.clone()]), b.slice(s![local]))
        })
        .unwrap();
    let result = replicated(out).into_scalar().unwrap();
    assert!((result - a.dot(&b)).abs() < 1e-7);
}

#[rstest]
fn dot_matrix_vector(#[values(1, 2, 3, 4, 5)] size: usize) {
    let (m, n) = (13, 11);
    let mut rng = StdRng::seed_from_u64(1);
    let a = random_matrix(&mut rng, m, n);
    let column = random_matrix(&mut rng, n, 1);
    let vector = random_vector(&mut rng, n);

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = contiguous(comm.rank(), size, n);
            let linalg = ParallelLinalg::new(&comm);
            let a_loc = a.slice(s![.., local.clone()]);
            let column_loc = column.slice(s![local.clone(), ..]);
            let vector_loc = vector.slice(s![local]);
            Ok::<_, Error>((
                linalg.dot(a_loc, column_loc)?,
                linalg.dot(column_loc.t(), a_loc.t())?,
                linalg.dot(a_loc, vector_loc)?,
                linalg.dot(vector_loc, a_loc.t())?,
            ))
        })
        .unwrap();
    let (ab_column, ba_column, ab_vector, ba_vector) = replicated(out);

    assert_eq!(ab_column.shape(), vec![m, 1]);
    assert_all_close(&ab_column.into_dyn(), &a.dot(&column).into_dyn());
    assert_eq!(ba_column.shape(), vec![1, m]);
    assert_all_close(&ba_column.into_dyn(), &column.t().dot(&a.t()).into_dyn());
    assert_eq!(ab_vector.shape(), vec![m]);
    assert_all_close(&ab_vector.into_dyn(), &a.dot(&vector).into_dyn());
    assert_all_close(&ba_vector.into_dyn(), &vector.dot(&a.t()).into_dyn());
}

#[rstest]
fn dot_rejects_row_distributed_orientation(#[values(1, 2, 3)] size: usize) {
    let (m, n) = (13, 11);
    let mut rng = StdRng::seed_from_u64(1);
    let a = random_matrix(&mut rng, m, n);
    let column = random_matrix(&mut rng, n, 1);
    let vector = random_vector(&mut rng, n);

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = contiguous(comm.rank(), size, n);
            let linalg = ParallelLinalg::new(&comm);
            let a_loc = a.slice(s![.., local.clone()]);
            let column_loc = column.slice(s![local.clone(), ..]);
            let vector_loc = vector.slice(s![local]);
            let rejected = [
                linalg.dot(vector_loc, a_loc),
                linalg.dot(a_loc.t(), vector_loc),
                linalg.dot(column_loc, a_loc),
                linalg.dot(a_loc.t(), column_loc),
            ];
            // Nothing was sent, so the group is still usable afterwards.
            let after = linalg.sum(vector_loc);
            (rejected, after)
        })
        .unwrap();

    for (rejected, after) in out {
        for result in rejected {
            assert!(
                matches!(result, Err(Error::ShapeMismatch { op: "dot", .. })),
                "{result:?}"
            );
        }
        assert!((after.unwrap() - vector.sum()).abs() < 1e-12);
    }
}

#[rstest]
fn dot_matrix_matrix(#[values(1, 2, 3, 4, 7)] size: usize) {
    let (m, n) = (5, 10);
    let mut rng = StdRng::seed_from_u64(1);
    let a = random_matrix(&mut rng, m, n);
    let b = random_matrix(&mut rng, n, m);

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = contiguous(comm.rank(), size, n);
            ParallelLinalg::new(&comm).dot(a.slice(s![.., local.clone()]), b.slice(s![local, ..]))
        })
        .unwrap();
    let product = replicated(out);
    assert_eq!(product.shape(), vec![m, m]);
    assert_all_close(&product.into_dyn(), &a.dot(&b).into_dyn());
}

#[test]
fn dot_with_more_workers_than_columns() {
    let a = array![[1.0f64, 2.0], [3.0, 4.0]];
    let x = array![1.0f64, -1.0];
    let size = 5;

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = contiguous(comm.rank(), size, 2);
            ParallelLinalg::new(&comm).dot(a.slice(s![.., local.clone()]), x.slice(s![local]))
        })
        .unwrap();
    assert_eq!(replicated(out), Reduced::Vector(array![-1.0, -1.0]));
}

#[test]
fn dot_single_precision() {
    let a = Array2::from_shape_fn((4, 6), |(i, j)| (i * 6 + j) as f32 * 0.5);
    let b = Array2::from_shape_fn((6, 3), |(i, j)| (i + j) as f32);
    let size = 3;

    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = contiguous(comm.rank(), size, 6);
            ParallelLinalg::new(&comm).dot(a.slice(s![.., local.clone()]), b.slice(s![local, ..]))
        })
        .unwrap();
    let product = replicated(out).into_matrix().unwrap();
    assert_eq!(product, a.dot(&b));
}

#[test]
fn reductions_over_higher_rank_shards() {
    let size = 2;
    let out = ThreadGroup::new(size)
        .unwrap()
        .run(|comm| {
            let local = ArrayD::from_elem(IxDyn(&[2, 2, 3]), comm.rank() as f64 + 1.0);
            let linalg = ParallelLinalg::new(&comm);
            Ok::<_, Error>((linalg.sum(&local)?, linalg.max(&local)?, linalg.min(&local)?))
        })
        .unwrap();
    assert_eq!(replicated(out), (36.0, 2.0, 1.0));
}

#[test]
fn local_shape_error_on_one_worker_releases_peers() {
    let a = Array2::<f64>::ones((3, 4));
    let x = Array1::<f64>::ones(4);
    let bad = Array1::<f64>::ones(3);

    let out = ThreadGroup::new(3)
        .unwrap()
        .run(|comm| {
            let rhs = if comm.rank() == 1 { &bad } else { &x };
            ParallelLinalg::new(&comm).dot(&a, rhs)
        })
        .unwrap();

    assert!(matches!(out[1], Err(Error::ShapeMismatch { .. })));
    assert_eq!(out[0], Err(Error::PeerExited));
    assert_eq!(out[2], Err(Error::PeerExited));
}
