//! Monte Carlo Pi Estimation - A classic parallel computing example.
//!
//! This example estimates the value of π by randomly sampling points in a
//! unit square and counting how many fall inside a quarter circle. Every
//! worker keeps its own samples as a local shard; the hit count and the
//! timing statistics are combined with global `sum`, `max` and `min`.
//!
//! Run with: cargo run --release --example pi_monte_carlo -- --workers 4

use clap::Parser;
use ndarray::Array1;
use parallel_ndarray::{Communicator, ParallelLinalg, Result, Shard, ThreadGroup};
use rand::Rng;
use std::time::Instant;

#[derive(Parser, Debug)]
struct Args {
    /// Number of workers in the group
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Total number of samples (distributed across all workers)
    #[arg(short, long, default_value_t = 10_000_000)]
    samples: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let group = ThreadGroup::new(args.workers)?.with_name("pi");

    let estimates = group.run(|comm| estimate(&comm, args.samples))?;
    for estimate in estimates {
        let pi = estimate?;
        // Each worker holds the same estimate
        assert!(
            (pi - std::f64::consts::PI).abs() < 0.01,
            "Pi estimate {} is too far from actual value",
            pi
        );
    }

    println!("\n✓ All workers verified the result!");
    Ok(())
}

fn estimate<C: Communicator>(comm: &C, total_samples: u64) -> Result<f64> {
    let linalg = ParallelLinalg::new(comm);
    let rank = comm.rank();
    let size = comm.size();
    let samples_per_worker = total_samples / size as u64;

    if rank == 0 {
        println!("╔════════════════════════════════════════════════════╗");
        println!("║   Monte Carlo Pi Estimation with parallel-ndarray  ║");
        println!("╠════════════════════════════════════════════════════╣");
        println!("║ Workers: {:>10}                                ║", size);
        println!("║ Total samples: {:>12}                        ║", total_samples);
        println!("║ Samples/worker: {:>11}                        ║", samples_per_worker);
        println!("╚════════════════════════════════════════════════════╝");
        println!();
    }

    comm.barrier()?;
    let start = Instant::now();

    let mut rng = rand::thread_rng();
    // Local shard: 1.0 for a hit inside the quarter circle, 0.0 otherwise
    let hits = Array1::from_shape_fn(samples_per_worker as usize, |_| {
        let x: f64 = rng.gen();
        let y: f64 = rng.gen();
        if x * x + y * y <= 1.0 {
            1.0
        } else {
            0.0
        }
    });

    let global_inside = linalg.sum(&hits)?;
    let elapsed = start.elapsed().as_secs_f64();
    let max_time = linalg.max(Shard::scalar(elapsed))?;
    let min_time = linalg.min(Shard::scalar(elapsed))?;

    let actual_samples = samples_per_worker * size as u64;
    // π/4 = (points inside circle) / (total points)
    let pi_estimate = 4.0 * global_inside / actual_samples as f64;

    if rank == 0 {
        let error = (pi_estimate - std::f64::consts::PI).abs();
        let relative_error = error / std::f64::consts::PI * 100.0;

        println!("Results:");
        println!("--------");
        println!("  Points inside quarter circle: {}", global_inside);
        println!("  Total points sampled: {}", actual_samples);
        println!();
        println!("  Estimated π: {:.10}", pi_estimate);
        println!("  Actual π:    {:.10}", std::f64::consts::PI);
        println!("  Error:       {:.10} ({:.6}%)", error, relative_error);
        println!();
        println!("Performance:");
        println!("-----------");
        println!("  Min time: {:.4}s", min_time);
        println!("  Max time: {:.4}s", max_time);
        println!("  Samples/second: {:.2e}", actual_samples as f64 / max_time);
    }

    Ok(pi_estimate)
}
