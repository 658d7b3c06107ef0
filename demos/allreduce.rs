//! All-reduce example - global reductions over sharded arrays.
//!
//! Exercises `sum`, `max` and `min` with replicated, partitioned and empty
//! shards, checking the result on every worker.
//!
//! Run with: cargo run --example allreduce -- --workers 4

use clap::Parser;
use ndarray::{array, s, Array1, Array2};
use parallel_ndarray::{Communicator, ParallelLinalg, Result, Shard, ThreadGroup};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Global reductions across an in-process worker group")]
struct Args {
    /// Number of workers in the group
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let group = ThreadGroup::new(args.workers)?;
    let outcomes = group.run(|comm| run_worker(&comm))?;
    for outcome in outcomes {
        outcome?;
    }

    println!("\n========================================");
    println!("All reduction tests passed!");
    println!("========================================");
    Ok(())
}

fn run_worker<C: Communicator>(comm: &C) -> Result<()> {
    let linalg = ParallelLinalg::new(comm);
    let rank = comm.rank();
    let size = comm.size();

    // ============================================================
    // Test 1: Sum of a replicated scalar
    // ============================================================
    {
        let total = linalg.sum(Shard::scalar(1.0f64))?;
        assert_eq!(total, size as f64, "Scalar sum failed on rank {}", rank);
        if rank == 0 {
            println!("✓ Scalar sum test passed (sum = {})", total);
        }
    }

    // ============================================================
    // Test 2: Sum of a replicated matrix
    // ============================================================
    {
        let local = array![[1.0, 2.1, 3.0], [4.0, 5.0, 6.0]];
        let total = linalg.sum(&local)?;
        let expected = size as f64 * 21.1;
        assert!(
            (total - expected).abs() < 1e-9,
            "Matrix sum failed on rank {}",
            rank
        );
        if rank == 0 {
            println!("✓ Matrix sum test passed (sum = {})", total);
        }
    }

    // ============================================================
    // Test 3: Max / min of a row-partitioned matrix
    // ============================================================
    {
        let global = Array2::from_shape_fn((size + 2, 3), |(i, j)| (i * 3 + j) as f64 - 4.0);
        // Rank 0 takes three rows, every other rank one row
        let rows = if rank == 0 { 0..3 } else { rank + 2..rank + 3 };
        let local = global.slice(s![rows, ..]);

        let max = linalg.max(local)?;
        let min = linalg.min(local)?;
        assert_eq!(max, ((size + 2) * 3 - 1) as f64 - 4.0, "Max failed on rank {}", rank);
        assert_eq!(min, -4.0, "Min failed on rank {}", rank);
        if rank == 0 {
            println!("✓ Partitioned max/min test passed (max = {}, min = {})", max, min);
        }
    }

    // ============================================================
    // Test 4: Empty shards contribute identity elements
    // ============================================================
    {
        let values = array![1.0f64, 0.0, 4.0];
        let empty = Array1::<f64>::zeros(0);
        let local = if rank == 0 && size > 1 { &empty } else { &values };

        assert_eq!(linalg.max(local)?, 4.0, "Empty max failed on rank {}", rank);
        assert_eq!(linalg.min(local)?, 0.0, "Empty min failed on rank {}", rank);
        assert_eq!(linalg.max(&empty)?, f64::NEG_INFINITY);
        assert_eq!(linalg.min(&empty)?, f64::INFINITY);
        if rank == 0 {
            println!("✓ Empty shard test passed");
        }
    }

    comm.barrier()
}
