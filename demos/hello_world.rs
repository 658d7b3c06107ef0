//! Hello World example - bring up a worker group and synchronize it.
//!
//! Run with: PARALLEL_NDARRAY_WORKERS=4 cargo run --example hello_world

use parallel_ndarray::{Communicator, Result, ThreadGroup};

fn main() -> Result<()> {
    // Group size comes from PARALLEL_NDARRAY_WORKERS, or the core count
    let group = ThreadGroup::from_env()?.with_name("hello");

    let reports = group.run(|comm| {
        let rank = comm.rank();
        let size = comm.size();
        let thread = std::thread::current();

        println!(
            "Hello from rank {} of {} on thread {}",
            rank,
            size,
            thread.name().unwrap_or("?")
        );

        // Synchronize before exiting
        comm.barrier()
    })?;

    for report in reports {
        report?;
    }
    println!("\nAll workers reported in. Test passed!");

    Ok(())
}
