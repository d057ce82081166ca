use rand::rngs::SmallRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{CbnError, Result};

pub fn build_pool(threads: usize) -> Result<ThreadPool> {
    if threads == 0 {
        return Err(CbnError::invalid("number of threads must be >= 1"));
    }
    Ok(ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("mccbn-worker-{i}"))
        .build()?)
}

/// Chunk `t` holds `ceil(n / k)` consecutive observations and runs in order on
/// `rngs[t]`. Results keep observation order.
pub fn map_observations<T, F>(
    pool: &ThreadPool,
    rngs: &mut [SmallRng],
    n: usize,
    f: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &mut SmallRng) -> Result<T> + Sync,
{
    let chunk = n.div_ceil(rngs.len().max(1)).max(1);
    let parts: Vec<Result<Vec<T>>> = pool.install(|| {
        rngs.par_iter_mut()
            .enumerate()
            .map(|(t, rng)| {
                let start = (t * chunk).min(n);
                let end = (start + chunk).min(n);
                (start..end).map(|i| f(i, rng)).collect()
            })
            .collect()
    });

    let mut out = Vec::with_capacity(n);
    for part in parts {
        out.extend(part?);
    }
    Ok(out)
}
