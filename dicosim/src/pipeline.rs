//! Batched execution of scraping and processing work.
//!
//! Work items are split into fixed-size batches; every worker of a batch is
//! awaited before the next batch starts. Peak concurrency is therefore one
//! batch width, and backpressure falls out of the batch boundary. There is
//! no pipelining across batches and no mid-batch cancellation: a failing
//! worker aborts the run only after the rest of its batch has resolved.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::info;

use crate::Error;

/// Runs `worker` over `items` in batches of `batch_size`, sleeping `delay`
/// between batches.
///
/// Results are collected in completion order within each batch, not in item
/// order; workers that need the association should return their item
/// alongside the result.
///
/// # Errors
///
/// Returns the first worker error or panic of the failing batch, after all
/// workers of that batch have resolved.
pub async fn run_batched<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    delay: Duration,
    worker: F,
) -> Result<Vec<R>, Error>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    let batch_size = batch_size.max(1);
    let batch_count = items.len().div_ceil(batch_size);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while items.peek().is_some() {
        if batch_index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut workers = JoinSet::new();
        for item in items.by_ref().take(batch_size) {
            workers.spawn(worker(item));
        }

        let mut batch_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) => {
                    batch_error.get_or_insert(err);
                }
                Err(err) => {
                    batch_error.get_or_insert(Error::Join(err));
                }
            }
        }
        if let Some(err) = batch_error {
            return Err(err);
        }

        batch_index += 1;
        info!("completed batch {batch_index}/{batch_count}");
    }

    Ok(results)
}
