//! Chunked, self-throttling batch execution.
//!
//! ```rust
//! use hondana::batch::batch_info;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let ids: Vec<u32> = (1..=12).collect();
//! let doubled = batch_info(ids, 5, Duration::from_millis(10), |id| async move { id * 2 }).await;
//! assert_eq!(doubled[0], 2);
//! assert_eq!(doubled.len(), 12);
//! # }
//! ```

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Concurrent requests per chunk when no explicit size is given.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Delay between chunks when no explicit delay is given.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(500);

/// Runs `f` over `items` in chunks of `chunk_size`.
///
/// Items within a chunk run concurrently; chunks run one after another with
/// `delay` between them. Output order matches input order. A `chunk_size` of
/// zero is treated as one.
pub async fn batch_info<T, R, F, Fut>(
    items: Vec<T>,
    chunk_size: usize,
    delay: Duration,
    f: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let chunk_size = chunk_size.max(1);
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut remaining = items.into_iter().peekable();
    let mut chunk_index = 0usize;

    while remaining.peek().is_some() {
        if chunk_index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let chunk: Vec<_> = remaining.by_ref().take(chunk_size).map(&f).collect();
        debug!(chunk = chunk_index, size = chunk.len(), total, "Running batch chunk");
        results.extend(join_all(chunk).await);
        chunk_index += 1;
    }

    results
}
