//! Rate-limited request generation.
//!
//! One generator runs per stage. It emits exactly the stage's share of the
//! request budget into the shared queue and then closes the queue, which is
//! the only completion signal the workers receive.

use async_channel::Sender;
use bytes::Bytes;
use stampede_core::{same_key, sequential_key, OperationDescriptor, ValuePool, Workload};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::limiter::RateLimiter;
use crate::options::BenchmarkOptions;
use crate::stage::Stage;

/// Produces the operation stream for one stage.
///
/// Key policy: same-key mode always emits the fixed key; otherwise the
/// `index`-th request uses `sequential_key(key_size, start_index_offset +
/// index)`, so keys never repeat across stages. Read workloads always target
/// `read_key` (the key written by the setup phase).
///
/// Closes `queue` when the stage budget is exhausted or `ctx` is cancelled.
pub async fn generate_requests(
    opts: &BenchmarkOptions,
    stage: Stage,
    pool: &ValuePool,
    read_key: Option<Bytes>,
    queue: Sender<OperationDescriptor>,
    ctx: CancellationToken,
) {
    let limiter = RateLimiter::new(opts.rate_limit);

    for i in 0..stage.request_number {
        if let Some(limiter) = &limiter {
            limiter.wait(&ctx).await;
        }
        if ctx.is_cancelled() {
            break;
        }

        let op = match opts.workload {
            Workload::Write => {
                let key = if opts.same_key {
                    same_key(opts.key_size)
                } else {
                    sequential_key(opts.key_size, stage.start_index_offset + i)
                };
                OperationDescriptor::put(key, pool.pick(i))
            }
            Workload::Read | Workload::ReadOneshot => {
                let key = read_key
                    .clone()
                    .unwrap_or_else(|| same_key(opts.key_size));
                OperationDescriptor::get(key, opts.stale_read)
            }
        };

        if queue.send(op).await.is_err() {
            // All workers are gone; nothing left to feed.
            break;
        }
    }

    queue.close();
    debug!(
        requests = stage.request_number,
        offset = stage.start_index_offset,
        "request generation finished"
    );
}
