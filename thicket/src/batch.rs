//! Fan-out/fan-in over oracle futures on the current task.
//!
//! Futures are polled concurrently (optionally at most `limit` at a time) and their
//! results come back in input order, whatever order they complete in. The first
//! error drops every future still in flight.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

pub(crate) async fn fan_out<F, T, E>(futures: Vec<F>, limit: Option<usize>) -> Result<Vec<T>, E>
where
    F: Future<Output = Result<T, E>>,
{
    let width = limit.unwrap_or(futures.len()).max(1);
    stream::iter(futures).buffered(width).try_collect().await
}
