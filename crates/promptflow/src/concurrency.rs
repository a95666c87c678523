//! Bounded fan-out over a slice with results kept in input order.

use std::future::Future;

use futures_util::stream::{self, StreamExt};

/// Runs `task` for every element of `items` with at most `limit` tasks in
/// flight and returns the results in input order.
///
/// Tasks complete in any order; each result is written back to the slot of
/// the element that produced it.
pub async fn run_bounded<'a, T, R, F, Fut>(items: &'a [T], limit: usize, task: F) -> Vec<R>
where
    F: Fn(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut slots: Vec<Option<R>> = Vec::with_capacity(items.len());
    slots.resize_with(items.len(), || None);

    let task = &task;
    let mut completed = stream::iter(items.iter().enumerate())
        .map(|(index, item)| async move { (index, task(index, item).await) })
        .buffer_unordered(limit.max(1));

    while let Some((index, result)) = completed.next().await {
        slots[index] = Some(result);
    }

    slots.into_iter().flatten().collect()
}
