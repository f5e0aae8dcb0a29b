use std::future::Future;

/// Requests in flight at once during a blob upload or download.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Run `f` over `items` in sequential batches of `batch_size`.
///
/// Futures inside a batch run concurrently. The first error drops the rest
/// of its batch and skips all later batches. Results keep input order.
pub async fn run_batched<T, R, E, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    mut f: F,
) -> Result<Vec<R>, E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();

    while items.peek().is_some() {
        let batch: Vec<Fut> = items.by_ref().take(batch_size).map(&mut f).collect();
        results.extend(futures::future::try_join_all(batch).await?);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn preserves_input_order() {
        let items: Vec<u64> = (0..45).collect();
        let out: Vec<u64> = run_batched(items, 20, |n| async move {
            tokio::time::sleep(Duration::from_millis(45 - n)).await;
            Ok::<_, ()>(n * 2)
        })
        .await
        .unwrap();

        assert_eq!(out, (0..45).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_batch_size() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_batched((0..50).collect(), 20, |_: u32| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }
        })
        .await
        .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn failure_stops_later_batches() {
        let started = Arc::new(AtomicUsize::new(0));

        let result = run_batched((0..60).collect(), 20, |n: u32| {
            let started = Arc::clone(&started);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if n == 25 { Err(format!("item {n}")) } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "item 25");
        // First batch completes, the second starts, the third never runs.
        assert!(started.load(Ordering::SeqCst) <= 40);
    }

    #[tokio::test]
    async fn empty_input_is_ok() {
        let out: Vec<u8> = run_batched(Vec::<u8>::new(), 20, |n| async move { Ok::<_, ()>(n) })
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
