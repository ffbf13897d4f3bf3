use std::future::Future;
use std::time::Duration;

enum First<A, B> {
    Primary(A),
    Secondary(B),
}

/// Join two independently completing futures.
///
/// Resolves once both are done, or once `primary` is done and `secondary`
/// has not followed within `grace`. Either future may already be complete
/// when this is first polled. When both are ready in the same poll the
/// secondary value is kept.
pub async fn join_with_grace<A, B>(
    primary: A,
    secondary: B,
    grace: Duration,
) -> (A::Output, Option<B::Output>)
where
    A: Future,
    B: Future,
{
    tokio::pin!(primary);
    tokio::pin!(secondary);

    let first = tokio::select! {
        biased;
        value = &mut secondary => First::Secondary(value),
        value = &mut primary => First::Primary(value),
    };

    match first {
        First::Secondary(second) => (primary.await, Some(second)),
        First::Primary(first) => {
            let second = tokio::time::timeout(grace, secondary).await.ok();
            (first, second)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, sleep};

    #[tokio::test(start_paused = true)]
    async fn secondary_first_waits_for_primary_without_deadline() {
        let started = Instant::now();
        let (a, b) = join_with_grace(
            async {
                sleep(Duration::from_secs(30)).await;
                "ready"
            },
            async { 5 },
            Duration::from_secs(3),
        )
        .await;

        assert_eq!((a, b), ("ready", Some(5)));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_is_measured_from_primary() {
        let started = Instant::now();
        let (_, b) = join_with_grace(
            sleep(Duration::from_secs(2)),
            async {
                sleep(Duration::from_secs(4)).await;
                1
            },
            Duration::from_secs(3),
        )
        .await;

        assert_eq!(b, Some(1));
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_secondary_times_out_after_grace() {
        let started = Instant::now();
        let (_, b) = join_with_grace(
            async {},
            std::future::pending::<u8>(),
            Duration::from_millis(3_000),
        )
        .await;

        assert_eq!(b, None);
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn both_already_complete_keeps_secondary() {
        let (a, b) =
            join_with_grace(async { 1 }, async { 2 }, Duration::ZERO).await;
        assert_eq!((a, b), (1, Some(2)));
    }
}
