//! Interrupt handling for the binary.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit status after a forced stop, as a shell reports SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel `cancel` on the first interrupt and return `true` on the second.
///
/// Returns `false` if the signal stream fails before a second interrupt.
pub async fn watch_interrupts<F, Fut>(cancel: CancellationToken, mut next_signal: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(err) = next_signal().await {
        warn!(error = %err, "cannot listen for interrupts");
        return false;
    }
    warn!("interrupt received, stopping before the next iteration; press Ctrl-C again to quit now");
    cancel.cancel();

    match next_signal().await {
        Ok(()) => {
            warn!("second interrupt received, exiting immediately");
            true
        }
        Err(err) => {
            warn!(error = %err, "cannot listen for interrupts");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    fn signals(
        results: Vec<io::Result<()>>,
    ) -> impl FnMut() -> std::future::Ready<io::Result<()>> {
        let mut results = VecDeque::from(results);
        move || {
            std::future::ready(
                results
                    .pop_front()
                    .unwrap_or_else(|| Err(io::Error::other("no more signals"))),
            )
        }
    }

    #[tokio::test]
    async fn second_interrupt_forces_exit() {
        let cancel = CancellationToken::new();
        let forced = watch_interrupts(cancel.clone(), signals(vec![Ok(()), Ok(())])).await;
        assert!(forced);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn single_interrupt_only_cancels() {
        let cancel = CancellationToken::new();
        let forced = watch_interrupts(cancel.clone(), signals(vec![Ok(())])).await;
        assert!(!forced);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn listener_failure_leaves_the_run_alone() {
        let cancel = CancellationToken::new();
        let err = io::Error::other("signal driver unavailable");
        let forced = watch_interrupts(cancel.clone(), signals(vec![Err(err)])).await;
        assert!(!forced);
        assert!(!cancel.is_cancelled());
    }
}
