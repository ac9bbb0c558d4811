use std::sync::{
    atomic::{
        AtomicBool,
        Ordering,
    },
    Arc,
};
use tokio_util::sync::CancellationToken;

/// One-shot broadcast telling every worker to stop. Once closed it stays closed.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    closed: Arc<AtomicBool>,
    token: CancellationToken,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the signal. Returns `true` only for the call that performed the transition.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is closed.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn closes_exactly_once() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_closed());
        assert!(signal.close());
        assert!(!signal.close());
        assert!(!observer.close());
        assert!(observer.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn wakes_every_waiter() {
        let signal = StopSignal::new();
        let waiters = (0..3)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.closed().await })
            })
            .collect::<Vec<_>>();

        tokio::time::sleep(Duration::from_secs(1)).await;
        signal.close();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter was not woken")
                .unwrap();
        }
    }
}
