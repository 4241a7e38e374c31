//! Trailing-edge debounce on a tokio timer
//!
//! Each `schedule` aborts the pending task and spawns a new one, so the
//! value is published only after `delay` without further changes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Holds the last settled value and at most one pending update
pub struct Debouncer<T> {
    delay: Duration,
    settled: Arc<watch::Sender<T>>,
    pending: Option<JoinHandle<()>>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration) -> Self {
        let (settled, _) = watch::channel(initial);
        Self {
            delay,
            settled: Arc::new(settled),
            pending: None,
        }
    }

    /// Publish `value` once `delay` passes with no newer schedule.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, value: T) {
        self.cancel();
        let settled = self.settled.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            settled.send_replace(value);
        }));
    }

    /// Publish `value` now, dropping any pending update
    pub fn flush(&mut self, value: T) {
        self.cancel();
        self.settled.send_replace(value);
    }

    /// Drop the pending update, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// The last published value
    pub fn current(&self) -> T {
        self.settled.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.settled.subscribe()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(300);

    #[tokio::test(start_paused = true)]
    async fn test_publishes_after_quiet_period() {
        let mut debouncer = Debouncer::new(0, DELAY);
        debouncer.schedule(1);
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(299)).await;
        assert_eq!(debouncer.current(), 0);

        sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(debouncer.current(), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_restarts_timer() {
        let mut debouncer = Debouncer::new(0, DELAY);
        let mut rx = debouncer.subscribe();

        debouncer.schedule(1);
        sleep(Duration::from_millis(200)).await;
        debouncer.schedule(2);

        sleep(Duration::from_millis(299)).await;
        assert_eq!(debouncer.current(), 0);

        sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(debouncer.current(), 2);

        // The intermediate value was never published
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_cancel() {
        let mut debouncer = Debouncer::new(0, DELAY);

        debouncer.schedule(1);
        debouncer.flush(5);
        assert_eq!(debouncer.current(), 5);

        debouncer.schedule(7);
        debouncer.cancel();
        sleep(DELAY * 2).await;
        assert_eq!(debouncer.current(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_pending() {
        let debouncer_rx = {
            let mut debouncer = Debouncer::new(0, DELAY);
            debouncer.schedule(9);
            debouncer.subscribe()
        };

        sleep(DELAY * 2).await;
        assert_eq!(*debouncer_rx.borrow(), 0);
    }
}
