use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};

enum DebounceMsg {
    Arm,
    Flush(oneshot::Sender<()>),
}

/// Coalesces bursts of trigger calls into a single delayed action.
///
/// Each `call` cancels any pending timer and restarts the delay; the action
/// runs once the calls go quiet for the full delay. `flush` runs the action
/// immediately, whether or not a timer is armed. Dropping the handle cancels
/// any pending firing.
pub struct Debounce {
    tx: mpsc::UnboundedSender<DebounceMsg>,
}

impl Debounce {
    pub fn new<F, Fut>(delay: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    DebounceMsg::Flush(done) => {
                        action().await;
                        let _ = done.send(());
                    }
                    DebounceMsg::Arm => loop {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {
                                action().await;
                                break;
                            }
                            msg = rx.recv() => match msg {
                                Some(DebounceMsg::Arm) => continue, // restart the delay
                                Some(DebounceMsg::Flush(done)) => {
                                    action().await;
                                    let _ = done.send(());
                                    break;
                                }
                                None => return,
                            },
                        }
                    },
                }
            }
        });

        Self { tx }
    }

    /// Arm the timer, or restart the delay if it is already armed.
    pub fn call(&self) {
        let _ = self.tx.send(DebounceMsg::Arm);
    }

    /// Run the action now, cancelling any pending timer, and wait for it.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(DebounceMsg::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Async get-or-init cell with an explicit reset.
///
/// The init future runs at most once per generation; concurrent callers wait
/// for the first one. `forget` clears the value so the next call re-runs init.
pub struct MemoOnce<T> {
    cell: Mutex<Option<T>>,
}

impl<T: Clone> MemoOnce<T> {
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut cell = self.cell.lock().await;
        if let Some(value) = cell.as_ref() {
            return value.clone();
        }

        let value = init().await;
        *cell = Some(value.clone());
        value
    }

    pub async fn forget(&self) {
        *self.cell.lock().await = None;
    }
}

impl<T: Clone> Default for MemoOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_debounce(delay_ms: u64) -> (Debounce, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let debounce = Debounce::new(Duration::from_millis(delay_ms), move || {
            let inner = Arc::clone(&inner);
            async move {
                inner.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debounce, count)
    }

    #[tokio::test]
    async fn debounce_coalesces_bursts() {
        let (debounce, count) = counting_debounce(50);

        for _ in 0..5 {
            debounce.call();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debounce_rearms_after_firing() {
        let (debounce, count) = counting_debounce(20);

        debounce.call();
        tokio::time::sleep(Duration::from_millis(80)).await;
        debounce.call();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn flush_fires_immediately_and_cancels_timer() {
        let (debounce, count) = counting_debounce(10_000);

        debounce.call();
        debounce.flush().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The pending timer was consumed by the flush
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_runs_even_when_idle() {
        let (debounce, count) = counting_debounce(10_000);

        debounce.flush().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memo_once_runs_init_once() {
        let memo = MemoOnce::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            let value = memo
                .get_or_init(|| async move { count.fetch_add(1, Ordering::SeqCst) + 41 })
                .await;
            assert_eq!(value, 42);
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memo_once_dedups_concurrent_callers() {
        let memo = Arc::new(MemoOnce::new());
        let count = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let count = Arc::clone(&count);
                tokio::spawn(async move {
                    memo.get_or_init(|| async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        count.fetch_add(1, Ordering::SeqCst)
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 0);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memo_once_forget_resets() {
        let memo = MemoOnce::new();

        let first = memo.get_or_init(|| async { 1 }).await;
        memo.forget().await;
        let second = memo.get_or_init(|| async { 2 }).await;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }
}
