use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Time-boxed execution slot for one task attempt.
///
/// Cancels `expiration` when the budget elapses. The slot is released exactly
/// once, either by [`BudgetGuard::release`] or on drop.
pub struct BudgetGuard {
    name: String,
    timer: Option<JoinHandle<()>>,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl BudgetGuard {
    /// Begins a budget of `budget` for `name`. Requires a tokio runtime.
    pub fn begin(
        name: impl Into<String>,
        budget: Duration,
        expiration: CancellationToken,
        on_release: impl FnOnce() + Send + 'static,
    ) -> Self {
        let name = name.into();
        let timer_name = name.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            debug!(task = %timer_name, ?budget, "execution budget expired");
            expiration.cancel();
        });

        Self {
            name,
            timer: Some(timer),
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn release(mut self) {
        self.release_slot();
    }

    fn release_slot(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(on_release) = self.on_release.take() {
            debug!(task = %self.name, "released execution budget");
            on_release();
        }
    }
}

impl Drop for BudgetGuard {
    fn drop(&mut self) {
        self.release_slot();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn explicit_release_runs_once_and_stops_timer() {
        let (count, on_release) = counter();
        let token = CancellationToken::new();
        let guard = BudgetGuard::begin("t", Duration::from_millis(20), token.clone(), on_release);
        guard.release();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn expiry_cancels_token_and_drop_releases_once() {
        let (count, on_release) = counter();
        let token = CancellationToken::new();
        let guard = BudgetGuard::begin("t", Duration::from_millis(10), token.clone(), on_release);

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("budget expiry");
        assert_eq!(count.load(Ordering::SeqCst), 0);

        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
