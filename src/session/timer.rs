use std::future::Future;
use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Identificador único de un timer armado
pub type TimerId = u64;

/// Timer de un solo disparo cancelable.
///
/// The callback runs at most once, after `timeout`, unless [`cancel`] wins
/// first. Whichever of fire/cancel flips the shared state out of `ARMED` wins;
/// cancelling after the callback has started is a no-op and the callback runs
/// to completion. Dropping the timer cancels it.
///
/// [`cancel`]: InactivityTimer::cancel
#[derive(Debug)]
pub struct InactivityTimer {
    id: TimerId,
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl InactivityTimer {
    /// Arma el timer. `callback` recibe el id del timer que lo disparó.
    pub fn start<F, Fut>(timeout: Duration, callback: F) -> Self
    where
        F: FnOnce(TimerId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(AtomicU8::new(ARMED));
        let token = CancellationToken::new();

        let task_state = state.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if task_state
                        .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        debug!("⏰ Timer {} disparado", id);
                        callback(id).await;
                    }
                }
            }
        });

        Self { id, state, token }
    }

    /// Cancela el timer. Devuelve `true` si se evitó el disparo.
    pub fn cancel(&self) -> bool {
        let prevented = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.token.cancel();

        if prevented {
            debug!("⏹️ Timer {} cancelado", self.id);
        }
        prevented
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_timer(timeout: Duration, fired: &Arc<AtomicUsize>) -> InactivityTimer {
        let fired = fired.clone();
        InactivityTimer::start(timeout, move |_| async move {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_timeout() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(Duration::from_secs(300), &fired);

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_fire_prevents_callback() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(Duration::from_secs(10), &fired);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timer.cancel());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(Duration::from_secs(1), &fired);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(!timer.cancel());
        assert!(!timer.cancel());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        drop(counting_timer(Duration::from_secs(1), &fired));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_receives_its_id() {
        let (tx, rx) = flume::bounded(1);
        let timer = InactivityTimer::start(Duration::from_secs(1), move |id| async move {
            let _ = tx.send_async(id).await;
        });

        let received = rx.recv_async().await.unwrap();
        assert_eq!(received, timer.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_racing_with_fire_never_runs_after_cancel() {
        // Con el reloj pausado ambos compiten en el mismo instante
        for _ in 0..50 {
            let fired = Arc::new(AtomicUsize::new(0));
            let timer = counting_timer(Duration::from_millis(10), &fired);

            tokio::time::sleep(Duration::from_millis(10)).await;
            let prevented = timer.cancel();
            tokio::time::sleep(Duration::from_millis(50)).await;

            let runs = fired.load(Ordering::SeqCst);
            if prevented {
                assert_eq!(runs, 0);
            } else {
                assert_eq!(runs, 1);
            }
        }
    }
}
