//! Periodic side effects tied to the lifetime of a request.
//!
//! A [`Ticker`] owns a spawned task that runs an action every `period`.
//! The task is aborted when the ticker is stopped or dropped, so an early
//! return or `?` can never leave a typing indicator or loading animation
//! running.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Discord shows "is typing" for about 10 s per trigger.
pub const TYPING_PERIOD: Duration = Duration::from_secs(5);

pub const LOADING_PERIOD: Duration = Duration::from_millis(500);

pub struct Ticker {
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Run `action(tick)` every `period`, first one period after start.
    pub fn start<F, Fut>(period: Duration, mut action: F) -> Self
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick = 0u64;
            loop {
                interval.tick().await;
                action(tick).await;
                tick = tick.wrapping_add(1);
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Stop ticking and wait until the task is gone.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting(period: Duration) -> (Ticker, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let ticker = Ticker::start(period, move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        (ticker, count)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let (ticker, count) = counting(LOADING_PERIOD);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1002)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticks() {
        let (ticker, count) = counting(TYPING_PERIOD);
        tokio::time::sleep(Duration::from_secs(11)).await;
        ticker.stop().await;
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_on_early_exit_halts_ticks() {
        let count = {
            let (_ticker, count) = counting(LOADING_PERIOD);
            tokio::time::sleep(Duration::from_millis(600)).await;
            count
        };
        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_numbered() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        let ticker = Ticker::start(LOADING_PERIOD, move |tick| {
            let s = s.clone();
            async move {
                s.lock().unwrap().push(tick);
            }
        });
        tokio::time::sleep(Duration::from_millis(1600)).await;
        ticker.stop().await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
