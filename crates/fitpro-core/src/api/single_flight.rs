//! Request de-duplication.
//!
//! While one call is in flight, later callers join it instead of issuing
//! their own request and all of them receive the same result. The flight is
//! forgotten as soon as it settles, so the next call after that always
//! starts fresh. State lives in the `SingleFlight` value, so two clients
//! never share flights.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

type SharedResult<T> = Shared<BoxFuture<'static, T>>;

struct Flight<T: Clone> {
    id: u64,
    started_at: Instant,
    future: SharedResult<T>,
}

pub struct SingleFlight<T: Clone> {
    name: &'static str,
    slot: Arc<Mutex<Option<Flight<T>>>>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Whether a call is currently in flight
    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Join the in-flight call, or start one with `make`.
    ///
    /// `make` is only invoked when no call is in flight.
    pub fn run<F, Fut>(&self, make: F) -> SharedResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(flight) = slot.as_ref() {
            debug!(
                name = self.name,
                flight = flight.id,
                age_ms = flight.started_at.elapsed().as_millis() as u64,
                "Joining in-flight request"
            );
            return flight.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot_ref = Arc::clone(&self.slot);
        let call = make();
        let future = async move {
            let output = call.await;
            let mut slot = slot_ref.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|f| f.id == id) {
                *slot = None;
            }
            output
        }
        .boxed()
        .shared();

        *slot = Some(Flight {
            id,
            started_at: Instant::now(),
            future: future.clone(),
        });
        future
    }

    /// Forget the in-flight call. Callers already waiting still get its
    /// result; new callers start a fresh one.
    pub fn reset(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counted(
        counter: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Future<Output = usize> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(delay).await;
            n
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_flight() {
        let flights = SingleFlight::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        let a = flights.run(|| counted(&counter, Duration::from_millis(100)));
        let b = flights.run(|| counted(&counter, Duration::from_millis(100)));
        assert!(flights.is_in_flight());

        let (a, b) = tokio::join!(a, b);
        assert_eq!((a, b), (1, 1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!flights.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_settle_starts_fresh() {
        let flights = SingleFlight::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        assert_eq!(flights.run(|| counted(&counter, Duration::ZERO)).await, 1);
        assert_eq!(flights.run(|| counted(&counter, Duration::ZERO)).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_detaches_waiters() {
        let flights = SingleFlight::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        let first = flights.run(|| counted(&counter, Duration::from_millis(50)));
        flights.reset();
        let second = flights.run(|| counted(&counter, Duration::from_millis(50)));

        let (a, b) = tokio::join!(first, second);
        assert_ne!(a, b);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!flights.is_in_flight());
    }
}
