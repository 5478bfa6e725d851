use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use tracing::{debug, info, warn};

/// Shortest accepted poll interval; `new` raises anything below it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Fires a callback immediately and then every `interval`, for as long as it
/// is running.
///
/// Each tick's callback runs as its own task, so a slow tick never delays
/// the next one and ticks may overlap. The poller keeps no state about
/// what the callback does.
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    /// `false` once stopped; checked under the lock before every spawn.
    open: Arc<Mutex<bool>>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(interval_ms = interval.as_millis() as u64, "Poll interval too short; using 1ms");
        }
        Self {
            interval: interval.max(MIN_INTERVAL),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start ticking; restarts the schedule if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, on_tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let open = Arc::new(Mutex::new(true));
        let handle = tokio::spawn(tick_loop(self.interval, Arc::clone(&open), on_tick));
        info!(interval_ms = self.interval.as_millis() as u64, "Polling started");
        self.running = Some(Running { open, handle });
    }

    /// Cancel all future ticks. Idempotent.
    ///
    /// Once this returns no new tick is started; callbacks already running
    /// are left to finish.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            *running.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
            running.handle.abort();
            info!("Polling stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop<F, Fut>(period: Duration, open: Arc<Mutex<bool>>, on_tick: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut ticker = time::interval(period);
    loop {
        ticker.tick().await;
        {
            let open = open.lock().unwrap_or_else(PoisonError::into_inner);
            if !*open {
                break;
            }
            tokio::spawn(on_tick());
        }
        debug!("Poll tick dispatched");
    }
}
