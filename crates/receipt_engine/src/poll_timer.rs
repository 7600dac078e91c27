use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A single repeating timer. Starting it again replaces the running one, so
/// at most one tick source exists per timer.
pub struct PollTimer {
    runtime: Handle,
    active: Option<(CancellationToken, JoinHandle<()>)>,
}

impl PollTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            active: None,
        }
    }

    /// Calls `on_tick` every `period`, first after one full period.
    /// The timer ends itself when `on_tick` returns `false`.
    pub fn start<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.stop();

        let period = period.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let first = Instant::now() + period;
        let task = self.runtime.spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if !on_tick() {
                            break;
                        }
                    }
                }
            }
        });
        self.active = Some((token, task));
    }

    /// Returns whether a timer was running.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some((token, task)) => {
                token.cancel();
                let running = !task.is_finished();
                task.abort();
                running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
