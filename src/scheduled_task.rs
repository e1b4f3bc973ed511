use std::future::Future;

use rocket::tokio::{
    self,
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};

/// A task run repeatedly at a fixed interval, starting immediately, until cancelled.
pub struct PeriodicTask {
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Run the future produced by `task` every `interval`. Runs never overlap.
    pub fn new<F, Fut>(interval: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });

        Self { handle }
    }

    /// Stop the task. A run in progress is abandoned.
    pub async fn cancel(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
