//! Bounded, deduplicated background refreshes.

use std::{future::Future, sync::Arc};

use dashmap::DashSet;
use tokio::{sync::Semaphore, task::JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSkip {
    /// A refresh for the same key is already running.
    InFlight,
    /// Every refresh slot is taken.
    Saturated,
}

impl RefreshSkip {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshSkip::InFlight => "in_flight",
            RefreshSkip::Saturated => "saturated",
        }
    }
}

#[derive(Clone)]
pub struct BackgroundRefresher {
    permits: Arc<Semaphore>,
    in_flight: Arc<DashSet<String>>,
}

struct InFlightGuard {
    keys: Arc<DashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

impl BackgroundRefresher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Spawns `task` unless a refresh for `key` is running or no slot is free.
    ///
    /// The key is released when the task ends, including when it panics.
    pub fn try_spawn<Fut>(&self, key: &str, task: Fut) -> Result<JoinHandle<()>, RefreshSkip>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.in_flight.insert(key.to_string()) {
            return Err(RefreshSkip::InFlight);
        }
        let guard = InFlightGuard {
            keys: Arc::clone(&self.in_flight),
            key: key.to_string(),
        };

        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return Err(RefreshSkip::Saturated);
        };

        Ok(tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            task.await;
        }))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn duplicate_key_is_skipped_while_running() {
        let refresher = BackgroundRefresher::new(4);
        let (release, wait) = oneshot::channel::<()>();

        let handle = refresher
            .try_spawn("home", async move {
                let _ = wait.await;
            })
            .expect("spawned");
        assert!(refresher.is_in_flight("home"));
        assert_eq!(
            refresher.try_spawn("home", async {}).err(),
            Some(RefreshSkip::InFlight)
        );

        let _ = release.send(());
        handle.await.expect("joined");
        assert_eq!(refresher.in_flight(), 0);
        refresher
            .try_spawn("home", async {})
            .expect("spawned again")
            .await
            .expect("joined");
    }

    #[tokio::test]
    async fn saturated_pool_skips_and_releases_key() {
        let refresher = BackgroundRefresher::new(1);
        let (release, wait) = oneshot::channel::<()>();
        let handle = refresher
            .try_spawn("a", async move {
                let _ = wait.await;
            })
            .expect("spawned");

        assert_eq!(
            refresher.try_spawn("b", async {}).err(),
            Some(RefreshSkip::Saturated)
        );
        assert!(!refresher.is_in_flight("b"));

        let _ = release.send(());
        handle.await.expect("joined");
    }

    #[tokio::test]
    async fn panicking_task_releases_its_key() {
        let refresher = BackgroundRefresher::new(1);
        let handle = refresher
            .try_spawn("boom", async { panic!("refresh failed") })
            .expect("spawned");
        assert!(handle.await.is_err());
        assert!(!refresher.is_in_flight("boom"));
    }
}
