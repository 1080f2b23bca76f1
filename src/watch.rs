//! Periodic refresh tied to a handle.
//!
//! [`spawn_poller`] runs `fetch` on a fixed interval in a background task
//! and calls `on_change` only when the fetched snapshot differs from the last
//! one delivered. The task lives as long as its [`Poller`]: call
//! [`Poller::cancel`] or drop the handle to stop it.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;

pub struct Poller {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Ask the task to stop after any fetch in flight.
    pub fn cancel(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub fn spawn_poller<T, F, Fut, C>(interval: Duration, mut fetch: F, mut on_change: C) -> Poller
where
    T: PartialEq + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send,
    C: FnMut(&T) + Send + 'static,
{
    let (stop, mut stopped) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<T> = None;

        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                _ = ticker.tick() => {
                    match fetch().await {
                        Ok(snapshot) => {
                            if last.as_ref() != Some(&snapshot) {
                                on_change(&snapshot);
                                last = Some(snapshot);
                            }
                        }
                        Err(e) => tracing::warn!("refresh failed: {}", e),
                    }
                }
            }
        }
        tracing::debug!("poller stopped");
    });

    Poller {
        stop,
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn delivers_only_changed_snapshots() {
        let script = [1, 1, 2, 2, 2, 3];
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_calls = calls.clone();
        let sink = seen.clone();
        let poller = spawn_poller(
            Duration::from_millis(5),
            move || {
                let n = fetch_calls.fetch_add(1, Ordering::SeqCst);
                let value = script[n.min(script.len() - 1)];
                async move { Ok(value) }
            },
            move |v: &i32| sink.lock().unwrap().push(*v),
        );

        while calls.load(Ordering::SeqCst) < script.len() + 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        poller.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn cancel_stops_fetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let poller = spawn_poller(
            Duration::from_millis(5),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n) }
            },
            |_: &usize| {},
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        poller.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(poller.is_finished());

        let after = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn fetch_errors_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let counter = calls.clone();
        let sink = seen.clone();
        let poller = spawn_poller(
            Duration::from_millis(5),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(crate::error::Error::Transport("offline".into()))
                    } else {
                        Ok("ready")
                    }
                }
            },
            move |v: &&str| sink.lock().unwrap().push(v.to_string()),
        );

        while calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(poller);
        assert_eq!(*seen.lock().unwrap(), vec!["ready".to_string()]);
    }
}
