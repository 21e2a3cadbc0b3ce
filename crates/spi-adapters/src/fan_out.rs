//! Bounded per-service concurrency for API-direct workflows.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Per-service results in input order, and whether the run was cut short.
#[derive(Debug)]
pub struct FanOutResult<T> {
    pub results: Vec<(String, T)>,
    pub interrupted: bool,
}

/// Runs `task` once per service with at most `concurrency` in flight.
///
/// Every task's output is collected on its own, so one failing service never
/// stops the others. When `interrupt` turns `true` all in-flight tasks are
/// aborted and only the finished results are returned.
pub async fn fan_out<T, F, Fut>(
    services: &[String],
    concurrency: usize,
    mut interrupt: watch::Receiver<bool>,
    task: F,
) -> FanOutResult<T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, service) in services.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let work = task(service.clone());
        set.spawn(async move {
            // The semaphore is never closed, so acquire only fails if it is.
            let _permit = semaphore.acquire_owned().await.ok();
            debug!(service = %service, "Task started");
            (index, service, work.await)
        });
    }

    let mut finished: Vec<(usize, String, T)> = Vec::with_capacity(services.len());
    let mut interrupted = *interrupt.borrow();
    let mut interrupt_open = true;

    while !interrupted {
        tokio::select! {
            joined = set.join_next() => match joined {
                Some(Ok(entry)) => finished.push(entry),
                Some(Err(e)) => warn!(error = %e, "Service task panicked or was cancelled"),
                None => break,
            },
            changed = interrupt.changed(), if interrupt_open => match changed {
                Ok(()) => interrupted = *interrupt.borrow(),
                Err(_) => interrupt_open = false,
            },
        }
    }

    if interrupted {
        warn!(in_flight = set.len(), "Interrupted, aborting service tasks");
        set.abort_all();
        while let Some(joined) = set.join_next().await {
            if let Ok(entry) = joined {
                finished.push(entry);
            }
        }
    }

    finished.sort_by_key(|(index, _, _)| *index);
    FanOutResult {
        results: finished.into_iter().map(|(_, s, r)| (s, r)).collect(),
        interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn collects_every_result_in_input_order() {
        let (_tx, rx) = watch::channel(false);
        let out = fan_out(&names(&["a", "b", "c"]), 2, rx, |s| async move {
            if s == "b" {
                Err(format!("{s} failed"))
            } else {
                Ok(s.len())
            }
        })
        .await;

        assert!(!out.interrupted);
        let services: Vec<&str> = out.results.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(services, vec!["a", "b", "c"]);
        assert!(out.results[1].1.is_err());
        assert_eq!(out.results[2].1, Ok(1));
    }

    #[tokio::test]
    async fn respects_concurrency_bound() {
        let (_tx, rx) = watch::channel(false);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let services = names(&["a", "b", "c", "d", "e"]);

        fan_out(&services, 2, rx, |_| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn interrupt_aborts_in_flight_tasks() {
        let (tx, rx) = watch::channel(false);
        let services = names(&["fast", "slow"]);
        let handle = tokio::spawn(async move {
            fan_out(&services, 2, rx, |s| async move {
                if s == "slow" {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                s
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let out = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(out.interrupted);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].0, "fast");
    }
}
