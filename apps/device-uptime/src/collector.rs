use crate::error::{error_chain, UptimeError, UptimeResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub name: String,
    pub channel_id: i64,
    pub is_active: bool,
}

/// Runs one fetch per device on the runtime, at most `workers` at a time.
///
/// Failed or panicked fetches are logged and left out of the result; the rest
/// of the run continues. Results come back in enumeration order because each
/// handle is awaited in turn, so a slow fetch only delays collection of the
/// results enumerated after it.
#[derive(Clone)]
pub struct ConcurrentCollector {
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl ConcurrentCollector {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn collect<T, F, Fut>(&self, targets: Vec<DeviceTarget>, fetch: F) -> Vec<T>
    where
        F: Fn(DeviceTarget) -> Fut,
        Fut: Future<Output = UptimeResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let device = target.name.clone();
            let semaphore = self.semaphore.clone();
            let task = fetch(target);
            let permit_device = device.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| UptimeError::upstream(permit_device, err))?;
                task.await
            });
            handles.push((device, handle));
        }

        let submitted = handles.len();
        let mut results = Vec::with_capacity(submitted);
        for (device, handle) in handles {
            match handle.await {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(err)) => {
                    tracing::error!(
                        device = %device,
                        error = %error_chain(&err),
                        details = ?err,
                        device_local = err.is_device_local(),
                        "error occurred while fetching data"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        device = %device,
                        error = %err,
                        panicked = err.is_panic(),
                        "device fetch task failed"
                    );
                }
            }
        }

        tracing::debug!(
            submitted,
            collected = results.len(),
            workers = self.workers,
            "collected device fetches"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn target(name: &str) -> DeviceTarget {
        DeviceTarget {
            name: name.to_string(),
            channel_id: 1,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_collect_excludes_failed_devices() {
        let collector = ConcurrentCollector::new(4);
        let targets = vec![target("a"), target("x"), target("b")];

        let results = collector
            .collect(targets, |t| async move {
                if t.name == "x" {
                    return Err(UptimeError::upstream(t.name, anyhow::anyhow!("timeout")));
                }
                Ok(t.name)
            })
            .await;

        assert_eq!(results, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_collect_survives_panicking_fetch() {
        let collector = ConcurrentCollector::new(2);
        let targets = vec![target("a"), target("boom")];

        let results = collector
            .collect(targets, |t| async move {
                if t.name == "boom" {
                    panic!("fetch exploded");
                }
                Ok(t.name)
            })
            .await;

        assert_eq!(results, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_collect_keeps_enumeration_order_despite_completion_order() {
        let collector = ConcurrentCollector::new(3);
        let targets = vec![target("slow"), target("medium"), target("fast")];

        let results = collector
            .collect(targets, |t| async move {
                let delay = match t.name.as_str() {
                    "slow" => 60,
                    "medium" => 30,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(t.name)
            })
            .await;

        assert_eq!(results, vec!["slow", "medium", "fast"]);
    }

    #[tokio::test]
    async fn test_collect_bounds_concurrency() {
        let collector = ConcurrentCollector::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let targets: Vec<DeviceTarget> = (0..8).map(|i| target(&format!("d{i}"))).collect();

        let results = collector
            .collect(targets, |t| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(t.name)
                }
            })
            .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(collector.workers(), 2);
    }

    #[tokio::test]
    async fn test_collect_empty_target_set() {
        let collector = ConcurrentCollector::new(0);
        let results: Vec<String> = collector
            .collect(Vec::new(), |t| async move { Ok(t.name) })
            .await;
        assert!(results.is_empty());
        assert_eq!(collector.workers(), 1);
    }
}
