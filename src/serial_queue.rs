//! Per-owner FIFO serialization: guarantees at most one task is in flight for
//! a given owner key at a time, preserving per-connection envelope ordering
//! across the `await` points a handler suspends at.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Serializes async work per owner key. Different owners run fully
/// concurrently; same-owner tasks queue up and run one at a time, in the
/// order they were submitted (`tokio::sync::Mutex` is FIFO-fair).
#[derive(Default)]
pub struct SerialQueue<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> SerialQueue<K>
where
    K: std::hash::Hash + Eq + Clone,
{
    pub fn new() -> Self {
        SerialQueue {
            locks: DashMap::new(),
        }
    }

    /// Run `task` serialized against any other task currently running or
    /// queued for `owner`.
    pub async fn run<F, Fut, T>(&self, owner: K, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self
            .locks
            .entry(owner)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;
        let result = task().await;
        drop(guard);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_owner_tasks_never_overlap() {
        let queue: Arc<SerialQueue<String>> = Arc::new(SerialQueue::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let queue = queue.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .run("owner-a".to_string(), || async {
                        let cur = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(cur, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_owners_run_concurrently() {
        let queue: Arc<SerialQueue<String>> = Arc::new(SerialQueue::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..10 {
            let queue = queue.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .run(format!("owner-{i}"), || async {
                        let cur = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(cur, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn preserves_submission_order_per_owner() {
        let queue: Arc<SerialQueue<String>> = Arc::new(SerialQueue::new());
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let queue = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .run("owner".to_string(), || async move {
                        order.lock().await.push(i);
                    })
                    .await;
            }));
            // yield so tasks are submitted in order before the next spawn
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }
}
