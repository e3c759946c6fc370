//! Request Queue
//!
//! Admission control bounding the number of concurrently in-flight
//! requests, with a FIFO overflow queue.
//!
//! # Drain Policy
//!
//! Queued entries are drained SERIALLY: a single drain loop pops the front
//! entry and awaits its full completion before popping the next, even when
//! several capacity slots are free. This is the deliberate policy choice —
//! requests that had to queue were already latency-compromised, and serial
//! drainage keeps their completion order identical to submission order.
//! The stricter alternative (dispatch up to all free capacity concurrently)
//! was rejected; the policy is pinned by `test_serial_drain_policy`.
//!
//! # Ordering
//!
//! Queued entries are served strictly FIFO relative to each other. No
//! ordering holds between an immediately-admitted request and a queued one.
//!
//! # Failure Isolation
//!
//! A failing entry settles only its own waiter; the drain loop continues
//! with the next entry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::RouterError;
use super::stats::PerformanceMonitor;
use super::strategy::{GenerationRequest, ProjectContext};
use crate::provider::ProviderResponse;

/// Dispatch target for admitted requests. Implemented by the router's
/// internal pipeline (gate → strategy → executor).
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Run one request to completion.
    async fn dispatch(
        &self,
        request: GenerationRequest,
        context: Option<ProjectContext>,
    ) -> Result<ProviderResponse, RouterError>;
}

struct QueueEntry {
    request: GenerationRequest,
    context: Option<ProjectContext>,
    settle: oneshot::Sender<Result<ProviderResponse, RouterError>>,
}

/// Admission-controlled FIFO request queue.
pub struct RequestQueue {
    dispatcher: Arc<dyn Dispatch>,
    monitor: Arc<PerformanceMonitor>,
    max_concurrent: usize,
    max_depth: usize,
    active: AtomicUsize,
    pending: Mutex<VecDeque<QueueEntry>>,
    // single-flight guard: at most one drain loop at a time
    draining: AtomicBool,
}

impl RequestQueue {
    /// Create a queue in front of the given dispatcher.
    #[must_use]
    pub fn new(
        dispatcher: Arc<dyn Dispatch>,
        monitor: Arc<PerformanceMonitor>,
        max_concurrent: usize,
        max_depth: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            monitor,
            max_concurrent,
            max_depth,
            active: AtomicUsize::new(0),
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        })
    }

    /// Submit a request: dispatch immediately when capacity allows,
    /// otherwise wait in the FIFO queue for a drain slot.
    pub async fn submit(
        self: Arc<Self>,
        request: GenerationRequest,
        context: Option<ProjectContext>,
    ) -> Result<ProviderResponse, RouterError> {
        if self.try_admit() {
            let result = self.dispatcher.dispatch(request, context).await;
            self.release();
            Self::trigger_drain(&self);
            return result;
        }

        let (settle, settled) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.len() >= self.max_depth {
                return Err(RouterError::QueueFull);
            }
            pending.push_back(QueueEntry {
                request,
                context,
                settle,
            });
            self.monitor.set_queue_depth(pending.len());
        }
        Self::trigger_drain(&self);

        // The sender is dropped without settling only when the queue itself
        // is torn down mid-wait.
        settled.await.unwrap_or(Err(RouterError::ShuttingDown))
    }

    /// Requests currently being dispatched.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Entries currently waiting in the queue.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.pending.lock().len()
    }

    fn try_admit(&self) -> bool {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_concurrent).then_some(n + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    fn trigger_drain(this: &Arc<Self>) {
        if this
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        tokio::spawn(Arc::clone(this).drain_loop());
    }

    async fn drain_loop(self: Arc<Self>) {
        loop {
            if !self.try_admit() {
                break;
            }
            let entry = {
                let mut pending = self.pending.lock();
                let entry = pending.pop_front();
                if entry.is_some() {
                    self.monitor.set_queue_depth(pending.len());
                }
                entry
            };
            let Some(entry) = entry else {
                self.release();
                break;
            };

            // Serial drain: the next entry is not popped until this one
            // fully completes.
            let result = self
                .dispatcher
                .dispatch(entry.request, entry.context)
                .await;
            self.release();
            let _ = entry.settle.send(result);
        }

        self.draining.store(false, Ordering::Release);

        // An entry enqueued while the flag was being cleared would
        // otherwise wait until the next completion; re-check.
        let stranded = {
            let pending = self.pending.lock();
            !pending.is_empty() && self.active.load(Ordering::Acquire) < self.max_concurrent
        };
        if stranded {
            Self::trigger_drain(&self);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::routing::config::ProviderKind;

    /// Dispatcher whose completions are gated by the test.
    #[derive(Default)]
    struct ManualDispatcher {
        gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
        started: Mutex<Vec<String>>,
        finished: Mutex<Vec<String>>,
        fail: Mutex<Vec<String>>,
    }

    impl ManualDispatcher {
        fn gate(&self, prompt: &str) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().insert(prompt.to_string(), rx);
            tx
        }

        fn fail_on(&self, prompt: &str) {
            self.fail.lock().push(prompt.to_string());
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().clone()
        }

        fn finished(&self) -> Vec<String> {
            self.finished.lock().clone()
        }
    }

    #[async_trait]
    impl Dispatch for ManualDispatcher {
        async fn dispatch(
            &self,
            request: GenerationRequest,
            _context: Option<ProjectContext>,
        ) -> Result<ProviderResponse, RouterError> {
            self.started.lock().push(request.prompt.clone());
            let gate = self.gates.lock().remove(&request.prompt);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.finished.lock().push(request.prompt.clone());

            if self.fail.lock().contains(&request.prompt) {
                return Err(RouterError::ProviderRequest {
                    provider: ProviderKind::Ollama,
                    message: format!("scripted failure for {}", request.prompt),
                });
            }
            Ok(ProviderResponse {
                content: request.prompt,
                model: "manual".to_string(),
                usage: None,
            })
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..10_000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt)
    }

    #[tokio::test]
    async fn test_fourth_request_queues_until_capacity_frees() {
        let dispatcher = Arc::new(ManualDispatcher::default());
        let queue = RequestQueue::new(dispatcher.clone(), Arc::new(PerformanceMonitor::new()), 3, 16);

        let gates: Vec<_> = (1..=4).map(|i| dispatcher.gate(&format!("q{i}"))).collect();
        let handles: Vec<_> = (1..=4)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.submit(request(&format!("q{i}")), None).await })
            })
            .collect();

        wait_until(|| dispatcher.started().len() == 3).await;
        assert_eq!(queue.in_flight(), 3);
        assert_eq!(queue.depth(), 1);
        // The fourth caller has not been dispatched
        assert!(!dispatcher.started().contains(&"q4".to_string()));

        // Completing one active request frees a slot for the queued entry
        let mut gates = gates.into_iter();
        gates.next().unwrap().send(()).unwrap();
        wait_until(|| dispatcher.started().len() == 4).await;
        assert_eq!(queue.depth(), 0);

        for gate in gates {
            let _ = gate.send(());
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_queued_entries_dispatch_in_submission_order() {
        let dispatcher = Arc::new(ManualDispatcher::default());
        let queue = RequestQueue::new(dispatcher.clone(), Arc::new(PerformanceMonitor::new()), 1, 16);

        let g1 = dispatcher.gate("q1");

        let q1 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q1"), None).await })
        };
        wait_until(|| dispatcher.started().len() == 1).await;

        // Enqueue q2 then q3 while q1 occupies the only slot
        let q2 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q2"), None).await })
        };
        wait_until(|| queue.depth() == 1).await;
        let q3 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q3"), None).await })
        };
        wait_until(|| queue.depth() == 2).await;

        g1.send(()).unwrap();
        for handle in [q1, q2, q3] {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(dispatcher.finished(), vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn test_serial_drain_policy() {
        // Named policy test: even with every capacity slot free, queued
        // entries drain one at a time.
        let dispatcher = Arc::new(ManualDispatcher::default());
        let queue = RequestQueue::new(dispatcher.clone(), Arc::new(PerformanceMonitor::new()), 3, 16);

        // Occupy all three slots
        let active_gates: Vec<_> = (1..=3).map(|i| dispatcher.gate(&format!("a{i}"))).collect();
        let active: Vec<_> = (1..=3)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.submit(request(&format!("a{i}")), None).await })
            })
            .collect();
        wait_until(|| dispatcher.started().len() == 3).await;

        // Queue two more, both gated
        let g4 = dispatcher.gate("q4");
        let g5 = dispatcher.gate("q5");
        let q4 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q4"), None).await })
        };
        wait_until(|| queue.depth() == 1).await;
        let q5 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q5"), None).await })
        };
        wait_until(|| queue.depth() == 2).await;

        // Free ALL capacity at once
        for gate in active_gates {
            gate.send(()).unwrap();
        }
        for handle in active {
            handle.await.unwrap().unwrap();
        }

        // q4 dispatches, but q5 must wait for q4 despite two free slots
        wait_until(|| dispatcher.started().contains(&"q4".to_string())).await;
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
        assert!(!dispatcher.started().contains(&"q5".to_string()));

        g4.send(()).unwrap();
        q4.await.unwrap().unwrap();
        wait_until(|| dispatcher.started().contains(&"q5".to_string())).await;
        g5.send(()).unwrap();
        q5.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_entry_failure_settles_only_its_waiter() {
        let dispatcher = Arc::new(ManualDispatcher::default());
        let queue = RequestQueue::new(dispatcher.clone(), Arc::new(PerformanceMonitor::new()), 1, 16);

        dispatcher.fail_on("q2");
        let g1 = dispatcher.gate("q1");

        let q1 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q1"), None).await })
        };
        wait_until(|| dispatcher.started().len() == 1).await;
        let q2 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q2"), None).await })
        };
        wait_until(|| queue.depth() == 1).await;
        let q3 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q3"), None).await })
        };
        wait_until(|| queue.depth() == 2).await;

        g1.send(()).unwrap();

        assert!(q1.await.unwrap().is_ok());
        // q2's failure reaches only q2's waiter; q3 still completes
        assert!(q2.await.unwrap().is_err());
        assert!(q3.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_overflow_is_rejected() {
        let dispatcher = Arc::new(ManualDispatcher::default());
        let queue = RequestQueue::new(dispatcher.clone(), Arc::new(PerformanceMonitor::new()), 1, 1);

        let _g1 = dispatcher.gate("q1");
        let _q1 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q1"), None).await })
        };
        wait_until(|| dispatcher.started().len() == 1).await;

        let _g2 = dispatcher.gate("q2");
        let _q2 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q2"), None).await })
        };
        wait_until(|| queue.depth() == 1).await;

        let err = queue.submit(request("q3"), None).await.unwrap_err();
        assert!(matches!(err, RouterError::QueueFull));
    }

    #[tokio::test]
    async fn test_queue_depth_mirrored_to_monitor() {
        let dispatcher = Arc::new(ManualDispatcher::default());
        let monitor = Arc::new(PerformanceMonitor::new());
        let queue = RequestQueue::new(dispatcher.clone(), monitor.clone(), 1, 16);

        let g1 = dispatcher.gate("q1");
        let q1 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q1"), None).await })
        };
        wait_until(|| dispatcher.started().len() == 1).await;
        let q2 = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("q2"), None).await })
        };
        wait_until(|| monitor.summary().queue_depth == 1).await;

        g1.send(()).unwrap();
        q1.await.unwrap().unwrap();
        q2.await.unwrap().unwrap();
        assert_eq!(monitor.summary().queue_depth, 0);
    }
}
