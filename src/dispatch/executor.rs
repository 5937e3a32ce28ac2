//! Off-thread backend execution.
//!
//! Each gesture label gets its own worker thread fed by a small bounded
//! queue. Calls for one label run one at a time; calls for different labels
//! overlap. Results come back as [`ExecutionReport`]s that the frame loop
//! drains between frames.

use crate::backend::{Backend, BackendError};
use crate::dispatch::dispatcher::ActionEvent;
use crate::gesture::GestureLabel;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pending calls allowed per label before new ones are refused.
pub const QUEUE_CAPACITY: usize = 4;

/// Outcome of one backend call made by a worker.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub event: ActionEvent,
    pub result: Result<(), BackendError>,
    pub elapsed: Duration,
}

struct Worker {
    queue: Sender<ActionEvent>,
    handle: JoinHandle<()>,
}

/// Runs backend calls on per-label worker threads.
pub struct ActionExecutor {
    backend: Arc<dyn Backend>,
    workers: HashMap<GestureLabel, Worker>,
    report_tx: Sender<ExecutionReport>,
    report_rx: Receiver<ExecutionReport>,
    slow_after: Duration,
    queue_capacity: usize,
}

impl ActionExecutor {
    /// `slow_after` is the call duration above which a warning is logged.
    pub fn new(backend: Arc<dyn Backend>, slow_after: Duration) -> Self {
        let (report_tx, report_rx) = unbounded();
        Self {
            backend,
            workers: HashMap::new(),
            report_tx,
            report_rx,
            slow_after,
            queue_capacity: QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Queue an event on its label's worker.
    ///
    /// Fails with `BackendError::Busy` when that worker's queue is full.
    pub fn submit(&mut self, event: ActionEvent) -> Result<(), BackendError> {
        let label = event.gesture;
        if !self.workers.contains_key(&label) {
            let worker = self.spawn_worker(label)?;
            self.workers.insert(label, worker);
        }

        let Some(worker) = self.workers.get(&label) else {
            return Err(BackendError::Busy(label.to_string()));
        };
        match worker.queue.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BackendError::Busy(label.to_string())),
            Err(TrySendError::Disconnected(_)) => {
                // Worker is gone (backend panicked); start over on the next submit.
                if let Some(worker) = self.workers.remove(&label) {
                    if worker.handle.join().is_err() {
                        tracing::error!(gesture = %label, "Action worker panicked");
                    }
                }
                tracing::error!(gesture = %label, "Action worker stopped unexpectedly");
                Err(BackendError::Busy(label.to_string()))
            }
        }
    }

    fn spawn_worker(&self, label: GestureLabel) -> Result<Worker, BackendError> {
        let (queue, jobs) = bounded::<ActionEvent>(self.queue_capacity);
        let backend = Arc::clone(&self.backend);
        let reports = self.report_tx.clone();
        let slow_after = self.slow_after;

        let handle = thread::Builder::new()
            .name(format!("action-{label}"))
            .spawn(move || {
                for event in jobs {
                    let started = Instant::now();
                    let result = backend.execute(&event.action);
                    let elapsed = started.elapsed();

                    if elapsed > slow_after {
                        tracing::warn!(
                            action = %event.action,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Slow backend call"
                        );
                    }
                    match &result {
                        Ok(()) => tracing::info!(
                            gesture = %event.gesture,
                            action = %event.action,
                            "Action -> OK"
                        ),
                        Err(e) => tracing::warn!(
                            gesture = %event.gesture,
                            action = %event.action,
                            "Action -> FAILED: {e}"
                        ),
                    }

                    let _ = reports.send(ExecutionReport {
                        event,
                        result,
                        elapsed,
                    });
                }
            })
            .map_err(|e| {
                tracing::error!(gesture = %label, "Failed to start action worker: {e}");
                BackendError::Busy(label.to_string())
            })?;

        Ok(Worker { queue, handle })
    }

    /// Reports completed since the last call.
    pub fn drain(&self) -> Vec<ExecutionReport> {
        self.report_rx.try_iter().collect()
    }

    /// Close all queues, wait for in-flight calls and return their reports.
    pub fn shutdown(&mut self) -> Vec<ExecutionReport> {
        for (_, worker) in self.workers.drain() {
            drop(worker.queue);
            if worker.handle.join().is_err() {
                tracing::error!("Action worker panicked");
            }
        }
        self.drain()
    }
}

impl Drop for ActionExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::RecordingBackend;
    use chrono::Utc;
    use crossbeam_channel::RecvTimeoutError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn event(label: GestureLabel, action: &str) -> ActionEvent {
        ActionEvent::new(label, action, Utc::now())
    }

    /// Tracks the peak number of concurrent calls.
    struct SlowBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Backend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        fn execute(&self, _action: &str) -> Result<(), BackendError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// `first` blocks until `second` has started.
    struct RendezvousBackend {
        signal: Sender<()>,
        wait: Mutex<Receiver<()>>,
    }

    impl Backend for RendezvousBackend {
        fn name(&self) -> &str {
            "rendezvous"
        }

        fn execute(&self, action: &str) -> Result<(), BackendError> {
            if action == "second" {
                let _ = self.signal.send(());
                return Ok(());
            }
            let wait = self.wait.lock().unwrap();
            match wait.recv_timeout(Duration::from_secs(5)) {
                Ok(()) => Ok(()),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    Err(BackendError::Timeout(Duration::from_secs(5)))
                }
            }
        }
    }

    #[test]
    fn test_reports_every_call() {
        let backend = Arc::new(RecordingBackend::default());
        let mut executor = ActionExecutor::new(backend.clone(), Duration::from_secs(5));

        executor.submit(event(GestureLabel::Fist, "ac_off")).unwrap();
        executor.submit(event(GestureLabel::Heart, "lights_toggle")).unwrap();

        let reports = executor.shutdown();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.result.is_ok()));
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn test_same_label_calls_never_overlap() {
        let backend = Arc::new(SlowBackend {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut executor = ActionExecutor::new(backend.clone(), Duration::from_secs(5));

        for _ in 0..3 {
            executor.submit(event(GestureLabel::Point, "volume_up")).unwrap();
        }
        assert_eq!(executor.shutdown().len(), 3);
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_labels_overlap() {
        let (signal, wait) = bounded(1);
        let backend = Arc::new(RendezvousBackend {
            signal,
            wait: Mutex::new(wait),
        });
        let mut executor = ActionExecutor::new(backend, Duration::from_secs(10));

        executor.submit(event(GestureLabel::Fist, "first")).unwrap();
        executor.submit(event(GestureLabel::Peace, "second")).unwrap();

        let reports = executor.shutdown();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.result.is_ok()), "{reports:?}");
    }

    /// Panics on `boom`, succeeds otherwise.
    struct PanickingBackend;

    impl Backend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn execute(&self, action: &str) -> Result<(), BackendError> {
            if action == "boom" {
                panic!("backend blew up");
            }
            Ok(())
        }
    }

    #[test]
    fn test_panicked_worker_is_replaced() {
        let mut executor = ActionExecutor::new(Arc::new(PanickingBackend), Duration::from_secs(5));
        executor.submit(event(GestureLabel::Fist, "boom")).unwrap();

        for _ in 0..500 {
            if executor.workers[&GestureLabel::Fist].handle.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(
            executor.submit(event(GestureLabel::Fist, "lost")),
            Err(BackendError::Busy("fist".to_string()))
        );
        assert!(!executor.workers.contains_key(&GestureLabel::Fist));

        executor.submit(event(GestureLabel::Fist, "after")).unwrap();
        let reports = executor.shutdown();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].event.action, "after");
        assert!(reports[0].result.is_ok());
    }

    #[test]
    fn test_full_queue_is_busy() {
        let backend = Arc::new(SlowBackend {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut executor =
            ActionExecutor::new(backend, Duration::from_secs(5)).with_queue_capacity(1);

        let results: Vec<_> = (0..10)
            .map(|_| executor.submit(event(GestureLabel::OkSign, "custom_scene")))
            .collect();
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(BackendError::Busy(label)) if label == "ok_sign")));
        executor.shutdown();
    }
}
