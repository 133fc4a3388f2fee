// Task executor delivery guarantees under concurrency

use async_trait::async_trait;
use pellet_core::{
    Callback, ExecutorConfig, FnCallback, PelletError, Task, TaskExecutor, TaskState,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

#[derive(Debug)]
struct Echo(usize);

#[async_trait]
impl Task for Echo {
    type Output = usize;

    async fn execute(&self) -> Result<usize, PelletError> {
        tokio::task::yield_now().await;
        Ok(self.0)
    }
}

/// Deterministic task whose outcome depends only on its input.
#[derive(Debug)]
struct EvenOnly(u64);

#[async_trait]
impl Task for EvenOnly {
    type Output = u64;

    async fn execute(&self) -> Result<u64, PelletError> {
        if self.0 % 2 == 0 {
            Ok(self.0 / 2)
        } else {
            Err(PelletError::decode(format!("{} is odd", self.0)))
        }
    }
}

#[test]
fn test_thousand_concurrent_calls_deliver_exactly_once() {
    let exec = TaskExecutor::new(ExecutorConfig {
        worker_threads: 4,
        max_in_flight: 64,
    })
    .unwrap();

    let successes = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel::<usize>();

    let handles: Vec<_> = (0..1000)
        .map(|i| {
            let s = Arc::clone(&successes);
            let f = Arc::clone(&failures);
            let tx = tx.clone();
            exec.run_async(
                Echo(i),
                FnCallback::new(
                    move |v: usize| {
                        s.fetch_add(1, Ordering::SeqCst);
                        tx.send(v).unwrap();
                    },
                    move |_e: PelletError| {
                        f.fetch_add(1, Ordering::SeqCst);
                    },
                ),
            )
        })
        .collect();
    drop(tx);

    for handle in handles {
        assert_eq!(handle.wait().unwrap(), TaskState::Succeeded);
    }

    let delivered: Vec<usize> = rx.iter().collect();
    let unique: HashSet<usize> = delivered.iter().copied().collect();
    assert_eq!(delivered.len(), 1000);
    assert_eq!(unique.len(), 1000);
    assert_eq!(successes.load(Ordering::SeqCst), 1000);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn test_async_round_trip_equals_sync() {
    let exec = TaskExecutor::new(ExecutorConfig::default()).unwrap();

    for input in 0..32u64 {
        let (tx, rx) = mpsc::channel::<Result<u64, PelletError>>();
        exec.run_async(EvenOnly(input), tx).wait().unwrap();
        let asynchronous = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let synchronous = exec.run_sync(EvenOnly(input));
        assert_eq!(asynchronous, synchronous, "input {}", input);
    }
}

#[test]
fn test_in_flight_limit_queues_instead_of_rejecting() {
    #[derive(Debug)]
    struct Tracked {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for Tracked {
        type Output = ();

        async fn execute(&self) -> Result<(), PelletError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let exec = TaskExecutor::new(ExecutorConfig {
        worker_threads: 4,
        max_in_flight: 3,
    })
    .unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..30)
        .map(|_| {
            let (tx, _rx) = tokio::sync::oneshot::channel::<Result<(), PelletError>>();
            exec.run_async(
                Tracked {
                    active: Arc::clone(&active),
                    peak: Arc::clone(&peak),
                },
                tx,
            )
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.wait().unwrap(), TaskState::Succeeded);
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

struct CountingCallback {
    calls: Arc<AtomicUsize>,
}

impl Callback<usize> for CountingCallback {
    fn on_success(self, _value: usize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(self, _error: PelletError) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_custom_callback_invoked_once_per_task() {
    let exec = TaskExecutor::new(ExecutorConfig::default()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    for i in 0..50 {
        exec.run_async(
            Echo(i),
            CountingCallback {
                calls: Arc::clone(&calls),
            },
        )
        .wait()
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 50);
}
