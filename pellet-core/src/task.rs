// Task/Callback execution model
//
// Every service operation is a `Task`. The synchronous API drives the task on
// the caller's thread; the asynchronous API schedules the same task on the
// executor's worker pool and reports the outcome to a `Callback`.

use crate::error::PelletError;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A fallible, zero-argument unit of work.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn execute(&self) -> Result<Self::Output, PelletError>;
}

/// Two-armed completion handler. Both arms consume the callback, so at most
/// one of them can ever run.
pub trait Callback<T>: Send + 'static {
    fn on_success(self, value: T);

    fn on_failure(self, error: PelletError);
}

/// Callback built from a pair of closures.
pub struct FnCallback<S, F> {
    success: S,
    failure: F,
}

impl<S, F> FnCallback<S, F> {
    pub fn new(success: S, failure: F) -> Self {
        FnCallback { success, failure }
    }
}

impl<S, F> fmt::Debug for FnCallback<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallback").finish_non_exhaustive()
    }
}

impl<T, S, F> Callback<T> for FnCallback<S, F>
where
    S: FnOnce(T) + Send + 'static,
    F: FnOnce(PelletError) + Send + 'static,
{
    fn on_success(self, value: T) {
        (self.success)(value)
    }

    fn on_failure(self, error: PelletError) {
        (self.failure)(error)
    }
}

/// Callback that receives the outcome as a single `Result`.
pub struct ResultCallback<F>(F);

impl<F> ResultCallback<F> {
    pub fn new(f: F) -> Self {
        ResultCallback(f)
    }
}

impl<F> fmt::Debug for ResultCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResultCallback")
    }
}

impl<T, F> Callback<T> for ResultCallback<F>
where
    F: FnOnce(Result<T, PelletError>) + Send + 'static,
{
    fn on_success(self, value: T) {
        (self.0)(Ok(value))
    }

    fn on_failure(self, error: PelletError) {
        (self.0)(Err(error))
    }
}

impl<T: Send + 'static> Callback<T> for oneshot::Sender<Result<T, PelletError>> {
    fn on_success(self, value: T) {
        // Receiver may have been dropped; nothing to report to then
        let _ = self.send(Ok(value));
    }

    fn on_failure(self, error: PelletError) {
        let _ = self.send(Err(error));
    }
}

impl<T: Send + 'static> Callback<T> for std::sync::mpsc::Sender<Result<T, PelletError>> {
    fn on_success(self, value: T) {
        let _ = self.send(Ok(value));
    }

    fn on_failure(self, error: PelletError) {
        let _ = self.send(Err(error));
    }
}

/// Lifecycle of one asynchronous invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Succeeded,
            _ => TaskState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker threads running tasks
    pub worker_threads: usize,
    /// Maximum number of tasks executing at once; the rest queue
    pub max_in_flight: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_in_flight: 256,
        }
    }
}

static NEXT_EXECUTOR_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    // Id of the executor owning the current worker thread, 0 elsewhere
    static WORKER_OF: Cell<usize> = const { Cell::new(0) };
}

/// Block on `future` from synchronous code.
///
/// Allowed outside any runtime, and on a worker thread of the executor `id`
/// (a callback issuing a nested blocking call), where the worker is handed
/// off with `block_in_place` first. Any other async context is refused.
fn block_on_from_sync<F: Future>(
    handle: &Handle,
    id: usize,
    future: F,
    refusal: &str,
) -> Result<F::Output, PelletError> {
    if Handle::try_current().is_err() {
        return Ok(handle.block_on(future));
    }
    if WORKER_OF.with(Cell::get) == id {
        return Ok(tokio::task::block_in_place(|| handle.block_on(future)));
    }
    Err(PelletError::executor(refusal))
}

struct ExecutorInner {
    id: usize,
    runtime: Option<Runtime>,
    handle: Handle,
    permits: Arc<Semaphore>,
    config: ExecutorConfig,
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        // The last reference may be released from a worker thread, where a
        // blocking shutdown is not allowed.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Bounded worker pool that runs tasks and delivers their outcome exactly once.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<ExecutorInner>,
}

impl fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("config", &self.inner.config)
            .field("available_permits", &self.inner.permits.available_permits())
            .finish()
    }
}

impl TaskExecutor {
    /// Start the worker pool.
    ///
    /// `max_in_flight` above `Semaphore::MAX_PERMITS` is a configuration error.
    pub fn new(config: ExecutorConfig) -> Result<Self, PelletError> {
        if config.max_in_flight > Semaphore::MAX_PERMITS {
            return Err(PelletError::configuration(format!(
                "max_in_flight {} exceeds the limit of {}",
                config.max_in_flight,
                Semaphore::MAX_PERMITS
            )));
        }
        let id = NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed);
        let workers = config.worker_threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("pellet-worker")
            .on_thread_start(move || WORKER_OF.with(|w| w.set(id)))
            .enable_all()
            .build()
            .map_err(|e| PelletError::executor(format!("Failed to start worker pool: {}", e)))?;
        let handle = runtime.handle().clone();
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));

        debug!(
            workers,
            max_in_flight = config.max_in_flight,
            "Started task executor"
        );

        Ok(Self {
            inner: Arc::new(ExecutorInner {
                id,
                runtime: Some(runtime),
                handle,
                permits,
                config,
            }),
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Run `task` on the calling thread and return its outcome.
    ///
    /// Callbacks of this executor may call it again. From any other async
    /// context it fails with an executor error, since blocking there would
    /// stall a foreign runtime's worker.
    pub fn run_sync<T: Task>(&self, task: T) -> Result<T::Output, PelletError> {
        block_on_from_sync(
            &self.inner.handle,
            self.inner.id,
            async move { task.execute().await },
            "Synchronous call made from an async context; use the async variant",
        )?
    }

    /// Schedule `task` on the worker pool without blocking the caller.
    ///
    /// Exactly one of `callback.on_success` / `callback.on_failure` runs, on a
    /// worker thread, once the task finishes. Tasks beyond `max_in_flight`
    /// wait for a slot before starting.
    pub fn run_async<T, C>(&self, task: T, callback: C) -> TaskHandle
    where
        T: Task,
        C: Callback<T::Output>,
    {
        let state = Arc::new(AtomicU8::new(TaskState::Created as u8));
        let keep_alive = Arc::clone(&self.inner);
        let task_state = Arc::clone(&state);

        let join = self.inner.handle.spawn(async move {
            let permit = match Arc::clone(&keep_alive.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    task_state.store(TaskState::Failed as u8, Ordering::SeqCst);
                    callback.on_failure(PelletError::executor("Executor is shut down"));
                    return;
                }
            };
            task_state.store(TaskState::Running as u8, Ordering::SeqCst);

            let outcome = AssertUnwindSafe(task.execute()).catch_unwind().await;
            drop(permit);

            match outcome {
                Ok(Ok(value)) => {
                    task_state.store(TaskState::Succeeded as u8, Ordering::SeqCst);
                    callback.on_success(value);
                }
                Ok(Err(error)) => {
                    task_state.store(TaskState::Failed as u8, Ordering::SeqCst);
                    callback.on_failure(error);
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(%message, "Task panicked");
                    task_state.store(TaskState::Failed as u8, Ordering::SeqCst);
                    callback.on_failure(PelletError::executor(format!("Task panicked: {}", message)));
                }
            }
            drop(keep_alive);
        });

        TaskHandle {
            join,
            state,
            handle: self.inner.handle.clone(),
            executor_id: self.inner.id,
        }
    }

    /// Stop accepting new work; queued tasks fail with an executor error.
    pub fn close(&self) {
        self.inner.permits.close();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to an asynchronous invocation.
pub struct TaskHandle {
    join: JoinHandle<()>,
    state: Arc<AtomicU8>,
    handle: Handle,
    executor_id: usize,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True once the callback has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the callback has run. Like `run_sync`, only allowed outside
    /// async code or from a callback of the same executor.
    pub fn wait(self) -> Result<TaskState, PelletError> {
        let state = Arc::clone(&self.state);
        block_on_from_sync(
            &self.handle,
            self.executor_id,
            self.join,
            "TaskHandle::wait called from an async context; await finished() instead",
        )?
        .map_err(|e| PelletError::executor(format!("Task did not complete: {}", e)))?;
        Ok(TaskState::from_u8(state.load(Ordering::SeqCst)))
    }

    /// Await completion from async code.
    pub async fn finished(self) -> Result<TaskState, PelletError> {
        self.join
            .await
            .map_err(|e| PelletError::executor(format!("Task did not complete: {}", e)))?;
        Ok(TaskState::from_u8(self.state.load(Ordering::SeqCst)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug)]
    struct Constant(u32);

    #[async_trait]
    impl Task for Constant {
        type Output = u32;

        async fn execute(&self) -> Result<u32, PelletError> {
            Ok(self.0)
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl Task for Failing {
        type Output = u32;

        async fn execute(&self) -> Result<u32, PelletError> {
            Err(PelletError::transport("connection refused"))
        }
    }

    #[derive(Debug)]
    struct Panicking;

    #[async_trait]
    impl Task for Panicking {
        type Output = u32;

        async fn execute(&self) -> Result<u32, PelletError> {
            panic!("boom")
        }
    }

    fn executor() -> TaskExecutor {
        TaskExecutor::new(ExecutorConfig {
            worker_threads: 2,
            max_in_flight: 8,
        })
        .unwrap()
    }

    #[test]
    fn test_run_sync_success_and_failure() {
        let exec = executor();
        assert_eq!(exec.run_sync(Constant(7)).unwrap(), 7);
        let err = exec.run_sync(Failing).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[test]
    fn test_async_matches_sync() {
        let exec = executor();

        let (tx, rx) = mpsc::channel::<Result<u32, PelletError>>();
        let handle = exec.run_async(Constant(42), tx);
        assert_eq!(handle.wait().unwrap(), TaskState::Succeeded);
        assert_eq!(rx.recv().unwrap().unwrap(), exec.run_sync(Constant(42)).unwrap());

        let (tx, rx) = mpsc::channel::<Result<u32, PelletError>>();
        exec.run_async(Failing, tx).wait().unwrap();
        assert_eq!(rx.recv().unwrap().unwrap_err(), exec.run_sync(Failing).unwrap_err());
    }

    #[test]
    fn test_panic_delivered_as_failure() {
        let exec = executor();
        let (tx, rx) = mpsc::channel::<Result<u32, PelletError>>();
        let state = exec.run_async(Panicking, tx).wait().unwrap();
        assert_eq!(state, TaskState::Failed);

        let err = rx.recv().unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Executor);
        assert!(err.to_string().contains("boom"));
        // No second delivery
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_fn_callback_runs_one_arm() {
        let exec = executor();
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&successes);
        let f = Arc::clone(&failures);
        let callback = FnCallback::new(
            move |v: u32| {
                assert_eq!(v, 3);
                s.fetch_add(1, Ordering::SeqCst);
            },
            move |_e: PelletError| {
                f.fetch_add(1, Ordering::SeqCst);
            },
        );
        exec.run_async(Constant(3), callback).wait().unwrap();

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_result_callback() {
        let exec = executor();
        let (tx, rx) = mpsc::channel::<bool>();
        let callback = ResultCallback::new(move |r: Result<u32, PelletError>| {
            tx.send(r.is_err()).unwrap();
        });
        exec.run_async(Failing, callback).wait().unwrap();
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn test_run_async_does_not_block_caller() {
        #[derive(Debug)]
        struct Slow;

        #[async_trait]
        impl Task for Slow {
            type Output = ();

            async fn execute(&self) -> Result<(), PelletError> {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            }
        }

        let exec = executor();
        let (tx, rx) = mpsc::channel::<Result<(), PelletError>>();
        let started = std::time::Instant::now();
        let handle = exec.run_async(Slow, tx);
        assert!(started.elapsed() < Duration::from_millis(150));
        assert!(!handle.state().is_terminal());

        handle.wait().unwrap();
        assert!(rx.recv().unwrap().is_ok());
    }

    #[test]
    fn test_closed_executor_fails_queued_tasks() {
        let exec = executor();
        exec.close();
        let (tx, rx) = mpsc::channel::<Result<u32, PelletError>>();
        assert_eq!(exec.run_async(Constant(1), tx).wait().unwrap(), TaskState::Failed);
        assert_eq!(rx.recv().unwrap().unwrap_err().kind(), crate::ErrorKind::Executor);
    }

    #[test]
    fn test_max_in_flight_above_permit_limit_is_rejected() {
        let err = TaskExecutor::new(ExecutorConfig {
            worker_threads: 1,
            max_in_flight: usize::MAX,
        })
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);

        let exec = TaskExecutor::new(ExecutorConfig {
            worker_threads: 1,
            max_in_flight: Semaphore::MAX_PERMITS,
        })
        .unwrap();
        assert_eq!(exec.run_sync(Constant(2)).unwrap(), 2);
    }

    #[test]
    fn test_callback_may_block_on_same_executor() {
        let exec = TaskExecutor::new(ExecutorConfig {
            worker_threads: 1,
            max_in_flight: 8,
        })
        .unwrap();
        let nested = exec.clone();
        let (tx, rx) = mpsc::channel::<Result<u32, PelletError>>();
        let callback = FnCallback::new(
            move |v: u32| {
                let inner = nested.run_sync(Constant(v + 1));
                let (inner_tx, inner_rx) = mpsc::channel::<Result<u32, PelletError>>();
                let waited = nested.run_async(Constant(v + 2), inner_tx).wait();
                assert_eq!(waited.unwrap(), TaskState::Succeeded);
                assert_eq!(inner_rx.recv().unwrap().unwrap(), v + 2);
                tx.send(inner).unwrap();
            },
            |e: PelletError| panic!("unexpected failure: {e}"),
        );

        assert_eq!(exec.run_async(Constant(1), callback).wait().unwrap(), TaskState::Succeeded);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(), 2);
    }

    #[test]
    fn test_callback_of_other_executor_is_refused() {
        let exec = executor();
        let other = executor();
        let (tx, rx) = mpsc::channel::<PelletError>();
        let callback = FnCallback::new(
            move |_: u32| {
                tx.send(other.run_sync(Constant(0)).unwrap_err()).unwrap();
            },
            |e: PelletError| panic!("unexpected failure: {e}"),
        );
        exec.run_async(Constant(1), callback).wait().unwrap();
        assert_eq!(rx.recv().unwrap().kind(), crate::ErrorKind::Executor);
    }

    #[tokio::test]
    async fn test_run_sync_refuses_async_context() {
        let exec = TaskExecutor::new(ExecutorConfig::default()).unwrap();
        let err = exec.run_sync(Constant(1)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Executor);

        let (tx, rx) = oneshot::channel::<Result<u32, PelletError>>();
        let state = exec.run_async(Constant(5), tx).finished().await.unwrap();
        assert_eq!(state, TaskState::Succeeded);
        assert_eq!(rx.await.unwrap().unwrap(), 5);

        // Dropping a runtime inside another runtime must not panic
        drop(exec);
    }
}
