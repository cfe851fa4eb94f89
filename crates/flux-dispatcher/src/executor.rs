//! Thread-affinity executor
//!
//! Owns the execution contexts stores run on:
//! - the caller's own thread (Immediate), driven by [`block_on_current`]
//! - one dedicated "flux-main" thread running a single-threaded runtime (Main)
//! - a multi-threaded worker pool (Background)
//!
//! Per-store ordering is not handled here: the dispatcher gives every
//! Main/Background store its own serial lane task spawned on the matching
//! context.

use crate::store::ThreadMode;
use std::future::Future;
use std::io;
use std::pin::pin;
use std::sync::mpsc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, Thread, ThreadId};
use tokio::runtime::{Builder, EnterGuard, Handle, Runtime};
use tokio::sync::oneshot;

const MAIN_THREAD_NAME: &str = "flux-main";
const BACKGROUND_THREAD_NAME: &str = "flux-background";

/// Execution contexts backing the three [`ThreadMode`]s
pub struct Executor {
    main: Handle,
    main_thread: ThreadId,
    main_shutdown: Option<oneshot::Sender<()>>,
    background: Option<Runtime>,
    background_handle: Handle,
}

impl Executor {
    /// Start the main context and a background pool with `workers` threads
    pub fn new(workers: usize) -> io::Result<Self> {
        let background = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(BACKGROUND_THREAD_NAME)
            .enable_all()
            .build()?;
        let background_handle = background.handle().clone();

        let (handle_tx, handle_rx) = mpsc::channel::<io::Result<Handle>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let main_thread = thread::Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(e));
                        return;
                    }
                };
                if handle_tx.send(Ok(runtime.handle().clone())).is_err() {
                    return;
                }

                log::debug!("Main context started");
                // Drives every task spawned on the main handle until shutdown.
                let _ = runtime.block_on(shutdown_rx);
                log::debug!("Main context stopped");
            })?;

        let main = handle_rx
            .recv()
            .map_err(|_| io::Error::other("main context exited during startup"))??;

        log::info!(
            "Executor started with {} background worker(s)",
            workers.max(1)
        );

        Ok(Self {
            main,
            main_thread: main_thread.thread().id(),
            main_shutdown: Some(shutdown_tx),
            background: Some(background),
            background_handle,
        })
    }

    /// Runtime handle serving lanes of the given mode
    ///
    /// Immediate stores have no lane; they resolve to the background handle,
    /// which is also the runtime context entered while they run.
    pub fn handle_for(&self, mode: ThreadMode) -> &Handle {
        match mode {
            ThreadMode::Main => &self.main,
            ThreadMode::Background | ThreadMode::Immediate => &self.background_handle,
        }
    }

    /// Spawn a task on the context of `mode`
    pub fn spawn<F>(&self, mode: ThreadMode, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle_for(mode).spawn(future);
    }

    /// Enter the background runtime so async I/O and timers work on the
    /// calling thread while an Immediate handler runs
    pub fn enter(&self) -> EnterGuard<'_> {
        self.background_handle.enter()
    }

    /// Whether the calling thread is the main context
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if let Some(shutdown) = self.main_shutdown.take() {
            let _ = shutdown.send(());
        }
        // May run on one of the pool's own workers; must not block.
        if let Some(background) = self.background.take() {
            background.shutdown_background();
        }
    }
}

struct ThreadWaker(Thread);

impl futures::task::ArcWake for ThreadWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

/// Drive `future` to completion on the calling thread
///
/// Unlike `futures::executor::block_on` this may be nested, which happens
/// when an Immediate handler dispatches to another Immediate store.
pub fn block_on_current<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = futures::task::waker(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);

    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => thread::park(),
        }
    }
}
