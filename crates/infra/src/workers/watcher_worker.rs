use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use flowmatch_events::{WatcherHandle, WatcherNotification};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}

/// Drains a watcher's notifications on a dedicated thread.
///
/// - The stream delivers synchronously into the watcher's bounded buffer; this worker moves
///   the handling (alerts, follow-up effects) off the writer's path
/// - Handler errors are logged and the loop continues
/// - Stops on shutdown, or once the watcher is removed from its stream
#[derive(Debug)]
pub struct WatcherWorker;

impl WatcherWorker {
    pub fn spawn<H, E>(
        name: &'static str,
        watcher: WatcherHandle,
        mut handler: H,
    ) -> std::io::Result<WorkerHandle>
    where
        H: FnMut(WatcherNotification) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, watcher, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<H, E>(
    name: &'static str,
    watcher: WatcherHandle,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(WatcherNotification) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match watcher.recv_timeout(tick) {
            Ok(notification) => {
                if let Err(err) = handler(notification) {
                    warn!(worker = name, watcher = %watcher.id(), error = ?err, "watcher handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker = name, watcher = %watcher.id(), dropped = watcher.dropped(), "watcher worker stopped");
}
