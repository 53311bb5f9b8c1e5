//! Worker pool for asynchronous handler work.
//!
//! Handlers that perform network calls submit their work here instead of
//! blocking the inbound stream. The pool is the multi-thread tokio runtime the
//! bot runs on; there is no bound on the number of in-flight tasks.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::FutureExt;
use log::{debug, error};
use tokio::{runtime::Handle, sync::Notify};

use crate::routing::{HandlerError, Responder};

/// Runs handler completions and contains their failures.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    /// Number of submitted tasks that have not completed yet
    in_flight: Arc<AtomicUsize>,
    /// Signalled when the last in-flight task completes
    idle: Arc<Notify>,
}

impl WorkerPool {
    pub fn new(handle: Handle) -> Self {
        WorkerPool {
            handle,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Creates a pool on the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        WorkerPool::new(Handle::current())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Spawns `task` for `handler`.
    ///
    /// If the task returns an error or panics, the failure is logged and the
    /// generic failure response is sent through `responder`.
    pub fn submit<F>(&self, handler: &'static str, responder: Responder, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let in_flight = Arc::clone(&self.in_flight);
        let idle = Arc::clone(&self.idle);
        in_flight.fetch_add(1, Ordering::SeqCst);
        debug!("submitting task of {}", handler);

        self.handle.spawn(async move {
            let outcome = AssertUnwindSafe(task).catch_unwind().await;
            if let Err(error) = HandlerError::from_outcome(handler, outcome) {
                error!(
                    "{} (origin {} in {})",
                    error,
                    responder.origin().actor,
                    responder.origin().channel
                );
                responder.fail();
            }
            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Resolves once no submitted task is in flight.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the counter is read, so a completion in between is not missed
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::oneshot, time};

    use super::*;
    use crate::{api::Origin, routing::ResponseSink};

    fn create_responder() -> (Responder, crate::routing::Outbox) {
        let (sink, outbox) = ResponseSink::channel("that didn't work");
        let responder = sink.bind(Origin {
            actor: "carol".to_string(),
            channel: "#bots".to_string(),
        });
        (responder, outbox)
    }

    #[tokio::test]
    async fn test_successful_task_responds_once() {
        let workers = WorkerPool::current();
        let (responder, mut outbox) = create_responder();

        let reply = responder.clone();
        workers.submit("echo", responder, async move {
            reply.respond("pong");
            Ok(())
        });
        workers.wait_idle().await;

        assert_eq!(outbox.recv().await.unwrap().lines, vec!["pong"]);
        assert!(outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_task_sends_failure_message() {
        let workers = WorkerPool::current();
        let (responder, mut outbox) = create_responder();

        workers.submit("echo", responder, async { anyhow::bail!("http 500") });
        workers.wait_idle().await;

        let outbound = outbox.recv().await.unwrap();
        assert_eq!(outbound.channel, "#bots");
        assert_eq!(outbound.lines, vec!["that didn't work"]);
        assert!(outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_panicking_task_sends_failure_message() {
        let workers = WorkerPool::current();
        let (responder, mut outbox) = create_responder();

        workers.submit("echo", responder, async {
            let values: Vec<u32> = Vec::new();
            let _value = values[3];
            Ok(())
        });
        workers.wait_idle().await;

        assert_eq!(outbox.recv().await.unwrap().lines, vec!["that didn't work"]);
        assert_eq!(workers.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_tracks_slow_tasks() {
        let workers = WorkerPool::current();
        let (responder, _outbox) = create_responder();

        workers.submit("slow", responder, async {
            time::sleep(Duration::from_millis(30)).await;
            Ok(())
        });
        assert_eq!(workers.in_flight(), 1);

        workers.wait_idle().await;
        assert_eq!(workers.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_wakes_on_last_completion() {
        let workers = WorkerPool::current();
        let (responder, _outbox) = create_responder();
        let (release, released) = oneshot::channel::<()>();

        workers.submit("gated", responder.clone(), async move {
            let _ = released.await;
            Ok(())
        });
        workers.submit("quick", responder, async { Ok(()) });

        let waiter = workers.clone();
        let idle = tokio::spawn(async move { waiter.wait_idle().await });

        // Still waiting while the gated task holds on
        time::sleep(Duration::from_millis(20)).await;
        assert!(!idle.is_finished());
        assert_eq!(workers.in_flight(), 1);

        release.send(()).unwrap();
        time::timeout(Duration::from_secs(1), idle)
            .await
            .expect("wait_idle did not wake up")
            .unwrap();
        assert_eq!(workers.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_at_once_without_work() {
        let workers = WorkerPool::current();

        time::timeout(Duration::from_millis(50), workers.wait_idle())
            .await
            .expect("idle pool should not wait");
    }
}
