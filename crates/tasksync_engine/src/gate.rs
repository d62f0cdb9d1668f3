//! Serialization gate.
//!
//! The gate runs submitted jobs one at a time, in submission order, on a
//! single worker task. A job that needs another attempt hands itself back
//! together with a delay; a timer task sleeps for that delay and appends the
//! job to the back of the queue. The worker is free while the timer runs, so
//! jobs submitted in the meantime may run first, yet no two attempts ever
//! overlap.
//!
//! Each logical operation holds a pending guard from submission until its
//! final step. When the last guard is released the queue is quiescent and
//! drain listeners fire.

use parking_lot::Mutex;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the worker does after running a job.
pub enum Step<C> {
    /// The job reached its final outcome.
    Done,
    /// The job wants another attempt after `delay`.
    RetryAfter {
        /// Time to wait before the job re-enters the queue.
        delay: Duration,
        /// The job to run again.
        job: Box<dyn Job<C>>,
    },
}

/// A unit of work run by the gate with exclusive access to the context `C`.
pub trait Job<C>: Send + 'static {
    /// Runs one attempt.
    fn run<'a>(self: Box<Self>, ctx: &'a mut C) -> BoxFuture<'a, Step<C>>;
}

struct Envelope<C> {
    job: Box<dyn Job<C>>,
    pending: PendingGuard,
}

enum Message<C> {
    Run(Envelope<C>),
    Close,
}

/// Tells the worker that no queue handle is left once the last one drops.
struct QueueCloser<C> {
    tx: mpsc::UnboundedSender<Message<C>>,
}

impl<C> Drop for QueueCloser<C> {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Close);
    }
}

/// FIFO queue with a single worker that owns the shared context.
pub struct OperationQueue<C> {
    tx: mpsc::UnboundedSender<Message<C>>,
    tracker: Arc<SettleTracker>,
    _closer: Arc<QueueCloser<C>>,
}

impl<C> Clone for OperationQueue<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            tracker: Arc::clone(&self.tracker),
            _closer: Arc::clone(&self._closer),
        }
    }
}

impl<C: Send + 'static> OperationQueue<C> {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// The worker owns `context` and exits once every queue handle is
    /// dropped and no operation is pending.
    pub fn spawn(context: C) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(SettleTracker::default());
        tokio::spawn(drain(context, rx, tx.clone(), Arc::clone(&tracker)));

        Self {
            _closer: Arc::new(QueueCloser { tx: tx.clone() }),
            tx,
            tracker,
        }
    }

    /// Appends a new logical operation to the queue without blocking.
    ///
    /// Returns false if the worker is gone; the job is then dropped.
    pub fn submit(&self, job: Box<dyn Job<C>>) -> bool {
        let envelope = Envelope {
            job,
            pending: self.tracker.begin(),
        };
        if self.tx.send(Message::Run(envelope)).is_err() {
            warn!("operation queue worker is gone; dropping job");
            return false;
        }
        true
    }
}

impl<C> OperationQueue<C> {
    /// Number of operations queued, running, or waiting for a retry.
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    /// Calls `callback` once the queue is next quiescent.
    ///
    /// Fires immediately if nothing is pending.
    pub fn on_drained(&self, callback: impl FnOnce() + Send + 'static) {
        self.tracker.on_drained(Box::new(callback));
    }

    /// Waits until no operation is queued, running, or waiting for a retry.
    pub async fn all_settled(&self) {
        let (tx, rx) = oneshot::channel();
        self.on_drained(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }
}

async fn drain<C: Send + 'static>(
    mut context: C,
    mut rx: mpsc::UnboundedReceiver<Message<C>>,
    requeue: mpsc::UnboundedSender<Message<C>>,
    tracker: Arc<SettleTracker>,
) {
    let mut closing = false;
    while let Some(message) = rx.recv().await {
        match message {
            Message::Run(Envelope { job, pending }) => match job.run(&mut context).await {
                Step::Done => drop(pending),
                Step::RetryAfter { delay, job } => {
                    schedule_retry(&requeue, delay, Envelope { job, pending });
                }
            },
            Message::Close => closing = true,
        }
        if closing && tracker.pending() == 0 {
            break;
        }
    }
    debug!("operation queue closed");
}

fn schedule_retry<C: Send + 'static>(
    requeue: &mpsc::UnboundedSender<Message<C>>,
    delay: Duration,
    envelope: Envelope<C>,
) {
    let tx = requeue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if tx.send(Message::Run(envelope)).is_err() {
            warn!("operation queue closed before retry fired");
        }
    });
}

type DrainCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SettleTracker {
    inner: Mutex<SettleInner>,
}

#[derive(Default)]
struct SettleInner {
    pending: usize,
    waiters: Vec<DrainCallback>,
}

impl SettleTracker {
    fn begin(self: &Arc<Self>) -> PendingGuard {
        self.inner.lock().pending += 1;
        PendingGuard {
            tracker: Arc::clone(self),
        }
    }

    fn pending(&self) -> usize {
        self.inner.lock().pending
    }

    fn finish(&self) {
        let waiters = {
            let mut inner = self.inner.lock();
            inner.pending = inner.pending.saturating_sub(1);
            if inner.pending == 0 {
                mem::take(&mut inner.waiters)
            } else {
                Vec::new()
            }
        };
        if !waiters.is_empty() {
            debug!(listeners = waiters.len(), "operation queue drained");
        }
        for waiter in waiters {
            waiter();
        }
    }

    fn on_drained(&self, callback: DrainCallback) {
        let mut inner = self.inner.lock();
        if inner.pending == 0 {
            drop(inner);
            callback();
        } else {
            inner.waiters.push(callback);
        }
    }
}

/// Keeps one logical operation counted as pending until dropped.
struct PendingGuard {
    tracker: Arc<SettleTracker>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        active: usize,
        peak: Arc<AtomicUsize>,
    }

    struct Record {
        name: &'static str,
        work: Duration,
    }

    impl Job<Recorder> for Record {
        fn run<'a>(self: Box<Self>, ctx: &'a mut Recorder) -> BoxFuture<'a, Step<Recorder>> {
            Box::pin(async move {
                ctx.active += 1;
                ctx.peak.fetch_max(ctx.active, Ordering::SeqCst);
                tokio::time::sleep(self.work).await;
                ctx.active -= 1;
                ctx.log.lock().push(self.name.to_string());
                Step::Done
            })
        }
    }

    struct Flaky {
        name: &'static str,
        attempt: u32,
        failures: u32,
        delay: Duration,
        done: Option<oneshot::Sender<u32>>,
    }

    impl Job<Recorder> for Flaky {
        fn run<'a>(self: Box<Self>, ctx: &'a mut Recorder) -> BoxFuture<'a, Step<Recorder>> {
            Box::pin(async move {
                let mut job = *self;
                ctx.log.lock().push(format!("{}#{}", job.name, job.attempt));
                if job.attempt <= job.failures {
                    job.attempt += 1;
                    let delay = job.delay;
                    return Step::RetryAfter {
                        delay,
                        job: Box::new(job),
                    };
                }
                if let Some(done) = job.done.take() {
                    let _ = done.send(job.attempt);
                }
                Step::Done
            })
        }
    }

    fn flaky(name: &'static str, failures: u32, delay: Duration) -> Box<Flaky> {
        Box::new(Flaky {
            name,
            attempt: 1,
            failures,
            delay,
            done: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn runs_jobs_in_order_one_at_a_time() {
        let recorder = Recorder::default();
        let log = Arc::clone(&recorder.log);
        let peak = Arc::clone(&recorder.peak);
        let queue = OperationQueue::spawn(recorder);

        for name in ["a", "b", "c"] {
            queue.submit(Box::new(Record {
                name,
                work: Duration::from_millis(50),
            }));
        }
        assert_eq!(queue.pending(), 3);

        queue.all_settled().await;
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_behind_newer_jobs() {
        let recorder = Recorder::default();
        let log = Arc::clone(&recorder.log);
        let queue = OperationQueue::spawn(recorder);

        queue.submit(flaky("a", 1, Duration::from_secs(1)));
        queue.submit(Box::new(Record {
            name: "b",
            work: Duration::from_millis(10),
        }));

        queue.all_settled().await;
        assert_eq!(*log.lock(), vec!["a#1", "b", "a#2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn retrying_job_counts_as_pending() {
        let queue = OperationQueue::spawn(Recorder::default());
        queue.submit(flaky("a", 2, Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.pending(), 1);

        queue.all_settled().await;
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_listener_fires_once() {
        let queue = OperationQueue::spawn(Recorder::default());
        let fired = Arc::new(AtomicUsize::new(0));

        queue.submit(flaky("a", 1, Duration::from_millis(100)));
        let counter = Arc::clone(&fired);
        queue.on_drained(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        queue.all_settled().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        queue.submit(flaky("b", 0, Duration::ZERO));
        queue.all_settled().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_listener_fires_immediately_when_idle() {
        let queue = OperationQueue::spawn(Recorder::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        queue.on_drained(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_retries_survive_dropped_handle() {
        let queue = OperationQueue::spawn(Recorder::default());
        let (tx, rx) = oneshot::channel();
        let mut job = flaky("a", 2, Duration::from_secs(2));
        job.done = Some(tx);

        queue.submit(job);
        drop(queue);

        assert_eq!(rx.await.unwrap(), 3);
    }
}
