//! Sync engine: public operations on top of the serialization gate.

use crate::config::{RetryClassification, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::gate::{BoxFuture, Job, OperationQueue, Step};
use crate::operation::{Operation, OperationKind};
use crate::request::{RequestBuilder, RestRequestBuilder};
use crate::retry::RetryPolicy;
use crate::state::{EngineStatus, OperationPhase, RevisionState, SyncStats};
use crate::store::ItemStore;
use crate::transport::{RequestTransport, TransportError};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tasksync_protocol::{
    ElementResponse, ItemId, ListResponse, ProtocolResult, Revision, TodoItem,
};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// The server's list after a list operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedList {
    /// Items held by the server.
    pub items: Vec<TodoItem>,
    /// Server revision after the operation.
    pub revision: Revision,
}

/// The server's copy of one item after an element operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedItem {
    /// The item as stored (or removed) by the server.
    pub item: TodoItem,
    /// Server revision after the operation.
    pub revision: Revision,
}

/// A decoded response body that carries the server revision.
trait ResponseModel: Sized + Send + 'static {
    fn decode(body: &[u8]) -> ProtocolResult<Self>;
    fn revision(&self) -> Revision;
}

impl ResponseModel for SyncedList {
    fn decode(body: &[u8]) -> ProtocolResult<Self> {
        let response = ListResponse::decode(body)?;
        Ok(Self {
            items: response.list,
            revision: response.revision,
        })
    }

    fn revision(&self) -> Revision {
        self.revision
    }
}

impl ResponseModel for SyncedItem {
    fn decode(body: &[u8]) -> ProtocolResult<Self> {
        let response = ElementResponse::decode(body)?;
        Ok(Self {
            item: response.element,
            revision: response.revision,
        })
    }

    fn revision(&self) -> Revision {
        self.revision
    }
}

/// The eventual outcome of one submitted operation.
///
/// Await the handle, or pass a callback to [`OperationHandle::on_complete`].
/// The outcome is delivered exactly once; if the engine stops first the
/// handle resolves to [`SyncError::EngineStopped`]. Dropping the handle does
/// not cancel the operation.
#[derive(Debug)]
pub struct OperationHandle<T> {
    rx: oneshot::Receiver<SyncResult<T>>,
}

impl<T: Send + 'static> OperationHandle<T> {
    /// Runs `callback` with the outcome once it is known.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the wait runs on a
    /// spawned task.
    pub fn on_complete(self, callback: impl FnOnce(SyncResult<T>) + Send + 'static) {
        tokio::spawn(async move { callback(self.await) });
    }
}

impl<T> Future for OperationHandle<T> {
    type Output = SyncResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(SyncError::EngineStopped)))
    }
}

/// State owned by the gate worker.
struct EngineContext<T, B> {
    transport: T,
    builder: B,
    policy: RetryPolicy,
    classification: RetryClassification,
    state: RevisionState,
    status: watch::Sender<EngineStatus>,
    stats: Arc<RwLock<SyncStats>>,
    rng: StdRng,
}

impl<T, B> EngineContext<T, B> {
    fn publish(&self) {
        self.status.send_replace(self.state.snapshot());
    }

    fn note_error(&self, message: String) {
        self.stats.write().last_error = Some(message);
    }
}

/// One logical operation moving through the gate.
struct SyncJob<R> {
    operation: Operation,
    attempt: u32,
    phase: OperationPhase,
    responder: oneshot::Sender<SyncResult<R>>,
}

impl<R: ResponseModel> SyncJob<R> {
    fn new(operation: Operation, responder: oneshot::Sender<SyncResult<R>>) -> Self {
        Self {
            operation,
            attempt: 1,
            phase: OperationPhase::Idle,
            responder,
        }
    }

    fn advance(&mut self, next: OperationPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    fn finish<C>(mut self, outcome: SyncResult<R>) -> Step<C> {
        let phase = if outcome.is_ok() {
            OperationPhase::Success
        } else {
            OperationPhase::Failed
        };
        self.advance(phase);
        if self.responder.send(outcome).is_err() {
            debug!(operation = %self.operation.kind(), "caller dropped the handle");
        }
        Step::Done
    }

    async fn attempt<T, B>(mut self, ctx: &mut EngineContext<T, B>) -> Step<EngineContext<T, B>>
    where
        T: RequestTransport,
        B: RequestBuilder,
    {
        let kind = self.operation.kind();
        if self.attempt == 1 {
            ctx.state.begin_operation();
        }
        self.advance(OperationPhase::Sending);

        let request = match ctx.builder.build_request(&self.operation, ctx.state.revision()) {
            Ok(request) => request,
            Err(err) => {
                error!(operation = %kind, error = %err, "failed to build request");
                ctx.note_error(err.to_string());
                return self.finish(Err(SyncError::Encode(err)));
            }
        };

        debug!(
            operation = %kind,
            attempt = self.attempt,
            known_revision = ?request.known_revision,
            "sending request"
        );
        ctx.stats.write().attempts += 1;

        let timeout = request.timeout;
        let outcome = match tokio::time::timeout(timeout, ctx.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match outcome {
            Ok(response) => match R::decode(&response.body) {
                Ok(model) => {
                    let revision = model.revision();
                    ctx.state.record_success(revision);
                    ctx.publish();
                    {
                        let mut stats = ctx.stats.write();
                        stats.successes += 1;
                        stats.last_success = Some(Instant::now());
                        stats.last_error = None;
                    }
                    debug!(operation = %kind, %revision, "operation succeeded");
                    self.finish(Ok(model))
                }
                Err(err) => {
                    ctx.state.record_failure();
                    ctx.publish();
                    ctx.stats.write().decode_failures += 1;
                    ctx.note_error(err.to_string());
                    warn!(operation = %kind, error = %err, "undecodable response");
                    self.finish(Err(SyncError::Decode(err)))
                }
            },
            Err(err) => self.handle_transport_error(ctx, kind, err),
        }
    }

    fn handle_transport_error<T, B>(
        mut self,
        ctx: &mut EngineContext<T, B>,
        kind: OperationKind,
        err: TransportError,
    ) -> Step<EngineContext<T, B>>
    where
        T: RequestTransport,
        B: RequestBuilder,
    {
        ctx.state.record_failure();
        ctx.note_error(err.to_string());

        if !ctx.classification.should_retry(&err) {
            ctx.state.record_exhausted();
            ctx.publish();
            ctx.stats.write().terminal_failures += 1;
            warn!(operation = %kind, error = %err, "failure is not retried");
            return self.finish(Err(SyncError::Transport(err)));
        }

        let decision = ctx.policy.next_attempt(self.attempt, &mut ctx.rng);
        ctx.state.set_retry_enabled(decision.retry_enabled);

        if !decision.retry_enabled {
            ctx.state.record_exhausted();
            ctx.publish();
            ctx.stats.write().terminal_failures += 1;
            error!(
                operation = %kind,
                attempts = self.attempt,
                error = %err,
                "retries exhausted"
            );
            let attempts = self.attempt;
            return self.finish(Err(SyncError::RetriesExhausted {
                attempts,
                last: err,
            }));
        }

        ctx.publish();
        ctx.stats.write().retries_scheduled += 1;
        warn!(
            operation = %kind,
            attempt = self.attempt,
            delay_ms = decision.delay.as_millis() as u64,
            error = %err,
            "attempt failed; retry scheduled"
        );
        self.advance(OperationPhase::RetryScheduled);
        self.attempt += 1;
        Step::RetryAfter {
            delay: decision.delay,
            job: Box::new(self),
        }
    }
}

impl<R, T, B> Job<EngineContext<T, B>> for SyncJob<R>
where
    R: ResponseModel,
    T: RequestTransport,
    B: RequestBuilder,
{
    fn run<'a>(
        self: Box<Self>,
        ctx: &'a mut EngineContext<T, B>,
    ) -> BoxFuture<'a, Step<EngineContext<T, B>>> {
        Box::pin((*self).attempt(ctx))
    }
}

/// The sync engine.
///
/// Every operation is queued on one serialization gate, so at most one
/// request is in flight at a time across all operation kinds. Failed
/// attempts are retried with exponential backoff until the delay ceiling is
/// reached. Must be created inside a tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// let engine = SyncEngine::new(config, transport)?;
/// let list = engine.fetch_list().await?;
/// engine.delete_item(list.items[0].id.clone()).await?;
/// ```
pub struct SyncEngine<T: RequestTransport, B: RequestBuilder = RestRequestBuilder> {
    queue: OperationQueue<EngineContext<T, B>>,
    status: watch::Receiver<EngineStatus>,
    stats: Arc<RwLock<SyncStats>>,
    config: Arc<SyncConfig>,
}

impl<T: RequestTransport, B: RequestBuilder> Clone for SyncEngine<T, B> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            status: self.status.clone(),
            stats: Arc::clone(&self.stats),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: RequestTransport> SyncEngine<T, RestRequestBuilder> {
    /// Creates an engine that talks to the REST list service.
    pub fn new(config: SyncConfig, transport: T) -> SyncResult<Self> {
        let builder = RestRequestBuilder::from_config(&config);
        Self::with_builder(config, transport, builder)
    }
}

impl<T: RequestTransport, B: RequestBuilder> SyncEngine<T, B> {
    /// Creates an engine with a custom request builder.
    pub fn with_builder(config: SyncConfig, transport: T, builder: B) -> SyncResult<Self> {
        Self::with_rng(config, transport, builder, StdRng::from_entropy())
    }

    fn with_rng(config: SyncConfig, transport: T, builder: B, rng: StdRng) -> SyncResult<Self> {
        config.validate()?;

        let state = RevisionState::new();
        let (status_tx, status_rx) = watch::channel(state.snapshot());
        let stats = Arc::new(RwLock::new(SyncStats::default()));

        let context = EngineContext {
            transport,
            builder,
            policy: RetryPolicy::new(&config.retry)?,
            classification: config.retry.classification,
            state,
            status: status_tx,
            stats: Arc::clone(&stats),
            rng,
        };
        let queue = OperationQueue::spawn(context);

        info!(
            device = %config.device_id,
            classification = ?config.retry.classification,
            "sync engine started"
        );

        Ok(Self {
            queue,
            status: status_rx,
            stats,
            config: Arc::new(config),
        })
    }

    fn submit<R: ResponseModel>(&self, operation: Operation) -> OperationHandle<R> {
        let (tx, rx) = oneshot::channel();
        debug!(
            operation = %operation.kind(),
            item = ?operation.item_id(),
            "operation queued"
        );
        self.queue.submit(Box::new(SyncJob::new(operation, tx)));
        OperationHandle { rx }
    }

    /// Downloads the whole list.
    pub fn fetch_list(&self) -> OperationHandle<SyncedList> {
        self.submit(Operation::FetchList)
    }

    /// Replaces the server list with `items`.
    pub fn push_list(&self, items: Vec<TodoItem>) -> OperationHandle<SyncedList> {
        self.submit(Operation::PushList { items })
    }

    /// Adds an item on the server.
    pub fn create_item(&self, item: TodoItem) -> OperationHandle<SyncedItem> {
        self.submit(Operation::CreateItem { item })
    }

    /// Downloads one item.
    pub fn read_item(&self, id: ItemId) -> OperationHandle<SyncedItem> {
        self.submit(Operation::ReadItem { id })
    }

    /// Replaces an item on the server.
    pub fn update_item(&self, item: TodoItem) -> OperationHandle<SyncedItem> {
        self.submit(Operation::UpdateItem { item })
    }

    /// Removes an item on the server.
    pub fn delete_item(&self, id: ItemId) -> OperationHandle<SyncedItem> {
        self.submit(Operation::DeleteItem { id })
    }

    /// Calls `callback` once no operation is queued, running, or retrying.
    ///
    /// Fires immediately if the engine is already idle.
    pub fn on_queue_drained(&self, callback: impl FnOnce() + Send + 'static) {
        self.queue.on_drained(callback);
    }

    /// Waits until no operation is queued, running, or retrying.
    pub async fn all_settled(&self) {
        self.queue.all_settled().await;
    }

    /// Number of operations that have not reached their final outcome.
    pub fn pending_operations(&self) -> usize {
        self.queue.pending()
    }

    /// Reconciles a local store with the server.
    ///
    /// Pushes the local items if the last attempt failed or the store holds
    /// unsynced edits; otherwise fetches the server list. Either way the
    /// server's answer is written back to the store.
    pub async fn sync_with_store<S: ItemStore + ?Sized>(&self, store: &S) -> SyncResult<SyncedList> {
        let push = self.is_dirty() || store.has_unsynced_changes()?;
        let synced = if push {
            let items = store.load_items()?;
            debug!(items = items.len(), "pushing local list");
            self.push_list(items).await?
        } else {
            self.fetch_list().await?
        };
        store.replace_all(synced.items.clone(), synced.revision)?;
        Ok(synced)
    }

    /// Last revision acknowledged by the server.
    pub fn revision(&self) -> Revision {
        self.status.borrow().revision
    }

    /// Whether the most recent attempt failed and a retry is pending.
    pub fn is_dirty(&self) -> bool {
        self.status.borrow().dirty
    }

    /// Current snapshot of the revision state.
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Returns a receiver that observes every revision state change.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::transport::{MockTransport, TransportResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tasksync_protocol::ProtocolError;
    use std::time::Duration;

    fn list_body(items: Vec<TodoItem>, revision: u64) -> Vec<u8> {
        ListResponse::ok(items, Revision::new(revision))
            .encode()
            .unwrap()
    }

    fn element_body(item: TodoItem, revision: u64) -> Vec<u8> {
        ElementResponse::ok(item, Revision::new(revision))
            .encode()
            .unwrap()
    }

    fn engine(transport: Arc<MockTransport>) -> SyncEngine<Arc<MockTransport>> {
        engine_with(transport, RetryConfig::default())
    }

    fn engine_with(
        transport: Arc<MockTransport>,
        retry: RetryConfig,
    ) -> SyncEngine<Arc<MockTransport>> {
        let config = SyncConfig::new("http://todo.test", "test-device")
            .with_token("t")
            .with_retry(retry);
        let builder = RestRequestBuilder::from_config(&config);
        SyncEngine::with_rng(config, transport, builder, StdRng::seed_from_u64(42)).unwrap()
    }

    #[tokio::test]
    async fn initial_state() {
        let engine = engine(Arc::new(MockTransport::new()));
        assert_eq!(engine.revision(), Revision::INITIAL);
        assert!(!engine.is_dirty());
        assert!(engine.status().retry_enabled);
        assert_eq!(engine.pending_operations(), 0);
        assert_eq!(engine.config().device_id, "test-device");
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = SyncConfig::default().with_retry(RetryConfig::default().with_factor(0.5));
        let result = SyncEngine::new(config, MockTransport::new());
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn fetch_then_delete_uses_fetched_revision() {
        let transport = Arc::new(MockTransport::new());
        let item = TodoItem::new("x", "d");
        transport.push_ok(list_body(vec![item.clone()], 5));
        transport.push_ok(element_body(item.clone(), 6));
        let engine = engine(Arc::clone(&transport));

        let list = engine.fetch_list().await.unwrap();
        assert_eq!(list.revision, Revision::new(5));
        assert_eq!(engine.revision(), Revision::new(5));

        let deleted = engine.delete_item(item.id.clone()).await.unwrap();
        assert_eq!(deleted.item.id, item.id);
        assert_eq!(engine.revision(), Revision::new(6));

        let requests = transport.requests();
        assert_eq!(requests[0].known_revision, None);
        assert_eq!(requests[1].known_revision, Some(Revision::new(5)));
        assert_eq!(requests[1].path, format!("/list/{}", item.id));
    }

    #[tokio::test]
    async fn undecodable_body_fails_without_retry() {
        let transport = Arc::new(MockTransport::new());
        transport.push_reply(Ok(TransportResponse::ok(b"<html>".to_vec())));
        let engine = engine(Arc::clone(&transport));

        let result = engine.fetch_list().await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
        assert!(engine.is_dirty());
        assert_eq!(transport.send_count(), 1);
        assert_eq!(engine.pending_operations(), 0);

        let stats = engine.stats();
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.retries_scheduled, 0);
    }

    #[tokio::test]
    async fn unroutable_item_id_fails_before_sending() {
        let transport = Arc::new(MockTransport::new());
        let engine = engine(Arc::clone(&transport));

        let result = engine.read_item("a/b".into()).await;
        assert!(matches!(
            result,
            Err(SyncError::Encode(ProtocolError::InvalidItemId(_)))
        ));
        assert_eq!(transport.send_count(), 0);
        assert_eq!(engine.stats().retries_scheduled, 0);
        assert_eq!(engine.pending_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_silently() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(TransportError::ServerUnavailable { status: 503 });
        transport.push_error(TransportError::NetworkUnreachable("offline".into()));
        transport.push_ok(list_body(vec![], 3));
        let engine = engine(Arc::clone(&transport));

        let list = engine.fetch_list().await.unwrap();
        assert_eq!(list.revision, Revision::new(3));
        assert!(!engine.is_dirty());
        assert_eq!(transport.send_count(), 3);

        let stats = engine.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.retries_scheduled, 2);
        assert_eq!(stats.successes, 1);
        assert!(stats.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_gives_up_at_ceiling() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fallback(Err(TransportError::ServerUnavailable { status: 500 }));
        let engine = engine(Arc::clone(&transport));

        let result = engine.fetch_list().await;
        match result {
            Err(SyncError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 12);
                assert_eq!(last, TransportError::ServerUnavailable { status: 500 });
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(transport.send_count(), 12);

        let status = engine.status();
        assert!(!status.dirty);
        assert!(!status.retry_enabled);
        assert_eq!(engine.stats().terminal_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_resets_for_next_operation() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fallback(Err(TransportError::Timeout));
        let engine = engine(Arc::clone(&transport));

        assert!(engine.fetch_list().await.is_err());
        assert!(!engine.status().retry_enabled);

        transport.set_fallback(Ok(TransportResponse::ok(list_body(vec![], 1))));
        engine.fetch_list().await.unwrap();
        assert!(engine.status().retry_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_only_stops_on_auth_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fallback(Err(TransportError::Unauthorized));
        let retry = RetryConfig::default()
            .with_classification(crate::config::RetryClassification::TransientOnly);
        let engine = engine_with(Arc::clone(&transport), retry);

        let result = engine.read_item(ItemId::new("a")).await;
        assert!(matches!(
            result,
            Err(SyncError::Transport(TransportError::Unauthorized))
        ));
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn default_classification_retries_auth_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(TransportError::Unauthorized);
        transport.push_ok(element_body(TodoItem::new("a", "d"), 2));
        let engine = engine(Arc::clone(&transport));

        engine.read_item(ItemId::new("a")).await.unwrap();
        assert_eq!(transport.send_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.set_latency(Duration::from_secs(60));
        transport.set_fallback(Ok(TransportResponse::ok(list_body(vec![], 1))));
        let config = SyncConfig::new("http://todo.test", "d")
            .with_request_timeout(Duration::from_secs(1))
            .with_retry(RetryConfig::new(
                Duration::from_millis(100),
                Duration::from_millis(150),
            ));
        let engine = SyncEngine::new(config, Arc::clone(&transport)).unwrap();

        let result = engine.fetch_list().await;
        assert!(matches!(
            result,
            Err(SyncError::RetriesExhausted {
                last: TransportError::Timeout,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempts_never_overlap() {
        let transport = Arc::new(MockTransport::new());
        transport.set_latency(Duration::from_secs(60));
        let config = SyncConfig::new("http://todo.test", "d")
            .with_request_timeout(Duration::from_secs(1))
            .with_retry(RetryConfig::new(
                Duration::from_millis(100),
                Duration::from_millis(400),
            ));
        let engine = SyncEngine::new(config, Arc::clone(&transport)).unwrap();

        let result = engine.fetch_list().await;
        assert!(matches!(
            result,
            Err(SyncError::RetriesExhausted {
                attempts: 5,
                last: TransportError::Timeout,
            })
        ));
        assert_eq!(transport.send_count(), 5);
        assert_eq!(transport.peak_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_picks_up_revision_advanced_meanwhile() {
        let transport = Arc::new(MockTransport::new());
        let item = TodoItem::new("x", "d");
        transport.push_ok(list_body(vec![], 4));
        transport.push_error(TransportError::ServerUnavailable { status: 503 });
        transport.push_ok(list_body(vec![], 7));
        transport.push_ok(element_body(item.clone(), 8));
        let engine = engine(Arc::clone(&transport));

        engine.fetch_list().await.unwrap();
        let update = engine.update_item(item.clone());
        let fetch = engine.fetch_list();

        assert_eq!(fetch.await.unwrap().revision, Revision::new(7));
        assert_eq!(update.await.unwrap().revision, Revision::new(8));

        let revisions: Vec<_> = transport
            .requests()
            .iter()
            .map(|r| r.known_revision)
            .collect();
        assert_eq!(
            revisions,
            vec![None, Some(Revision::new(4)), None, Some(Revision::new(7))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_never_overlap() {
        let transport = Arc::new(MockTransport::new());
        transport.set_latency(Duration::from_millis(20));
        transport.set_fallback(Ok(TransportResponse::ok(list_body(vec![], 1))));
        let engine = engine(Arc::clone(&transport));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move { engine.fetch_list().await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(transport.send_count(), 8);
        assert_eq!(transport.peak_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_fire_once_and_drain_follows() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(TransportError::Timeout);
        transport.set_fallback(Ok(TransportResponse::ok(element_body(TodoItem::new("a", "d"), 2))));
        let engine = engine(Arc::clone(&transport));

        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            engine
                .create_item(TodoItem::new("a", "d"))
                .on_complete(move |result| {
                    assert!(result.is_ok());
                    calls.fetch_add(1, Ordering::SeqCst);
                });
        }

        let (tx, rx) = oneshot::channel();
        engine.on_queue_drained(move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        // Callbacks run on spawned tasks; let them finish.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.pending_operations(), 0);
    }

    #[tokio::test]
    async fn status_subscription_sees_revision() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(list_body(vec![], 9));
        let engine = engine(Arc::clone(&transport));
        let mut status = engine.subscribe();

        engine.fetch_list().await.unwrap();
        status.changed().await.unwrap();
        assert_eq!(status.borrow().revision, Revision::new(9));
    }
}
