//! Simulate command implementation.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tasksync_engine::{
    HttpTransport, LoopbackClient, LoopbackRequest, MemoryItemStore, RetryConfig, SyncConfig,
    SyncEngine,
};
use tasksync_protocol::TodoItem;
use tasksync_server::{ListServer, ServerConfig};
use tracing::info;

const BASE_URL: &str = "http://tasksync.local/api";
const TOKEN: &str = "simulation";
const DEVICE: &str = "simulator";

/// Options of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Backoff configuration of the engine.
    pub retry: RetryConfig,
    /// Items created concurrently.
    pub items: usize,
    /// Requests the server fails first.
    pub fail: usize,
    /// Status of the injected failures.
    pub fail_status: u16,
    /// Responses corrupted after the failures.
    pub corrupt: usize,
}

/// Outcome of one operation in the run.
#[derive(Debug, Serialize)]
pub struct OperationOutcome {
    /// Operation description.
    pub operation: String,
    /// "ok" or the error message.
    pub outcome: String,
}

/// Simulation result.
#[derive(Debug, Serialize)]
pub struct SimulateResult {
    /// One entry per operation, in completion order.
    pub operations: Vec<OperationOutcome>,
    /// Transport attempts made by the engine.
    pub attempts: u64,
    /// Retries scheduled by the engine.
    pub retries_scheduled: u64,
    /// Operations that gave up.
    pub terminal_failures: u64,
    /// Requests seen by the server.
    pub server_requests: u64,
    /// Revision known to the engine at the end.
    pub client_revision: u64,
    /// Revision held by the server at the end.
    pub server_revision: u64,
    /// Items on the server at the end.
    pub server_items: usize,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Runs the simulate command.
pub fn run(options: SimulateOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(simulate(options))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Creates items concurrently against a faulty server, then reconciles a
/// local store with it.
pub async fn simulate(options: SimulateOptions) -> Result<SimulateResult, Box<dyn std::error::Error>> {
    let started = Instant::now();
    let server = Arc::new(ListServer::new(ServerConfig::default().with_token(TOKEN)));
    server.fail_next(options.fail, options.fail_status);
    server.corrupt_next(options.corrupt);

    let routed = Arc::clone(&server);
    let client = LoopbackClient::new(BASE_URL, move |request: LoopbackRequest<'_>| {
        routed.handle(request.method, request.path, request.headers, request.body)
    });
    let transport = HttpTransport::new(BASE_URL, client);
    let config = SyncConfig::new(BASE_URL, DEVICE)
        .with_token(TOKEN)
        .with_request_timeout(Duration::from_secs(5))
        .with_retry(options.retry);
    let engine = SyncEngine::new(config, transport)?;

    info!(
        items = options.items,
        fail = options.fail,
        corrupt = options.corrupt,
        "starting simulation"
    );

    let mut handles = Vec::with_capacity(options.items);
    for i in 0..options.items {
        let item = TodoItem::new(format!("task {}", i + 1), DEVICE);
        handles.push((format!("create {}", item.id), engine.create_item(item)));
    }

    let mut operations = Vec::new();
    for (operation, handle) in handles {
        let outcome = match handle.await {
            Ok(synced) => format!("ok (revision {})", synced.revision),
            Err(err) => err.to_string(),
        };
        operations.push(OperationOutcome { operation, outcome });
    }
    engine.all_settled().await;

    let store = MemoryItemStore::new();
    let outcome = match engine.sync_with_store(&store).await {
        Ok(synced) => format!("ok ({} items, revision {})", synced.items.len(), synced.revision),
        Err(err) => err.to_string(),
    };
    operations.push(OperationOutcome {
        operation: "sync local store".into(),
        outcome,
    });

    let stats = engine.stats();
    Ok(SimulateResult {
        operations,
        attempts: stats.attempts,
        retries_scheduled: stats.retries_scheduled,
        terminal_failures: stats.terminal_failures,
        server_requests: server.stats().requests,
        client_revision: engine.revision().value(),
        server_revision: server.revision().value(),
        server_items: server.items().len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

fn print_text_output(result: &SimulateResult) {
    println!("Operations:");
    for op in &result.operations {
        println!("  {:<48} {}", op.operation, op.outcome);
    }
    println!();
    println!("Engine attempts:     {}", result.attempts);
    println!("Retries scheduled:   {}", result.retries_scheduled);
    println!("Terminal failures:   {}", result.terminal_failures);
    println!("Server requests:     {}", result.server_requests);
    println!(
        "Revision:            client {} / server {}",
        result.client_revision, result.server_revision
    );
    println!("Server items:        {}", result.server_items);
    println!("Elapsed:             {}ms", result.elapsed_ms);
}
