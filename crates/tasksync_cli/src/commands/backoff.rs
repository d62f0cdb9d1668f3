//! Backoff command implementation.

use serde::Serialize;
use std::time::Duration;
use tasksync_engine::{RetryConfig, RetryPolicy, SyncResult};

/// One retry of the schedule.
#[derive(Debug, Serialize)]
pub struct ScheduleRow {
    /// Attempt that failed (1-based).
    pub attempt: u32,
    /// Delay before the next attempt, without jitter.
    pub base_ms: u64,
    /// Smallest delay jitter can produce.
    pub earliest_ms: u64,
    /// Largest delay jitter can produce.
    pub latest_ms: u64,
    /// Total base wait up to and including this retry.
    pub cumulative_ms: u64,
}

/// The full schedule for a configuration.
#[derive(Debug, Serialize)]
pub struct ScheduleReport {
    /// Retries before the ceiling is reached.
    pub rows: Vec<ScheduleRow>,
    /// Attempts a permanently failing operation makes.
    pub max_attempts: u32,
    /// Delay ceiling.
    pub max_delay_ms: u64,
}

/// Builds the schedule report for a configuration.
pub fn report(config: &RetryConfig) -> SyncResult<ScheduleReport> {
    let policy = RetryPolicy::new(config)?;
    let max = policy.max_delay();
    let mut cumulative = Duration::ZERO;

    let rows = policy
        .schedule()
        .into_iter()
        .zip(1u32..)
        .map(|(base, attempt)| {
            cumulative += base;
            let spread = base.mul_f64(config.jitter);
            ScheduleRow {
                attempt,
                base_ms: millis(base),
                earliest_ms: millis(base.saturating_sub(spread)),
                latest_ms: millis((base + spread).min(max)),
                cumulative_ms: millis(cumulative),
            }
        })
        .collect();

    Ok(ScheduleReport {
        rows,
        max_attempts: policy.max_attempts(),
        max_delay_ms: millis(max),
    })
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Runs the backoff command.
pub fn run(config: &RetryConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = report(config)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

fn print_text_output(report: &ScheduleReport) {
    println!("{:>7}  {:>10}  {:>21}  {:>12}", "attempt", "base", "jitter range", "total wait");
    for row in &report.rows {
        println!(
            "{:>7}  {:>8}ms  {:>9}ms-{:>9}ms  {:>10}ms",
            row.attempt, row.base_ms, row.earliest_ms, row.latest_ms, row.cumulative_ms
        );
    }
    println!();
    println!(
        "Gives up after {} attempts (ceiling {}ms).",
        report.max_attempts, report.max_delay_ms
    );
}
