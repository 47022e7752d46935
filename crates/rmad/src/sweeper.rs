//! SLA sweeper: periodic escalation of overdue cases.
//!
//! Each cycle queries the store for non-terminal cases past their deadline
//! and escalates them one by one through the normal optimistic-write path.
//! There is no lock shared with the request handlers; a sweep that loses a
//! write race simply drops the case until the next cycle, where the fresh
//! read decides again whether it is still overdue.

use crate::engine::WorkflowService;
use chrono::{DateTime, Utc};
use rma_common::{SweepConfig, WorkflowError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters for one sweep cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Overdue cases the cycle picked up
    pub scanned: usize,
    /// Escalations committed
    pub escalated: usize,
    /// Cases skipped because another writer won the version race
    pub conflicts: usize,
    /// Query errors, panics and per-case timeouts
    pub failures: usize,
}

/// Spawn the periodic sweep loop. The first cycle runs one interval after
/// startup; config values are clamped to their supported ranges.
pub fn spawn(service: Arc<WorkflowService>, config: SweepConfig) -> JoinHandle<()> {
    let interval_secs = config.effective_interval_secs();
    let case_timeout_ms = config.effective_case_timeout_ms();
    info!(
        "SLA sweeper started (interval: {}s, per-case timeout: {}ms)",
        interval_secs, case_timeout_ms
    );

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;

            let stats = sweep_once(&service, case_timeout_ms, Utc::now()).await;
            if stats.escalated > 0 || stats.failures > 0 {
                info!(
                    "Sweep cycle: {} overdue, {} escalated, {} conflicts, {} failures",
                    stats.scanned, stats.escalated, stats.conflicts, stats.failures
                );
            } else {
                debug!("Sweep cycle: nothing overdue");
            }
        }
    })
}

/// Run a single sweep cycle against `now`.
///
/// Escalations run on the blocking pool with a bounded per-case timeout.
/// The store write is a single compare-and-swap, so a case abandoned on
/// timeout has either committed fully or not at all; either way the next
/// cycle re-reads and decides again.
pub async fn sweep_once(
    service: &Arc<WorkflowService>,
    case_timeout_ms: u64,
    now: DateTime<Utc>,
) -> SweepStats {
    let mut stats = SweepStats::default();

    let overdue = match service.overdue_cases(now) {
        Ok(cases) => cases,
        Err(e) => {
            warn!("Sweep could not query overdue cases: {}", e);
            stats.failures += 1;
            return stats;
        }
    };
    stats.scanned = overdue.len();

    for case in overdue {
        let rma_number = case.rma_number.clone();
        let svc = Arc::clone(service);
        let task = tokio::task::spawn_blocking(move || svc.escalate_case(&case, now));

        match tokio::time::timeout(Duration::from_millis(case_timeout_ms), task).await {
            Ok(Ok(Ok(updated))) => {
                stats.escalated += 1;
                debug!(
                    "Sweep escalated {} to {} (deadline {})",
                    updated.rma_number, updated.priority, updated.deadline_at
                );
            }
            Ok(Ok(Err(WorkflowError::Conflict { .. }))) => {
                stats.conflicts += 1;
                debug!("Sweep lost the write race on {}, retrying next cycle", rma_number);
            }
            Ok(Ok(Err(e))) => {
                stats.failures += 1;
                warn!("Sweep could not escalate {}: {}", rma_number, e);
            }
            Ok(Err(e)) => {
                stats.failures += 1;
                warn!("Sweep task for {} failed: {}", rma_number, e);
            }
            Err(_) => {
                stats.failures += 1;
                warn!("Sweep abandoned {} after {}ms", rma_number, case_timeout_ms);
            }
        }
    }

    stats
}
