//! Outbound notifications for workflow events.
//!
//! Delivery is fire-and-forget: the engine commits first, then hands the
//! event to [`dispatch`], which retries a bounded number of times on a
//! blocking worker and logs a warning when it gives up. A dead webhook
//! never blocks or fails a case operation.

use anyhow::{bail, Result};
use rma_common::{CasePriority, NotifierConfig, NotifierMode, RmaCase, RmaStage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One workflow event worth telling the outside world about
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    CaseOpened {
        case_id: String,
        rma_number: String,
        site: String,
        priority: CasePriority,
        assigned_to: Option<String>,
    },
    StageChanged {
        case_id: String,
        rma_number: String,
        from: RmaStage,
        to: RmaStage,
        assigned_to: Option<String>,
    },
    Escalated {
        case_id: String,
        rma_number: String,
        stage: RmaStage,
        priority: CasePriority,
        escalation_count: u32,
        assigned_to: Option<String>,
    },
    OwnerChanged {
        case_id: String,
        rma_number: String,
        assigned_to: Option<String>,
        manual: bool,
    },
}

impl WorkflowEvent {
    pub fn opened(case: &RmaCase) -> Self {
        Self::CaseOpened {
            case_id: case.case_id.clone(),
            rma_number: case.rma_number.clone(),
            site: case.site.clone(),
            priority: case.priority,
            assigned_to: case.assigned_to.clone(),
        }
    }

    pub fn stage_changed(case: &RmaCase, from: RmaStage) -> Self {
        Self::StageChanged {
            case_id: case.case_id.clone(),
            rma_number: case.rma_number.clone(),
            from,
            to: case.stage,
            assigned_to: case.assigned_to.clone(),
        }
    }

    pub fn escalated(case: &RmaCase) -> Self {
        Self::Escalated {
            case_id: case.case_id.clone(),
            rma_number: case.rma_number.clone(),
            stage: case.stage,
            priority: case.priority,
            escalation_count: case.escalation_count,
            assigned_to: case.assigned_to.clone(),
        }
    }

    pub fn owner_changed(case: &RmaCase) -> Self {
        Self::OwnerChanged {
            case_id: case.case_id.clone(),
            rma_number: case.rma_number.clone(),
            assigned_to: case.assigned_to.clone(),
            manual: case.manual_assignment,
        }
    }

    /// Stable event kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CaseOpened { .. } => "case_opened",
            Self::StageChanged { .. } => "stage_changed",
            Self::Escalated { .. } => "escalated",
            Self::OwnerChanged { .. } => "owner_changed",
        }
    }

    pub fn rma_number(&self) -> &str {
        match self {
            Self::CaseOpened { rma_number, .. }
            | Self::StageChanged { rma_number, .. }
            | Self::Escalated { rma_number, .. }
            | Self::OwnerChanged { rma_number, .. } => rma_number,
        }
    }

    /// One-line human rendering for log mode
    pub fn describe(&self) -> String {
        match self {
            Self::CaseOpened {
                rma_number,
                site,
                priority,
                assigned_to,
                ..
            } => format!(
                "{} opened at {} ({} priority, owner: {})",
                rma_number,
                site,
                priority,
                assigned_to.as_deref().unwrap_or("unassigned")
            ),
            Self::StageChanged {
                rma_number,
                from,
                to,
                ..
            } => format!("{}: {} -> {}", rma_number, from, to),
            Self::Escalated {
                rma_number,
                stage,
                priority,
                escalation_count,
                assigned_to,
                ..
            } => format!(
                "{} escalated in {} (priority {}, escalation #{}, owner: {})",
                rma_number,
                stage,
                priority,
                escalation_count,
                assigned_to.as_deref().unwrap_or("unassigned")
            ),
            Self::OwnerChanged {
                rma_number,
                assigned_to,
                manual,
                ..
            } => format!(
                "{} assigned to {}{}",
                rma_number,
                assigned_to.as_deref().unwrap_or("nobody"),
                if *manual { " (manual)" } else { "" }
            ),
        }
    }
}

// ============================================================================
// Notifier Backends
// ============================================================================

/// Delivery backend for workflow events
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &WorkflowEvent) -> Result<()>;
}

/// Writes each event as a structured log line
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &WorkflowEvent) -> Result<()> {
        info!("[notify] {}", event.describe());
        Ok(())
    }
}

/// POSTs each event as JSON to a configured URL
pub struct WebhookNotifier {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: &WorkflowEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

/// Build the notifier the config asks for
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    match config.mode {
        NotifierMode::Log => Ok(Arc::new(LogNotifier)),
        NotifierMode::Webhook => {
            let url = match &config.webhook_url {
                Some(url) => url,
                None => bail!("notifier mode is webhook but webhook_url is not set"),
            };
            let notifier = WebhookNotifier::new(url, config.effective_timeout_secs())?;
            Ok(Arc::new(notifier))
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Deliver an event off the request path. Retries with a short linear
/// backoff, then logs a warning and drops the event.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: WorkflowEvent, retry_limit: u32) {
    tokio::task::spawn_blocking(move || {
        let attempts = retry_limit.max(1);
        for attempt in 1..=attempts {
            match notifier.notify(&event) {
                Ok(()) => {
                    debug!("delivered {} for {}", event.kind(), event.rma_number());
                    return;
                }
                Err(e) => {
                    warn!(
                        "notify attempt {}/{} failed for {} ({}): {}",
                        attempt,
                        attempts,
                        event.kind(),
                        event.rma_number(),
                        e
                    );
                    if attempt < attempts {
                        std::thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                    }
                }
            }
        }
        warn!(
            "giving up on {} for {} after {} attempts",
            event.kind(),
            event.rma_number(),
            attempts
        );
    });
}
