//! HTTP wire types for rmad communication.
//!
//! Request bodies carry the caller's `version` (the version of the case as
//! they last read it) so the engine can refuse stale writes. Responses are
//! either the full case, a summary list, or an [`ErrorBody`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::case::{CasePriority, CommentCategory, RmaCase, RmaStage};

/// Vendor decision on a submitted case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// Body for POST /cases/{id}/cds-submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub version: u64,
    pub reference_number: String,
    pub submitted_by: String,
}

/// Body for POST /cases/{id}/cds-approval. A rejection must carry `reason`;
/// `cds_case_id` and `notes` only apply to approvals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub version: u64,
    pub decision: ApprovalDecision,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Body for POST /cases/{id}/shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub version: u64,
    pub tracking_number: String,
    pub carrier: String,
    /// Carrier ship date; defaults to the time of the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
}

/// Body for POST /cases/{id}/replacement-receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRequest {
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

/// Body for POST /cases/{id}/return
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub version: u64,
    pub tracking_number: String,
    pub carrier: String,
    pub initiated_by: String,
}

/// Body for POST /cases/{id}/return-confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnConfirmationRequest {
    pub version: u64,
    pub confirmed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Body for POST /cases/{id}/complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub version: u64,
    pub completed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Body for POST /cases/{id}/comments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub version: u64,
    pub author: String,
    pub body: String,
    #[serde(default)]
    pub category: CommentCategory,
    #[serde(default)]
    pub internal: bool,
}

/// Body for POST /cases/{id}/assign. Omitting `assignee` re-runs the
/// assignment rules instead of pinning a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub actor: String,
}

/// Query parameters for GET /cases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<RmaStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overdue: Option<bool>,
}

impl CaseFilter {
    pub fn matches(&self, case: &RmaCase, now: DateTime<Utc>) -> bool {
        if let Some(stage) = self.stage {
            if case.stage != stage {
                return false;
            }
        }
        if let Some(assigned_to) = &self.assigned_to {
            if case.assigned_to.as_deref() != Some(assigned_to.as_str()) {
                return false;
            }
        }
        if let Some(overdue) = self.overdue {
            if case.is_overdue(now) != overdue {
                return false;
            }
        }
        true
    }
}

/// One row in a case listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: String,
    pub rma_number: String,
    pub stage: RmaStage,
    pub priority: CasePriority,
    pub site: String,
    pub product: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
    /// True when the SLA window has already closed
    pub overdue: bool,
    pub version: u64,
}

impl CaseSummary {
    pub fn from_case(case: &RmaCase, now: DateTime<Utc>) -> Self {
        Self {
            case_id: case.case_id.clone(),
            rma_number: case.rma_number.clone(),
            stage: case.stage,
            priority: case.priority,
            site: case.site.clone(),
            product: case.product.clone(),
            region: case.region.clone(),
            assigned_to: case.assigned_to.clone(),
            created_at: case.created_at,
            deadline_at: case.deadline_at,
            overdue: case.is_overdue(now),
            version: case.version,
        }
    }
}

/// Response for GET /cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCasesResponse {
    pub total: usize,
    pub cases: Vec<CaseSummary>,
}

/// Error payload returned with any non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable kind ("validation", "conflict", ...)
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Response for GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

impl HealthResponse {
    pub fn ok(version: &str, uptime_seconds: u64) -> Self {
        Self {
            status: "ok".to_string(),
            version: version.to_string(),
            uptime_seconds,
        }
    }
}
