//! Case model v0.6.0 - the central RMA record
//!
//! A case tracks one defective-equipment return from intake to closure:
//!
//! 1. UnderReview - intake received, warranty and defect under review
//! 2. SentToCDS - submitted to the vendor depot for approval
//! 3. CDSApproved - vendor approved a replacement
//! 4. ReplacementShipped - replacement unit on its way to the site
//! 5. ReplacementReceived - site confirmed receipt of the replacement
//! 6. FaultyPartReturned - faulty unit shipped back to the vendor
//! 7. CDSConfirmedReturn - vendor confirmed receipt of the faulty unit
//! 8. Completed - case closed
//!
//! `Rejected` is a side terminal reachable while the vendor still holds the
//! decision (UnderReview / SentToCDS). Terminal cases accept comments only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author recorded on engine-generated audit comments
pub const SYSTEM_AUTHOR: &str = "system";

// ============================================================================
// Stage Enum
// ============================================================================

/// Workflow stage of an RMA case
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmaStage {
    /// Intake received, case under initial review
    UnderReview,
    /// Submitted to CDS, awaiting vendor decision
    SentToCds,
    /// CDS approved the replacement
    CdsApproved,
    /// Replacement unit shipped to the site
    ReplacementShipped,
    /// Site confirmed receipt of the replacement
    ReplacementReceived,
    /// Faulty unit shipped back to CDS
    FaultyPartReturned,
    /// CDS confirmed receipt of the faulty unit
    CdsConfirmedReturn,
    /// Case closed successfully (terminal)
    Completed,
    /// Case rejected by CDS or during review (terminal)
    Rejected,
}

impl RmaStage {
    /// The next stage in the forward flow, None for terminals
    pub fn next(&self) -> Option<RmaStage> {
        match self {
            RmaStage::UnderReview => Some(RmaStage::SentToCds),
            RmaStage::SentToCds => Some(RmaStage::CdsApproved),
            RmaStage::CdsApproved => Some(RmaStage::ReplacementShipped),
            RmaStage::ReplacementShipped => Some(RmaStage::ReplacementReceived),
            RmaStage::ReplacementReceived => Some(RmaStage::FaultyPartReturned),
            RmaStage::FaultyPartReturned => Some(RmaStage::CdsConfirmedReturn),
            RmaStage::CdsConfirmedReturn => Some(RmaStage::Completed),
            RmaStage::Completed | RmaStage::Rejected => None,
        }
    }

    /// Is this a terminal stage?
    pub fn is_terminal(&self) -> bool {
        matches!(self, RmaStage::Completed | RmaStage::Rejected)
    }

    /// Can the case be rejected from this stage?
    pub fn can_reject(&self) -> bool {
        matches!(self, RmaStage::UnderReview | RmaStage::SentToCds)
    }

    /// Stable token used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            RmaStage::UnderReview => "under_review",
            RmaStage::SentToCds => "sent_to_cds",
            RmaStage::CdsApproved => "cds_approved",
            RmaStage::ReplacementShipped => "replacement_shipped",
            RmaStage::ReplacementReceived => "replacement_received",
            RmaStage::FaultyPartReturned => "faulty_part_returned",
            RmaStage::CdsConfirmedReturn => "cds_confirmed_return",
            RmaStage::Completed => "completed",
            RmaStage::Rejected => "rejected",
        }
    }

    /// Parse the storage token back into a stage
    pub fn parse(s: &str) -> Option<RmaStage> {
        match s {
            "under_review" => Some(RmaStage::UnderReview),
            "sent_to_cds" => Some(RmaStage::SentToCds),
            "cds_approved" => Some(RmaStage::CdsApproved),
            "replacement_shipped" => Some(RmaStage::ReplacementShipped),
            "replacement_received" => Some(RmaStage::ReplacementReceived),
            "faulty_part_returned" => Some(RmaStage::FaultyPartReturned),
            "cds_confirmed_return" => Some(RmaStage::CdsConfirmedReturn),
            "completed" => Some(RmaStage::Completed),
            "rejected" => Some(RmaStage::Rejected),
            _ => None,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            RmaStage::UnderReview => "Under review",
            RmaStage::SentToCds => "Sent to CDS",
            RmaStage::CdsApproved => "CDS approved",
            RmaStage::ReplacementShipped => "Replacement shipped",
            RmaStage::ReplacementReceived => "Replacement received",
            RmaStage::FaultyPartReturned => "Faulty part returned",
            RmaStage::CdsConfirmedReturn => "CDS confirmed return",
            RmaStage::Completed => "Completed",
            RmaStage::Rejected => "Rejected",
        }
    }

    /// All stages in forward order, terminals last
    pub fn all() -> &'static [RmaStage] {
        &[
            RmaStage::UnderReview,
            RmaStage::SentToCds,
            RmaStage::CdsApproved,
            RmaStage::ReplacementShipped,
            RmaStage::ReplacementReceived,
            RmaStage::FaultyPartReturned,
            RmaStage::CdsConfirmedReturn,
            RmaStage::Completed,
            RmaStage::Rejected,
        ]
    }
}

impl std::fmt::Display for RmaStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Case priority, raised automatically by escalation, never lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl CasePriority {
    /// One level up; Critical stays Critical
    pub fn escalated(&self) -> CasePriority {
        match self {
            CasePriority::Low => CasePriority::Medium,
            CasePriority::Medium => CasePriority::High,
            CasePriority::High => CasePriority::Critical,
            CasePriority::Critical => CasePriority::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CasePriority::Low => "low",
            CasePriority::Medium => "medium",
            CasePriority::High => "high",
            CasePriority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<CasePriority> {
        match s {
            "low" => Some(CasePriority::Low),
            "medium" => Some(CasePriority::Medium),
            "high" => Some(CasePriority::High),
            "critical" => Some(CasePriority::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for CasePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Warranty status captured at intake, informational and immutable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WarrantyStatus {
    InWarranty,
    OutOfWarranty,
    #[default]
    Unknown,
}

impl WarrantyStatus {
    /// Accepts both the storage token and the hyphenated human form
    pub fn parse(s: &str) -> Option<WarrantyStatus> {
        match s {
            "in_warranty" | "in-warranty" => Some(WarrantyStatus::InWarranty),
            "out_of_warranty" | "out-of-warranty" => Some(WarrantyStatus::OutOfWarranty),
            "unknown" => Some(WarrantyStatus::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for WarrantyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarrantyStatus::InWarranty => write!(f, "in-warranty"),
            WarrantyStatus::OutOfWarranty => write!(f, "out-of-warranty"),
            WarrantyStatus::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Stage Sub-Records
// ============================================================================

/// Vendor submission details, set when the case leaves UnderReview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdsSubmission {
    pub reference_number: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

/// Vendor approval details, set when the case enters CdsApproved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdsApproval {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    /// Case id on the vendor's side, when they supply one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Replacement shipment to the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundShipment {
    pub tracking_number: String,
    pub carrier: String,
    pub shipped_at: DateTime<Utc>,
    /// Set when the site confirms receipt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Faulty-part shipment back to the vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnShipment {
    pub tracking_number: String,
    pub carrier: String,
    pub initiated_by: String,
    pub initiated_at: DateTime<Utc>,
    /// Set when CDS confirms delivery of the faulty unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
}

/// Closure details, set when the case enters Completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completed_by: String,
    pub completed_at: DateTime<Utc>,
    /// Whole days between intake and completion
    pub total_days: i64,
}

// ============================================================================
// Comments / Audit Trail
// ============================================================================

/// Category of a case comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommentCategory {
    #[default]
    General,
    /// Engine-authored record of a stage change
    StatusChange,
    /// Engine-authored record of an SLA escalation
    Escalation,
    /// Ownership change, manual or rule-driven
    Assignment,
    /// Carrier and tracking updates
    Shipping,
}

impl CommentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentCategory::General => "general",
            CommentCategory::StatusChange => "status_change",
            CommentCategory::Escalation => "escalation",
            CommentCategory::Assignment => "assignment",
            CommentCategory::Shipping => "shipping",
        }
    }
}

/// One entry in the append-only case log. Never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseComment {
    pub author: String,
    pub body: String,
    #[serde(default)]
    pub category: CommentCategory,
    /// Internal comments are hidden from end-customer views by the caller
    #[serde(default)]
    pub is_internal: bool,
    pub timestamp: DateTime<Utc>,
}

impl CaseComment {
    /// Engine-authored audit entry
    pub fn system(body: impl Into<String>, category: CommentCategory, at: DateTime<Utc>) -> Self {
        Self {
            author: SYSTEM_AUTHOR.to_string(),
            body: body.into(),
            category,
            is_internal: true,
            timestamp: at,
        }
    }
}

// ============================================================================
// Intake
// ============================================================================

/// Minimal intake event handed to the engine by the upstream producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseIntake {
    pub site: String,
    pub product: String,
    /// Product category used for assignment rules (e.g. "projector", "lamp")
    pub product_category: String,
    /// Site region used for assignment rules (e.g. "emea", "apac")
    pub region: String,
    #[serde(default)]
    pub warranty_status: WarrantyStatus,
    pub reported_by: String,
    /// Short defect description
    pub summary: String,
    /// Optional initial priority, Medium when absent
    #[serde(default)]
    pub priority: Option<CasePriority>,
}

// ============================================================================
// Case Record
// ============================================================================

/// The central RMA case record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmaCase {
    /// Immutable unique id
    pub case_id: String,
    /// Human-facing RMA number, immutable once assigned
    pub rma_number: String,

    pub stage: RmaStage,
    pub priority: CasePriority,
    pub warranty_status: WarrantyStatus,

    pub site: String,
    pub product: String,
    pub product_category: String,
    pub region: String,
    pub summary: String,

    /// Current owner; None means unassigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// True when the owner was set by an operator rather than the rules;
    /// escalation overrides it, ordinary auto-assignment does not
    #[serde(default)]
    pub manual_assignment: bool,

    pub created_by: String,
    pub created_at: DateTime<Utc>,

    /// When the case entered its current stage. Reset on forward
    /// transitions, untouched by escalation.
    pub stage_entered_at: DateTime<Utc>,
    /// stage_entered_at + SLA(stage, priority), recomputed with either input
    pub deadline_at: DateTime<Utc>,
    /// Breach escalations so far; at most one per stage per version
    pub escalation_count: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_submission: Option<CdsSubmission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds_approval: Option<CdsApproval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_shipment: Option<OutboundShipment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_shipment: Option<ReturnShipment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionRecord>,

    /// Append-only log of human and system entries
    pub comments: Vec<CaseComment>,

    /// Monotonic stamp for optimistic concurrency; bumped by every
    /// committed write
    pub version: u64,
}

impl RmaCase {
    /// Build the human-facing RMA number from the intake year and case id
    pub fn rma_number_for(case_id: &str, created_at: DateTime<Utc>) -> String {
        use chrono::Datelike;
        let short: String = case_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect::<String>()
            .to_uppercase();
        format!("RMA-{}-{}", created_at.year(), short)
    }

    /// Generate a fresh case id
    pub fn new_case_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Terminal cases accept comments only
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Breached when the stage deadline has passed on a non-terminal case
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && now > self.deadline_at
    }

    /// Append an entry to the case log
    pub fn push_comment(&mut self, comment: CaseComment) {
        self.comments.push(comment);
    }

    /// Count of engine-authored audit entries
    pub fn system_comment_count(&self) -> usize {
        self.comments.iter().filter(|c| c.author == SYSTEM_AUTHOR).count()
    }
}

// ============================================================================
// Tests
// ============================================================================
