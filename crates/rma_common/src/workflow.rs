//! Workflow core v0.6.0 - pure stage transitions for RMA cases
//!
//! Every operation takes the case as it was read, validates, and returns a
//! fully updated copy or a typed failure. No I/O here: the caller persists
//! the result with a compare-and-swap on `version` and dispatches
//! notifications only after the write commits.
//!
//! Transition map:
//!
//! ```text
//! UnderReview -> SentToCds -> CdsApproved -> ReplacementShipped
//!   -> ReplacementReceived -> FaultyPartReturned -> CdsConfirmedReturn
//!   -> Completed
//! UnderReview / SentToCds -> Rejected
//! ```
//!
//! Escalation never changes the stage: it raises priority one level,
//! re-resolves ownership through the rules, and opens a fresh SLA window
//! from the breach detection time.

use chrono::{DateTime, Duration, Utc};

use crate::case::{
    CaseComment, CaseIntake, CasePriority, CdsApproval, CdsSubmission, CommentCategory,
    CompletionRecord, OutboundShipment, ReturnShipment, RmaCase, RmaStage,
};
use crate::error::WorkflowError;
use crate::rules::WorkflowRules;

/// Deadline for a stage entered at `entered_at` under `priority`
pub fn deadline_for(
    stage: RmaStage,
    priority: CasePriority,
    entered_at: DateTime<Utc>,
    rules: &WorkflowRules,
) -> DateTime<Utc> {
    entered_at + Duration::hours(i64::from(rules.sla_hours(stage, priority)))
}

/// Trimmed non-empty value or a validation failure naming the field
fn required(value: &str, field: &'static str) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::required(field));
    }
    Ok(trimmed.to_string())
}

/// Stage guard shared by every forward transition
fn expect_stage(
    case: &RmaCase,
    expected: RmaStage,
    action: &'static str,
) -> Result<(), WorkflowError> {
    if case.stage != expected {
        return Err(WorkflowError::InvalidTransition { stage: case.stage, action });
    }
    Ok(())
}

/// Move a case to `to`: stamp the stage clock, recompute the deadline, and
/// append the audit entry. Callers set sub-records before advancing.
fn advance(case: &mut RmaCase, to: RmaStage, rules: &WorkflowRules, now: DateTime<Utc>) {
    let from = case.stage;
    case.stage = to;
    case.stage_entered_at = now;
    case.deadline_at = deadline_for(to, case.priority, now, rules);
    case.push_comment(CaseComment::system(
        format!("Stage changed: {} -> {}", from, to),
        CommentCategory::StatusChange,
        now,
    ));
}

fn attach_note(case: &mut RmaCase, author: &str, body: String, now: DateTime<Utc>) {
    case.push_comment(CaseComment {
        author: author.to_string(),
        body,
        category: CommentCategory::General,
        is_internal: false,
        timestamp: now,
    });
}

// ============================================================================
// Intake
// ============================================================================

/// Open a new case from the upstream intake event. Assigns an owner through
/// the rules, stamps the first SLA window, and writes the opening audit
/// entry.
pub fn open_case(
    intake: &CaseIntake,
    rules: &WorkflowRules,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    let site = required(&intake.site, "site")?;
    let product = required(&intake.product, "product")?;
    let product_category = required(&intake.product_category, "product_category")?;
    let region = required(&intake.region, "region")?;
    let reported_by = required(&intake.reported_by, "reported_by")?;
    let summary = required(&intake.summary, "summary")?;

    let priority = intake.priority.unwrap_or_default();
    let case_id = RmaCase::new_case_id();
    let rma_number = RmaCase::rma_number_for(&case_id, now);
    let assigned_to = rules.resolve_or_default(&product_category, &region, priority);

    let mut case = RmaCase {
        case_id,
        rma_number,
        stage: RmaStage::UnderReview,
        priority,
        warranty_status: intake.warranty_status,
        site,
        product,
        product_category,
        region,
        summary,
        assigned_to: assigned_to.clone(),
        manual_assignment: false,
        created_by: reported_by,
        created_at: now,
        stage_entered_at: now,
        deadline_at: deadline_for(RmaStage::UnderReview, priority, now, rules),
        escalation_count: 0,
        cds_submission: None,
        cds_approval: None,
        outbound_shipment: None,
        return_shipment: None,
        completion: None,
        comments: Vec::new(),
        version: 1,
    };

    let owner = assigned_to.unwrap_or_else(|| "unassigned".to_string());
    case.push_comment(CaseComment::system(
        format!(
            "Case opened as {} ({} priority), owner: {}",
            case.rma_number, case.priority, owner
        ),
        CommentCategory::StatusChange,
        now,
    ));

    Ok(case)
}

// ============================================================================
// Forward Transitions
// ============================================================================

/// UnderReview -> SentToCds. Records the vendor submission reference.
pub fn submit_to_cds(
    case: &RmaCase,
    rules: &WorkflowRules,
    reference_number: &str,
    submitted_by: &str,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::UnderReview, "submit_to_cds")?;
    let reference_number = required(reference_number, "reference_number")?;
    let submitted_by = required(submitted_by, "submitted_by")?;

    let mut updated = case.clone();
    updated.cds_submission = Some(CdsSubmission {
        reference_number,
        submitted_by,
        submitted_at: now,
    });
    advance(&mut updated, RmaStage::SentToCds, rules, now);
    Ok(updated)
}

/// SentToCds -> CdsApproved. Records who approved and the vendor's own case
/// id when they supplied one.
pub fn record_cds_approval(
    case: &RmaCase,
    rules: &WorkflowRules,
    approved_by: &str,
    cds_case_id: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::SentToCds, "record_cds_approval")?;
    let approved_by = required(approved_by, "approved_by")?;
    if case.cds_submission.is_none() {
        return Err(WorkflowError::Validation(
            "cannot approve a case that was never submitted".to_string(),
        ));
    }

    let mut updated = case.clone();
    updated.cds_approval = Some(CdsApproval {
        approved_by: approved_by.clone(),
        approved_at: now,
        cds_case_id: cds_case_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        notes: notes.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    });
    advance(&mut updated, RmaStage::CdsApproved, rules, now);
    if let Some(note) = notes.map(str::trim).filter(|s| !s.is_empty()) {
        attach_note(&mut updated, &approved_by, note.to_string(), now);
    }
    Ok(updated)
}

/// Terminal rejection. Only reachable while the case is still under review
/// or waiting on the vendor; a reason is mandatory.
pub fn reject(
    case: &RmaCase,
    rules: &WorkflowRules,
    rejected_by: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    if !case.stage.can_reject() {
        return Err(WorkflowError::InvalidTransition { stage: case.stage, action: "reject" });
    }
    let rejected_by = required(rejected_by, "rejected_by")?;
    let reason = required(reason, "reason")?;

    let mut updated = case.clone();
    advance(&mut updated, RmaStage::Rejected, rules, now);
    updated.push_comment(CaseComment::system(
        format!("Rejected by {}: {}", rejected_by, reason),
        CommentCategory::StatusChange,
        now,
    ));
    Ok(updated)
}

/// CdsApproved -> ReplacementShipped. `shipped_at` is the physical ship
/// date from the carrier, which may trail the recording time.
pub fn record_shipment(
    case: &RmaCase,
    rules: &WorkflowRules,
    tracking_number: &str,
    carrier: &str,
    shipped_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::CdsApproved, "record_shipment")?;
    let tracking_number = required(tracking_number, "tracking_number")?;
    let carrier = required(carrier, "carrier")?;

    let mut updated = case.clone();
    updated.outbound_shipment = Some(OutboundShipment {
        tracking_number,
        carrier,
        shipped_at,
        delivered_at: None,
    });
    advance(&mut updated, RmaStage::ReplacementShipped, rules, now);
    Ok(updated)
}

/// ReplacementShipped -> ReplacementReceived. The site confirms the
/// replacement arrived; `received_at` defaults to the confirmation time.
pub fn confirm_replacement_receipt(
    case: &RmaCase,
    rules: &WorkflowRules,
    received_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::ReplacementShipped, "confirm_replacement_receipt")?;
    let received_at = received_at.unwrap_or(now);

    let mut updated = case.clone();
    match updated.outbound_shipment.as_mut() {
        Some(shipment) => shipment.delivered_at = Some(received_at),
        None => {
            return Err(WorkflowError::Validation(
                "no outbound shipment on record".to_string(),
            ))
        }
    }
    advance(&mut updated, RmaStage::ReplacementReceived, rules, now);
    Ok(updated)
}

/// ReplacementReceived -> FaultyPartReturned. The faulty unit goes back to
/// the vendor under its own tracking number.
pub fn initiate_return(
    case: &RmaCase,
    rules: &WorkflowRules,
    tracking_number: &str,
    carrier: &str,
    initiated_by: &str,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::ReplacementReceived, "initiate_return")?;
    let tracking_number = required(tracking_number, "tracking_number")?;
    let carrier = required(carrier, "carrier")?;
    let initiated_by = required(initiated_by, "initiated_by")?;

    let mut updated = case.clone();
    updated.return_shipment = Some(ReturnShipment {
        tracking_number,
        carrier,
        initiated_by,
        initiated_at: now,
        delivery_confirmed_at: None,
        confirmed_by: None,
    });
    advance(&mut updated, RmaStage::FaultyPartReturned, rules, now);
    Ok(updated)
}

/// FaultyPartReturned -> CdsConfirmedReturn. The vendor acknowledges the
/// faulty unit arrived.
pub fn confirm_return_delivery(
    case: &RmaCase,
    rules: &WorkflowRules,
    confirmed_by: &str,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::FaultyPartReturned, "confirm_return_delivery")?;
    let confirmed_by = required(confirmed_by, "confirmed_by")?;

    let mut updated = case.clone();
    match updated.return_shipment.as_mut() {
        Some(shipment) => {
            shipment.delivery_confirmed_at = Some(now);
            shipment.confirmed_by = Some(confirmed_by.clone());
        }
        None => {
            return Err(WorkflowError::Validation(
                "no return shipment on record".to_string(),
            ))
        }
    }
    advance(&mut updated, RmaStage::CdsConfirmedReturn, rules, now);
    if let Some(note) = notes.map(str::trim).filter(|s| !s.is_empty()) {
        attach_note(&mut updated, &confirmed_by, note.to_string(), now);
    }
    Ok(updated)
}

/// CdsConfirmedReturn -> Completed. Requires the full paper trail: vendor
/// submission, approval, outbound shipment, and a confirmed return.
pub fn complete(
    case: &RmaCase,
    rules: &WorkflowRules,
    completed_by: &str,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    expect_stage(case, RmaStage::CdsConfirmedReturn, "complete")?;
    let completed_by = required(completed_by, "completed_by")?;

    if case.cds_submission.is_none() || case.cds_approval.is_none() {
        return Err(WorkflowError::Validation(
            "vendor submission and approval records are required to complete".to_string(),
        ));
    }
    if case.outbound_shipment.is_none() {
        return Err(WorkflowError::Validation(
            "outbound shipment record is required to complete".to_string(),
        ));
    }
    let return_confirmed = case
        .return_shipment
        .as_ref()
        .map(|r| r.delivery_confirmed_at.is_some())
        .unwrap_or(false);
    if !return_confirmed {
        return Err(WorkflowError::Validation(
            "return delivery must be confirmed before completion".to_string(),
        ));
    }

    let mut updated = case.clone();
    updated.completion = Some(CompletionRecord {
        completed_by: completed_by.clone(),
        completed_at: now,
        total_days: (now - case.created_at).num_days(),
    });
    advance(&mut updated, RmaStage::Completed, rules, now);
    if let Some(note) = notes.map(str::trim).filter(|s| !s.is_empty()) {
        attach_note(&mut updated, &completed_by, note.to_string(), now);
    }
    Ok(updated)
}

// ============================================================================
// Escalation
// ============================================================================

/// Raise an overdue case one priority level and hand it to the escalation
/// owner from the rules. The stage and its entry time are untouched; a new
/// SLA window opens from the detection time so one breach escalates exactly
/// once.
pub fn escalate(
    case: &RmaCase,
    rules: &WorkflowRules,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    if case.is_terminal() {
        return Err(WorkflowError::InvalidTransition { stage: case.stage, action: "escalate" });
    }
    if !case.is_overdue(now) {
        return Err(WorkflowError::Validation(format!(
            "deadline {} has not passed",
            case.deadline_at.to_rfc3339()
        )));
    }

    let from_priority = case.priority;
    let to_priority = from_priority.escalated();

    let mut updated = case.clone();
    updated.priority = to_priority;
    updated.escalation_count += 1;
    updated.deadline_at = deadline_for(case.stage, to_priority, now, rules);

    // Escalation ownership beats any manual pick; keep the current owner
    // only when the rules name nobody at all.
    if let Some(owner) =
        rules.resolve_or_default(&case.product_category, &case.region, to_priority)
    {
        updated.assigned_to = Some(owner);
        updated.manual_assignment = false;
    }

    let owner = updated.assigned_to.clone().unwrap_or_else(|| "unassigned".to_string());
    updated.push_comment(CaseComment::system(
        format!(
            "SLA breached in {}: priority {} -> {}, owner: {}",
            case.stage, from_priority, to_priority, owner
        ),
        CommentCategory::Escalation,
        now,
    ));
    Ok(updated)
}

// ============================================================================
// Assignment and Comments
// ============================================================================

/// Set or recompute the case owner. `Some(name)` pins the case to that
/// person until an escalation overrides it; `None` re-runs the rules, which
/// never displace a manual pick.
pub fn assign(
    case: &RmaCase,
    rules: &WorkflowRules,
    assignee: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    if case.is_terminal() {
        return Err(WorkflowError::InvalidTransition { stage: case.stage, action: "assign" });
    }
    let actor = required(actor, "actor")?;

    let mut updated = case.clone();
    match assignee {
        Some(name) => {
            let name = required(name, "assignee")?;
            updated.assigned_to = Some(name.clone());
            updated.manual_assignment = true;
            updated.push_comment(CaseComment::system(
                format!("Assigned to {} by {}", name, actor),
                CommentCategory::Assignment,
                now,
            ));
        }
        None if case.manual_assignment && case.assigned_to.is_some() => {
            let kept = case.assigned_to.clone().unwrap_or_default();
            updated.push_comment(CaseComment::system(
                format!("Reassignment requested by {}; manual owner {} kept", actor, kept),
                CommentCategory::Assignment,
                now,
            ));
        }
        None => {
            let resolved =
                rules.resolve_or_default(&case.product_category, &case.region, case.priority);
            let label = resolved.clone().unwrap_or_else(|| "unassigned".to_string());
            updated.assigned_to = resolved;
            updated.manual_assignment = false;
            updated.push_comment(CaseComment::system(
                format!("Owner recomputed by {}: {}", actor, label),
                CommentCategory::Assignment,
                now,
            ));
        }
    }
    Ok(updated)
}

/// Append a comment. Valid in every stage, including terminal ones, since
/// the audit trail stays writable after the workflow ends.
pub fn add_comment(
    case: &RmaCase,
    author: &str,
    body: &str,
    category: CommentCategory,
    is_internal: bool,
    now: DateTime<Utc>,
) -> Result<RmaCase, WorkflowError> {
    let author = required(author, "author")?;
    let body = required(body, "body")?;

    let mut updated = case.clone();
    updated.push_comment(CaseComment {
        author,
        body,
        category,
        is_internal,
        timestamp: now,
    });
    Ok(updated)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::WarrantyStatus;
    use crate::rules::AssignmentRule;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn hours(n: i64) -> Duration {
        Duration::hours(n)
    }

    fn intake() -> CaseIntake {
        CaseIntake {
            site: "lab-berlin".to_string(),
            product: "OCT Scanner Mk3".to_string(),
            product_category: "imaging".to_string(),
            region: "emea".to_string(),
            warranty_status: WarrantyStatus::InWarranty,
            reported_by: "j.fischer".to_string(),
            summary: "Scanner head fails self-test on boot".to_string(),
            priority: None,
        }
    }

    fn rules() -> WorkflowRules {
        let mut rules = WorkflowRules::default();
        rules.assignment = vec![
            AssignmentRule {
                product_category: Some("imaging".to_string()),
                region: Some("emea".to_string()),
                assignee: "a.weber".to_string(),
                escalation_assignee: Some("senior.weber".to_string()),
            },
            AssignmentRule {
                product_category: Some("imaging".to_string()),
                region: None,
                assignee: "b.patel".to_string(),
                escalation_assignee: None,
            },
        ];
        rules.default_assignee = Some("triage".to_string());
        rules
    }

    fn opened() -> RmaCase {
        open_case(&intake(), &rules(), t0()).unwrap()
    }

    /// Walk a case through every forward stage, checking the clock math at
    /// each hop.
    #[test]
    fn full_lifecycle_reaches_completed() {
        let rules = rules();
        let mut now = t0();
        let case = opened();
        assert_eq!(case.stage, RmaStage::UnderReview);
        assert_eq!(case.assigned_to.as_deref(), Some("a.weber"));
        assert_eq!(case.deadline_at, now + hours(48));

        now = now + hours(4);
        let case = submit_to_cds(&case, &rules, "CDS-9912", "a.weber", now).unwrap();
        assert_eq!(case.stage, RmaStage::SentToCds);
        assert_eq!(case.stage_entered_at, now);
        assert_eq!(case.deadline_at, now + hours(72));
        assert_eq!(case.cds_submission.as_ref().unwrap().reference_number, "CDS-9912");

        now = now + hours(20);
        let case =
            record_cds_approval(&case, &rules, "cds.desk", Some("CDS-CASE-77"), None, now).unwrap();
        assert_eq!(case.stage, RmaStage::CdsApproved);
        assert_eq!(case.cds_approval.as_ref().unwrap().cds_case_id.as_deref(), Some("CDS-CASE-77"));

        now = now + hours(10);
        let shipped_at = now - hours(2);
        let case = record_shipment(&case, &rules, "1Z999AA1", "ups", shipped_at, now).unwrap();
        assert_eq!(case.stage, RmaStage::ReplacementShipped);
        assert_eq!(case.outbound_shipment.as_ref().unwrap().shipped_at, shipped_at);
        assert!(case.outbound_shipment.as_ref().unwrap().delivered_at.is_none());

        now = now + hours(30);
        let case = confirm_replacement_receipt(&case, &rules, None, now).unwrap();
        assert_eq!(case.stage, RmaStage::ReplacementReceived);
        assert_eq!(case.outbound_shipment.as_ref().unwrap().delivered_at, Some(now));

        now = now + hours(6);
        let case = initiate_return(&case, &rules, "RT-5521", "dhl", "j.fischer", now).unwrap();
        assert_eq!(case.stage, RmaStage::FaultyPartReturned);

        now = now + hours(48);
        let case = confirm_return_delivery(&case, &rules, "cds.desk", None, now).unwrap();
        assert_eq!(case.stage, RmaStage::CdsConfirmedReturn);
        assert_eq!(
            case.return_shipment.as_ref().unwrap().delivery_confirmed_at,
            Some(now)
        );

        now = now + hours(2);
        let case = complete(&case, &rules, "a.weber", Some("replacement verified"), now).unwrap();
        assert_eq!(case.stage, RmaStage::Completed);
        assert!(case.is_terminal());
        let completion = case.completion.as_ref().unwrap();
        assert_eq!(completion.completed_by, "a.weber");
        assert_eq!(completion.total_days, 5);
    }

    /// Each forward transition leaves an audit entry, so a full walk has
    /// one opening entry plus one per hop, plus the completion note.
    #[test]
    fn every_transition_is_audited() {
        let rules = rules();
        let now = t0();
        let case = opened();
        let case = submit_to_cds(&case, &rules, "CDS-1", "a.weber", now).unwrap();
        let case = record_cds_approval(&case, &rules, "cds.desk", None, None, now).unwrap();
        let case = record_shipment(&case, &rules, "TRK", "ups", now, now).unwrap();
        let case = confirm_replacement_receipt(&case, &rules, None, now).unwrap();
        let case = initiate_return(&case, &rules, "RT", "dhl", "j.fischer", now).unwrap();
        let case = confirm_return_delivery(&case, &rules, "cds.desk", None, now).unwrap();
        let case = complete(&case, &rules, "a.weber", None, now).unwrap();

        assert_eq!(case.system_comment_count(), 8);
        let status_changes = case
            .comments
            .iter()
            .filter(|c| c.category == CommentCategory::StatusChange)
            .count();
        assert_eq!(status_changes, 8);
    }

    #[test]
    fn deadline_tracks_stage_entry_after_forward_transitions() {
        let rules = rules();
        let now = t0() + hours(7);
        let case = submit_to_cds(&opened(), &rules, "CDS-1", "a.weber", now).unwrap();
        assert_eq!(
            case.deadline_at,
            deadline_for(case.stage, case.priority, case.stage_entered_at, &rules)
        );
    }

    #[test]
    fn invalid_transition_leaves_case_untouched() {
        let rules = rules();
        let case = opened();
        let before = case.clone();

        let err = record_shipment(&case, &rules, "TRK", "ups", t0(), t0()).unwrap_err();
        match err {
            WorkflowError::InvalidTransition { stage, action } => {
                assert_eq!(stage, RmaStage::UnderReview);
                assert_eq!(action, "record_shipment");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(case.comments.len(), before.comments.len());
        assert_eq!(case.stage, before.stage);
        assert_eq!(case.version, before.version);
    }

    #[test]
    fn validation_failures_name_the_field() {
        let rules = rules();
        let case = opened();
        let err = submit_to_cds(&case, &rules, "  ", "a.weber", t0()).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ref msg) if msg.contains("reference_number")));

        let mut blank = intake();
        blank.summary = "   ".to_string();
        let err = open_case(&blank, &rules, t0()).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ref msg) if msg.contains("summary")));
    }

    #[test]
    fn reject_allowed_only_before_approval() {
        let rules = rules();
        let now = t0();

        let case = opened();
        let rejected = reject(&case, &rules, "a.weber", "no fault found", now).unwrap();
        assert_eq!(rejected.stage, RmaStage::Rejected);
        assert!(rejected.is_terminal());

        let case = submit_to_cds(&opened(), &rules, "CDS-1", "a.weber", now).unwrap();
        let rejected = reject(&case, &rules, "cds.desk", "out of warranty", now).unwrap();
        assert_eq!(rejected.stage, RmaStage::Rejected);

        let case = record_cds_approval(&case, &rules, "cds.desk", None, None, now).unwrap();
        let err = reject(&case, &rules, "cds.desk", "too late", now).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn reject_requires_a_reason() {
        let rules = rules();
        let err = reject(&opened(), &rules, "a.weber", "", t0()).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ref msg) if msg.contains("reason")));
    }

    #[test]
    fn terminal_cases_refuse_everything_but_comments() {
        let rules = rules();
        let now = t0();
        let rejected = reject(&opened(), &rules, "a.weber", "duplicate case", now).unwrap();

        assert!(submit_to_cds(&rejected, &rules, "CDS-1", "x", now).is_err());
        assert!(escalate(&rejected, &rules, now + hours(500)).is_err());
        assert!(assign(&rejected, &rules, Some("b.patel"), "lead", now).is_err());

        let commented =
            add_comment(&rejected, "j.fischer", "site notified", CommentCategory::General, false, now)
                .unwrap();
        assert_eq!(commented.comments.len(), rejected.comments.len() + 1);
    }

    /// The scenario from the operations runbook: a medium case breaches its
    /// 48h review window, escalates once at detection, and the fresh window
    /// keeps the next sweep from firing again.
    #[test]
    fn escalation_fires_once_per_breach() {
        let rules = rules();
        let case = opened();
        assert_eq!(case.priority, CasePriority::Medium);
        assert_eq!(case.deadline_at, t0() + hours(48));

        let detected = t0() + hours(49);
        let case = escalate(&case, &rules, detected).unwrap();
        assert_eq!(case.priority, CasePriority::High);
        assert_eq!(case.escalation_count, 1);
        assert_eq!(case.stage, RmaStage::UnderReview);
        assert_eq!(case.stage_entered_at, t0());
        assert_eq!(case.deadline_at, detected + hours(24));
        assert_eq!(case.assigned_to.as_deref(), Some("senior.weber"));

        let err = escalate(&case, &rules, detected + hours(1)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn escalation_is_capped_at_critical_but_still_counted() {
        let rules = rules();
        let mut case = opened();
        case.priority = CasePriority::Critical;
        case.deadline_at = t0() + hours(8);

        let detected = t0() + hours(9);
        let case = escalate(&case, &rules, detected).unwrap();
        assert_eq!(case.priority, CasePriority::Critical);
        assert_eq!(case.escalation_count, 1);
        assert_eq!(case.deadline_at, detected + hours(8));
    }

    #[test]
    fn escalation_overrides_manual_assignment() {
        let rules = rules();
        let case = assign(&opened(), &rules, Some("intern.k"), "lead", t0()).unwrap();
        assert!(case.manual_assignment);

        let case = escalate(&case, &rules, t0() + hours(49)).unwrap();
        assert_eq!(case.assigned_to.as_deref(), Some("senior.weber"));
        assert!(!case.manual_assignment);
    }

    #[test]
    fn escalation_keeps_owner_when_rules_name_nobody() {
        let rules = WorkflowRules::default();
        let mut case = opened();
        case.assigned_to = Some("keeper".to_string());

        let case = escalate(&case, &rules, t0() + hours(49)).unwrap();
        assert_eq!(case.assigned_to.as_deref(), Some("keeper"));
    }

    #[test]
    fn escalation_before_deadline_is_refused() {
        let rules = rules();
        let err = escalate(&opened(), &rules, t0() + hours(47)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn auto_assign_never_displaces_a_manual_owner() {
        let rules = rules();
        let case = assign(&opened(), &rules, Some("intern.k"), "lead", t0()).unwrap();
        let case = assign(&case, &rules, None, "scheduler", t0()).unwrap();
        assert_eq!(case.assigned_to.as_deref(), Some("intern.k"));
        assert!(case.manual_assignment);
    }

    #[test]
    fn auto_assign_recomputes_rule_owners() {
        let rules = rules();
        let mut case = opened();
        case.region = "apac".to_string();

        let case = assign(&case, &rules, None, "scheduler", t0()).unwrap();
        assert_eq!(case.assigned_to.as_deref(), Some("b.patel"));
        assert!(!case.manual_assignment);
    }

    #[test]
    fn approval_requires_a_submission_record() {
        let rules = rules();
        let mut case = opened();
        case.stage = RmaStage::SentToCds;

        let err = record_cds_approval(&case, &rules, "cds.desk", None, None, t0()).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn completion_requires_confirmed_return() {
        let rules = rules();
        let now = t0();
        let case = opened();
        let case = submit_to_cds(&case, &rules, "CDS-1", "a.weber", now).unwrap();
        let case = record_cds_approval(&case, &rules, "cds.desk", None, None, now).unwrap();
        let case = record_shipment(&case, &rules, "TRK", "ups", now, now).unwrap();
        let case = confirm_replacement_receipt(&case, &rules, None, now).unwrap();
        let case = initiate_return(&case, &rules, "RT", "dhl", "j.fischer", now).unwrap();

        // Force the stage forward without the vendor's confirmation.
        let mut broken = case.clone();
        broken.stage = RmaStage::CdsConfirmedReturn;
        let err = complete(&broken, &rules, "a.weber", None, now).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ref msg) if msg.contains("return")));
    }

    #[test]
    fn intake_priority_is_honored() {
        let rules = rules();
        let mut high = intake();
        high.priority = Some(CasePriority::Critical);

        let case = open_case(&high, &rules, t0()).unwrap();
        assert_eq!(case.priority, CasePriority::Critical);
        assert_eq!(case.deadline_at, t0() + hours(8));
    }

    #[test]
    fn open_case_falls_back_to_default_assignee() {
        let mut rules = WorkflowRules::default();
        rules.default_assignee = Some("triage".to_string());

        let case = open_case(&intake(), &rules, t0()).unwrap();
        assert_eq!(case.assigned_to.as_deref(), Some("triage"));
        assert!(!case.manual_assignment);
    }
}
