//! End-to-end case lifecycle tests against the workflow service.
//!
//! Runs the full intake-to-completion walk plus the failure paths operators
//! actually hit: stale versions, disallowed transitions, rejection, and a
//! notifier that refuses to cooperate.

use anyhow::Result;
use rma_common::{
    ApprovalDecision, AssignmentRule, CaseFilter, CaseIntake, CasePriority, CommentRequest,
    CompletionRequest, DecisionRequest, ReceiptRequest, ReturnConfirmationRequest, ReturnRequest,
    RmaStage, ShipmentRequest, SubmissionRequest, WarrantyStatus, WorkflowError, WorkflowRules,
    SYSTEM_AUTHOR,
};
use rmad::engine::WorkflowService;
use rmad::notifier::{Notifier, WorkflowEvent};
use rmad::store::MemoryStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Notifier that records every event it is handed
#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &WorkflowEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.kind().to_string());
        Ok(())
    }
}

/// Notifier that always fails, for exercising the fire-and-forget contract
struct BrokenNotifier;

impl Notifier for BrokenNotifier {
    fn notify(&self, _event: &WorkflowEvent) -> Result<()> {
        anyhow::bail!("webhook endpoint is down")
    }
}

fn test_rules() -> WorkflowRules {
    WorkflowRules {
        assignment: vec![AssignmentRule {
            product_category: Some("imaging".to_string()),
            region: Some("emea".to_string()),
            assignee: "a.weber".to_string(),
            escalation_assignee: Some("senior.weber".to_string()),
        }],
        default_assignee: Some("dispatch.queue".to_string()),
        ..Default::default()
    }
}

fn test_intake() -> CaseIntake {
    CaseIntake {
        site: "lab-hamburg".to_string(),
        product: "Slit Lamp SL-9".to_string(),
        product_category: "imaging".to_string(),
        region: "emea".to_string(),
        warranty_status: WarrantyStatus::InWarranty,
        reported_by: "k.olsen".to_string(),
        summary: "Illumination arm does not lock".to_string(),
        priority: None,
    }
}

fn service_with(notifier: Arc<dyn Notifier>) -> WorkflowService {
    WorkflowService::new(Arc::new(MemoryStore::new()), test_rules(), notifier, 2)
}

/// Dispatch runs on the blocking pool; give recorded events a moment to land.
async fn recorded_events(recorder: &Arc<RecordingNotifier>, at_least: usize) -> Vec<String> {
    for _ in 0..100 {
        if recorder.events.lock().unwrap().len() >= at_least {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    recorder.events.lock().unwrap().clone()
}

// =============================================================================
// Full lifecycle
// =============================================================================

#[tokio::test]
async fn full_lifecycle_reaches_completed_with_full_audit_trail() {
    let service = service_with(Arc::new(RecordingNotifier::default()));

    let case = service.open_case(&test_intake()).unwrap();
    assert_eq!(case.stage, RmaStage::UnderReview);
    assert_eq!(case.priority, CasePriority::Medium);
    assert_eq!(case.assigned_to.as_deref(), Some("a.weber"));
    assert_eq!(case.version, 1);

    let case = service
        .submit(
            &case.case_id,
            &SubmissionRequest {
                version: case.version,
                reference_number: "CDS-2026-0815".to_string(),
                submitted_by: "a.weber".to_string(),
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::SentToCds);
    assert_eq!(case.cds_submission.as_ref().unwrap().reference_number, "CDS-2026-0815");

    let case = service
        .decide(
            &case.case_id,
            &DecisionRequest {
                version: case.version,
                decision: ApprovalDecision::Approved,
                actor: "cds.gateway".to_string(),
                cds_case_id: Some("CDS-77123".to_string()),
                notes: None,
                reason: None,
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::CdsApproved);

    let case = service
        .ship(
            &case.case_id,
            &ShipmentRequest {
                version: case.version,
                tracking_number: "1Z999AA10123456784".to_string(),
                carrier: "UPS".to_string(),
                shipped_at: None,
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::ReplacementShipped);

    let case = service
        .receive(
            &case.case_id,
            &ReceiptRequest {
                version: case.version,
                received_at: None,
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::ReplacementReceived);
    assert!(case.outbound_shipment.as_ref().unwrap().delivered_at.is_some());

    let case = service
        .start_return(
            &case.case_id,
            &ReturnRequest {
                version: case.version,
                tracking_number: "RET-556677".to_string(),
                carrier: "DHL".to_string(),
                initiated_by: "a.weber".to_string(),
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::FaultyPartReturned);

    let case = service
        .confirm_return(
            &case.case_id,
            &ReturnConfirmationRequest {
                version: case.version,
                confirmed_by: "cds.gateway".to_string(),
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::CdsConfirmedReturn);

    let case = service
        .complete(
            &case.case_id,
            &CompletionRequest {
                version: case.version,
                completed_by: "a.weber".to_string(),
                notes: Some("replacement verified on site".to_string()),
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::Completed);
    assert!(case.is_terminal());
    assert_eq!(case.version, 8);

    let completion = case.completion.as_ref().unwrap();
    assert_eq!(completion.completed_by, "a.weber");
    assert!(completion.total_days >= 0);

    // One system audit entry for intake plus one per transition.
    assert_eq!(case.system_comment_count(), 8);
    for comment in case.comments.iter().filter(|c| c.author == SYSTEM_AUTHOR) {
        assert!(comment.is_internal);
    }
    // The human completion note rides alongside the audit trail.
    assert!(case.comments.iter().any(|c| c.author == "a.weber"));
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test]
async fn disallowed_transition_leaves_no_trace() {
    let service = service_with(Arc::new(RecordingNotifier::default()));
    let case = service.open_case(&test_intake()).unwrap();
    let audit_before = case.comments.len();

    let err = service
        .ship(
            &case.case_id,
            &ShipmentRequest {
                version: case.version,
                tracking_number: "1Z1".to_string(),
                carrier: "UPS".to_string(),
                shipped_at: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

    let unchanged = service.get_case(&case.case_id).unwrap();
    assert_eq!(unchanged.stage, RmaStage::UnderReview);
    assert_eq!(unchanged.version, 1);
    assert_eq!(unchanged.comments.len(), audit_before);
}

#[tokio::test]
async fn concurrent_approvals_have_exactly_one_winner() {
    let service = service_with(Arc::new(RecordingNotifier::default()));
    let case = service.open_case(&test_intake()).unwrap();
    let case = service
        .submit(
            &case.case_id,
            &SubmissionRequest {
                version: case.version,
                reference_number: "CDS-1".to_string(),
                submitted_by: "a.weber".to_string(),
            },
        )
        .unwrap();

    let approval = DecisionRequest {
        version: case.version,
        decision: ApprovalDecision::Approved,
        actor: "cds.gateway".to_string(),
        cds_case_id: None,
        notes: None,
        reason: None,
    };

    let won = service.decide(&case.case_id, &approval).unwrap();
    assert_eq!(won.stage, RmaStage::CdsApproved);

    let err = service.decide(&case.case_id, &approval).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Conflict { expected: 2, actual: 3 }
    ));

    // Exactly one audit entry for the transition.
    let settled = service.get_case(&case.case_id).unwrap();
    assert_eq!(settled.system_comment_count(), case.system_comment_count() + 1);
}

#[tokio::test]
async fn rejected_cases_freeze_except_for_comments() {
    let service = service_with(Arc::new(RecordingNotifier::default()));
    let case = service.open_case(&test_intake()).unwrap();

    let case = service
        .decide(
            &case.case_id,
            &DecisionRequest {
                version: case.version,
                decision: ApprovalDecision::Rejected,
                actor: "cds.gateway".to_string(),
                cds_case_id: None,
                notes: None,
                reason: Some("unit is out of its return window".to_string()),
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::Rejected);
    assert!(case.is_terminal());

    let err = service
        .submit(
            &case.case_id,
            &SubmissionRequest {
                version: case.version,
                reference_number: "CDS-2".to_string(),
                submitted_by: "a.weber".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

    // Post-mortem notes stay open on terminal cases.
    let case = service
        .comment(
            &case.case_id,
            &CommentRequest {
                version: case.version,
                author: "k.olsen".to_string(),
                body: "customer notified of the rejection".to_string(),
                category: Default::default(),
                internal: false,
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::Rejected);
    assert!(case.comments.iter().any(|c| c.author == "k.olsen"));
}

#[tokio::test]
async fn identical_comments_append_distinct_entries() {
    let service = service_with(Arc::new(RecordingNotifier::default()));
    let case = service.open_case(&test_intake()).unwrap();

    let req = CommentRequest {
        version: case.version,
        author: "k.olsen".to_string(),
        body: "called the site, waiting for photos".to_string(),
        category: Default::default(),
        internal: false,
    };
    let case = service.comment(&case.case_id, &req).unwrap();
    let case = service
        .comment(&case.case_id, &CommentRequest { version: case.version, ..req })
        .unwrap();

    let duplicates: Vec<_> = case
        .comments
        .iter()
        .filter(|c| c.body == "called the site, waiting for photos")
        .collect();
    assert_eq!(duplicates.len(), 2);
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn events_are_dispatched_after_each_commit() {
    let recorder = Arc::new(RecordingNotifier::default());
    let service = service_with(recorder.clone());

    let case = service.open_case(&test_intake()).unwrap();
    let case = service
        .submit(
            &case.case_id,
            &SubmissionRequest {
                version: case.version,
                reference_number: "CDS-1".to_string(),
                submitted_by: "a.weber".to_string(),
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::SentToCds);

    // Delivery order between tasks is not guaranteed, only delivery itself.
    let mut events = recorded_events(&recorder, 2).await;
    events.sort();
    assert_eq!(events, vec!["case_opened", "stage_changed"]);
}

#[tokio::test]
async fn broken_notifier_never_blocks_a_transition() {
    let service = service_with(Arc::new(BrokenNotifier));

    let case = service.open_case(&test_intake()).unwrap();
    let case = service
        .submit(
            &case.case_id,
            &SubmissionRequest {
                version: case.version,
                reference_number: "CDS-1".to_string(),
                submitted_by: "a.weber".to_string(),
            },
        )
        .unwrap();
    assert_eq!(case.stage, RmaStage::SentToCds);
    assert_eq!(case.version, 2);

    // The stored case committed even though every delivery attempt fails.
    let stored = service.get_case(&case.case_id).unwrap();
    assert_eq!(stored.stage, RmaStage::SentToCds);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn listing_honors_stage_and_owner_filters() {
    let service = service_with(Arc::new(RecordingNotifier::default()));

    let first = service.open_case(&test_intake()).unwrap();
    let mut other = test_intake();
    other.product_category = "lasers".to_string();
    other.region = "apac".to_string();
    let second = service.open_case(&other).unwrap();

    service
        .submit(
            &first.case_id,
            &SubmissionRequest {
                version: first.version,
                reference_number: "CDS-1".to_string(),
                submitted_by: "a.weber".to_string(),
            },
        )
        .unwrap();

    let all = service.list_cases(&CaseFilter::default()).unwrap();
    assert_eq!(all.len(), 2);

    let sent = service
        .list_cases(&CaseFilter {
            stage: Some(RmaStage::SentToCds),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].case_id, first.case_id);

    // The second case missed every assignment rule and fell to the default.
    let queued = service
        .list_cases(&CaseFilter {
            assigned_to: Some("dispatch.queue".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].case_id, second.case_id);

    let overdue = service
        .list_cases(&CaseFilter {
            overdue: Some(true),
            ..Default::default()
        })
        .unwrap();
    assert!(overdue.is_empty());
}
