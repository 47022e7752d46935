//! Workflow service: the commit path for every case mutation.
//!
//! Each operation follows the same shape:
//!
//! 1. read the case as it is stored right now
//! 2. refuse the write if the caller's version is already stale
//! 3. run the pure transition from `rma_common::workflow`
//! 4. compare-and-swap the result back into the store
//! 5. hand a notification to the dispatcher, fire-and-forget
//!
//! Only step 4 decides the race between two writers; step 2 just turns the
//! common case into a cheaper, earlier refusal. Notifications go out after
//! the write has committed, so a dead webhook can never hold up a case.

use crate::notifier::{self, Notifier, WorkflowEvent};
use crate::store::CaseStore;
use chrono::{DateTime, Utc};
use rma_common::{
    workflow, ApprovalDecision, AssignRequest, CaseFilter, CaseIntake, CommentRequest,
    CompletionRequest, DecisionRequest, ReceiptRequest, ReturnConfirmationRequest, ReturnRequest,
    RmaCase, RmaStage, ShipmentRequest, SubmissionRequest, WorkflowError, WorkflowRules,
};
use std::sync::Arc;
use tracing::info;

/// Outcome of a committed mutation, with enough context for notifications
struct Committed {
    case: RmaCase,
    previous_stage: RmaStage,
}

pub struct WorkflowService {
    store: Arc<dyn CaseStore>,
    rules: WorkflowRules,
    notifier: Arc<dyn Notifier>,
    notify_retry_limit: u32,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn CaseStore>,
        rules: WorkflowRules,
        notifier: Arc<dyn Notifier>,
        notify_retry_limit: u32,
    ) -> Self {
        Self {
            store,
            rules,
            notifier,
            notify_retry_limit,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Rules snapshot the service was started with
    pub fn rules(&self) -> &WorkflowRules {
        &self.rules
    }

    /// Case by id or RMA number
    pub fn get_case(&self, key: &str) -> Result<RmaCase, WorkflowError> {
        self.store
            .find(key)?
            .ok_or_else(|| WorkflowError::NotFound(key.to_string()))
    }

    pub fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<RmaCase>, WorkflowError> {
        self.store.list(filter, Utc::now())
    }

    pub fn overdue_cases(&self, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError> {
        self.store.overdue(now)
    }

    pub fn case_count(&self) -> Result<usize, WorkflowError> {
        self.store.count()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn open_case(&self, intake: &CaseIntake) -> Result<RmaCase, WorkflowError> {
        let case = workflow::open_case(intake, &self.rules, Utc::now())?;
        self.store.insert(&case)?;
        info!(
            "Opened {} for {} at {} (owner: {})",
            case.rma_number,
            case.product,
            case.site,
            case.assigned_to.as_deref().unwrap_or("unassigned")
        );
        self.emit(WorkflowEvent::opened(&case));
        Ok(case)
    }

    pub fn submit(&self, key: &str, req: &SubmissionRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::submit_to_cds(case, &self.rules, &req.reference_number, &req.submitted_by, now)
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    /// Vendor decision: approval moves the case forward, rejection ends it
    pub fn decide(&self, key: &str, req: &DecisionRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| match req.decision {
            ApprovalDecision::Approved => workflow::record_cds_approval(
                case,
                &self.rules,
                &req.actor,
                req.cds_case_id.as_deref(),
                req.notes.as_deref(),
                now,
            ),
            ApprovalDecision::Rejected => workflow::reject(
                case,
                &self.rules,
                &req.actor,
                req.reason.as_deref().unwrap_or(""),
                now,
            ),
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    pub fn ship(&self, key: &str, req: &ShipmentRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::record_shipment(
                case,
                &self.rules,
                &req.tracking_number,
                &req.carrier,
                req.shipped_at.unwrap_or(now),
                now,
            )
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    pub fn receive(&self, key: &str, req: &ReceiptRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::confirm_replacement_receipt(case, &self.rules, req.received_at, now)
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    pub fn start_return(&self, key: &str, req: &ReturnRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::initiate_return(
                case,
                &self.rules,
                &req.tracking_number,
                &req.carrier,
                &req.initiated_by,
                now,
            )
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    pub fn confirm_return(
        &self,
        key: &str,
        req: &ReturnConfirmationRequest,
    ) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::confirm_return_delivery(
                case,
                &self.rules,
                &req.confirmed_by,
                req.notes.as_deref(),
                now,
            )
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    pub fn complete(&self, key: &str, req: &CompletionRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::complete(case, &self.rules, &req.completed_by, req.notes.as_deref(), now)
        })?;
        self.emit_stage_change(&committed);
        Ok(committed.case)
    }

    pub fn assign(&self, key: &str, req: &AssignRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::assign(case, &self.rules, req.assignee.as_deref(), &req.actor, now)
        })?;
        self.emit(WorkflowEvent::owner_changed(&committed.case));
        Ok(committed.case)
    }

    pub fn comment(&self, key: &str, req: &CommentRequest) -> Result<RmaCase, WorkflowError> {
        let committed = self.commit(key, req.version, |case, now| {
            workflow::add_comment(case, &req.author, &req.body, req.category, req.internal, now)
        })?;
        Ok(committed.case)
    }

    /// Escalate a case the sweep found overdue. The CAS runs against the
    /// version the sweep read; anyone who touched the case since wins, and
    /// the next cycle re-evaluates.
    pub fn escalate_case(
        &self,
        case: &RmaCase,
        now: DateTime<Utc>,
    ) -> Result<RmaCase, WorkflowError> {
        let updated = workflow::escalate(case, &self.rules, now)?;
        let persisted = self.store.update(&updated, case.version)?;
        info!(
            "Escalated {} in {} to {} (owner: {})",
            persisted.rma_number,
            persisted.stage,
            persisted.priority,
            persisted.assigned_to.as_deref().unwrap_or("unassigned")
        );
        self.emit(WorkflowEvent::escalated(&persisted));
        Ok(persisted)
    }

    // ========================================================================
    // Commit Path
    // ========================================================================

    fn commit<F>(&self, key: &str, expected_version: u64, op: F) -> Result<Committed, WorkflowError>
    where
        F: FnOnce(&RmaCase, DateTime<Utc>) -> Result<RmaCase, WorkflowError>,
    {
        let now = Utc::now();
        let current = self.get_case(key)?;
        if current.version != expected_version {
            return Err(WorkflowError::Conflict {
                expected: expected_version,
                actual: current.version,
            });
        }

        let updated = op(&current, now)?;
        let case = self.store.update(&updated, expected_version)?;
        Ok(Committed {
            case,
            previous_stage: current.stage,
        })
    }

    fn emit_stage_change(&self, committed: &Committed) {
        if committed.case.stage != committed.previous_stage {
            self.emit(WorkflowEvent::stage_changed(
                &committed.case,
                committed.previous_stage,
            ));
        }
    }

    fn emit(&self, event: WorkflowEvent) {
        notifier::dispatch(self.notifier.clone(), event, self.notify_retry_limit);
    }
}
