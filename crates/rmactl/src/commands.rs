//! Command execution: resolve the case, build the request, print the result.
//!
//! Every mutation reads the case first and sends its current version, so a
//! stale terminal window loses cleanly to whoever got there first.

use crate::client::EngineClient;
use crate::display;
use anyhow::{anyhow, Result};
use console::style;
use rma_common::{
    ApprovalDecision, AssignRequest, CaseIntake, CasePriority, CommentCategory, CommentRequest,
    CompletionRequest, DecisionRequest, ReceiptRequest, ReturnConfirmationRequest, ReturnRequest,
    RmaCase, RmaStage, ShipmentRequest, SubmissionRequest, WarrantyStatus,
};

fn confirm(case: &RmaCase, what: &str) {
    println!(
        "{} {} {} (now {}, version {})",
        style("ok").green().bold(),
        case.rma_number,
        what,
        case.stage.description(),
        case.version
    );
}

pub async fn health(client: &EngineClient) -> Result<()> {
    let health = client.health().await?;
    display::print_health(&health, client.base_url());
    Ok(())
}

pub async fn list(
    client: &EngineClient,
    stage: Option<String>,
    assignee: Option<String>,
    overdue: bool,
) -> Result<()> {
    if let Some(s) = &stage {
        RmaStage::parse(s).ok_or_else(|| {
            anyhow!(
                "unknown stage '{}'; expected one of: {}",
                s,
                RmaStage::all()
                    .iter()
                    .map(|stage| stage.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
    }
    let list = client.list(stage.as_deref(), assignee.as_deref(), overdue).await?;
    display::print_case_list(&list);
    Ok(())
}

pub async fn show(client: &EngineClient, case: &str) -> Result<()> {
    let case = client.show(case).await?;
    display::print_case(&case);
    Ok(())
}

pub async fn rules(client: &EngineClient) -> Result<()> {
    let rules = client.rules().await?;
    display::print_rules(&rules);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn open(
    client: &EngineClient,
    site: String,
    product: String,
    product_category: String,
    region: String,
    warranty: String,
    reporter: String,
    summary: String,
    priority: Option<String>,
) -> Result<()> {
    let warranty_status = WarrantyStatus::parse(&warranty).ok_or_else(|| {
        anyhow!(
            "unknown warranty status '{}'; expected in-warranty, out-of-warranty or unknown",
            warranty
        )
    })?;
    let priority = priority
        .map(|p| {
            CasePriority::parse(&p).ok_or_else(|| {
                anyhow!("unknown priority '{}'; expected low, medium, high or critical", p)
            })
        })
        .transpose()?;

    let intake = CaseIntake {
        site,
        product,
        product_category,
        region,
        warranty_status,
        reported_by: reporter,
        summary,
        priority,
    };
    let case = client.open(&intake).await?;
    confirm(&case, "opened");
    display::print_case(&case);
    Ok(())
}

pub async fn submit(
    client: &EngineClient,
    case: &str,
    reference: String,
    actor: String,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .submit(
            &current.case_id,
            &SubmissionRequest {
                version: current.version,
                reference_number: reference,
                submitted_by: actor,
            },
        )
        .await?;
    confirm(&updated, "submitted to CDS");
    Ok(())
}

pub async fn approve(
    client: &EngineClient,
    case: &str,
    actor: String,
    cds_case: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .decide(
            &current.case_id,
            &DecisionRequest {
                version: current.version,
                decision: ApprovalDecision::Approved,
                actor,
                cds_case_id: cds_case,
                notes,
                reason: None,
            },
        )
        .await?;
    confirm(&updated, "approved by CDS");
    Ok(())
}

pub async fn reject(
    client: &EngineClient,
    case: &str,
    reason: String,
    actor: String,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .decide(
            &current.case_id,
            &DecisionRequest {
                version: current.version,
                decision: ApprovalDecision::Rejected,
                actor,
                cds_case_id: None,
                notes: None,
                reason: Some(reason),
            },
        )
        .await?;
    confirm(&updated, "rejected");
    Ok(())
}

pub async fn ship(
    client: &EngineClient,
    case: &str,
    tracking: String,
    carrier: String,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .ship(
            &current.case_id,
            &ShipmentRequest {
                version: current.version,
                tracking_number: tracking,
                carrier,
                shipped_at: None,
            },
        )
        .await?;
    confirm(&updated, "replacement shipped");
    Ok(())
}

pub async fn receive(client: &EngineClient, case: &str) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .receive(
            &current.case_id,
            &ReceiptRequest {
                version: current.version,
                received_at: None,
            },
        )
        .await?;
    confirm(&updated, "replacement received");
    Ok(())
}

pub async fn start_return(
    client: &EngineClient,
    case: &str,
    tracking: String,
    carrier: String,
    actor: String,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .start_return(
            &current.case_id,
            &ReturnRequest {
                version: current.version,
                tracking_number: tracking,
                carrier,
                initiated_by: actor,
            },
        )
        .await?;
    confirm(&updated, "return started");
    Ok(())
}

pub async fn confirm_return(
    client: &EngineClient,
    case: &str,
    actor: String,
    notes: Option<String>,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .confirm_return(
            &current.case_id,
            &ReturnConfirmationRequest {
                version: current.version,
                confirmed_by: actor,
                notes,
            },
        )
        .await?;
    confirm(&updated, "return confirmed by CDS");
    Ok(())
}

pub async fn complete(
    client: &EngineClient,
    case: &str,
    actor: String,
    notes: Option<String>,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .complete(
            &current.case_id,
            &CompletionRequest {
                version: current.version,
                completed_by: actor,
                notes,
            },
        )
        .await?;
    confirm(&updated, "completed");
    if let Some(completion) = &updated.completion {
        println!("    closed after {} day(s)", completion.total_days);
    }
    Ok(())
}

pub async fn assign(
    client: &EngineClient,
    case: &str,
    to: Option<String>,
    actor: String,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .assign(
            &current.case_id,
            &AssignRequest {
                version: current.version,
                assignee: to,
                actor,
            },
        )
        .await?;
    match updated.assigned_to.as_deref() {
        Some(owner) => confirm(&updated, &format!("assigned to {}", owner)),
        None => confirm(&updated, "left unassigned"),
    }
    Ok(())
}

pub async fn comment(
    client: &EngineClient,
    case: &str,
    body: String,
    author: String,
    internal: bool,
) -> Result<()> {
    let current = client.show(case).await?;
    let updated = client
        .comment(
            &current.case_id,
            &CommentRequest {
                version: current.version,
                author,
                body,
                category: CommentCategory::General,
                internal,
            },
        )
        .await?;
    confirm(&updated, "comment added");
    Ok(())
}
