//! Terminal rendering for case data.
//!
//! Plain key/value blocks and narrow tables; color carries state (stage,
//! priority, deadline pressure) and nothing else.

use chrono::{DateTime, Utc};
use console::{style, StyledObject};
use rma_common::{
    CaseComment, CasePriority, CaseSummary, HealthResponse, ListCasesResponse, RmaCase, RmaStage,
    WorkflowRules, SYSTEM_AUTHOR,
};

const KEY_WIDTH: usize = 16;

fn print_kv(key: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{:<width$}", key, width = KEY_WIDTH)).dim(), value);
}

fn fmt_ts(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn stage_styled(stage: RmaStage) -> StyledObject<&'static str> {
    let label = stage.description();
    match stage {
        RmaStage::Completed => style(label).green(),
        RmaStage::Rejected => style(label).red(),
        _ => style(label).cyan(),
    }
}

fn priority_styled(priority: CasePriority) -> StyledObject<&'static str> {
    let label = priority.as_str();
    match priority {
        CasePriority::Low => style(label).dim(),
        CasePriority::Medium => style(label),
        CasePriority::High => style(label).yellow(),
        CasePriority::Critical => style(label).red().bold(),
    }
}

/// Deadline with remaining/overdue time, colored by pressure
fn deadline_styled(deadline: &DateTime<Utc>, overdue: bool, now: DateTime<Utc>) -> String {
    let stamp = fmt_ts(deadline);
    if overdue {
        let hours = (now - *deadline).num_hours();
        format!("{} {}", stamp, style(format!("({}h overdue)", hours)).red().bold())
    } else {
        let hours = (*deadline - now).num_hours();
        format!("{} {}", stamp, style(format!("({}h left)", hours)).dim())
    }
}

// ============================================================================
// Health
// ============================================================================

pub fn print_health(health: &HealthResponse, base_url: &str) {
    println!();
    println!("{}", style(format!("rmad v{}", health.version)).bold());
    print_kv("status", style(&health.status).green());
    print_kv("endpoint", base_url);
    print_kv("uptime", format!("{}s", health.uptime_seconds));
    println!();
}

// ============================================================================
// Case List
// ============================================================================

pub fn print_case_list(list: &ListCasesResponse) {
    if list.cases.is_empty() {
        println!("No matching cases.");
        return;
    }

    println!();
    println!(
        "{}",
        style(format!(
            "{:<14} {:<22} {:<9} {:<14} {:<16} {}",
            "RMA", "STAGE", "PRIORITY", "OWNER", "SITE", "DEADLINE"
        ))
        .dim()
    );

    let now = Utc::now();
    for case in &list.cases {
        print_summary_row(case, now);
    }
    println!();
    println!("{} case(s)", list.total);
}

fn print_summary_row(case: &CaseSummary, now: DateTime<Utc>) {
    let owner = case.assigned_to.as_deref().unwrap_or("-");
    println!(
        "{:<14} {:<22} {:<9} {:<14} {:<16} {}",
        case.rma_number,
        case.stage.description(),
        case.priority.as_str(),
        owner,
        case.site,
        deadline_styled(&case.deadline_at, case.overdue, now)
    );
}

// ============================================================================
// Case Detail
// ============================================================================

pub fn print_case(case: &RmaCase) {
    let now = Utc::now();

    println!();
    println!(
        "{}  {}  {}",
        style(&case.rma_number).bold(),
        stage_styled(case.stage),
        priority_styled(case.priority)
    );
    println!();

    print_kv("case_id", &case.case_id);
    print_kv("site", &case.site);
    print_kv("product", format!("{} ({})", case.product, case.product_category));
    print_kv("region", &case.region);
    print_kv("warranty", case.warranty_status);
    print_kv("summary", &case.summary);
    match case.assigned_to.as_deref() {
        Some(owner) if case.manual_assignment => {
            print_kv("owner", format!("{} (pinned)", owner))
        }
        Some(owner) => print_kv("owner", owner),
        None => print_kv("owner", style("unassigned").dim()),
    }
    print_kv("reported_by", &case.created_by);
    print_kv("created", fmt_ts(&case.created_at));
    print_kv("stage_entered", fmt_ts(&case.stage_entered_at));
    if !case.is_terminal() {
        print_kv(
            "deadline",
            deadline_styled(&case.deadline_at, case.is_overdue(now), now),
        );
    }
    if case.escalation_count > 0 {
        print_kv("escalations", style(case.escalation_count).yellow());
    }
    print_kv("version", case.version);

    if let Some(submission) = &case.cds_submission {
        println!();
        println!("{}", style("CDS submission").bold());
        print_kv("reference", &submission.reference_number);
        print_kv("submitted_by", &submission.submitted_by);
        print_kv("submitted_at", fmt_ts(&submission.submitted_at));
    }

    if let Some(approval) = &case.cds_approval {
        println!();
        println!("{}", style("CDS approval").bold());
        print_kv("approved_by", &approval.approved_by);
        print_kv("approved_at", fmt_ts(&approval.approved_at));
        if let Some(cds_case_id) = &approval.cds_case_id {
            print_kv("cds_case", cds_case_id);
        }
        if let Some(notes) = &approval.notes {
            print_kv("notes", notes);
        }
    }

    if let Some(shipment) = &case.outbound_shipment {
        println!();
        println!("{}", style("Replacement shipment").bold());
        print_kv("tracking", &shipment.tracking_number);
        print_kv("carrier", &shipment.carrier);
        print_kv("shipped_at", fmt_ts(&shipment.shipped_at));
        if let Some(delivered) = &shipment.delivered_at {
            print_kv("delivered_at", fmt_ts(delivered));
        }
    }

    if let Some(ret) = &case.return_shipment {
        println!();
        println!("{}", style("Faulty-part return").bold());
        print_kv("tracking", &ret.tracking_number);
        print_kv("carrier", &ret.carrier);
        print_kv("initiated_by", &ret.initiated_by);
        print_kv("initiated_at", fmt_ts(&ret.initiated_at));
        if let Some(confirmed) = &ret.delivery_confirmed_at {
            print_kv("confirmed_at", fmt_ts(confirmed));
        }
        if let Some(confirmed_by) = &ret.confirmed_by {
            print_kv("confirmed_by", confirmed_by);
        }
    }

    if let Some(completion) = &case.completion {
        println!();
        println!("{}", style("Completion").bold());
        print_kv("completed_by", &completion.completed_by);
        print_kv("completed_at", fmt_ts(&completion.completed_at));
        print_kv("total_days", completion.total_days);
    }

    if !case.comments.is_empty() {
        println!();
        println!("{}", style(format!("History ({} entries)", case.comments.len())).bold());
        for comment in &case.comments {
            print_comment(comment);
        }
    }
    println!();
}

fn print_comment(comment: &CaseComment) {
    let author = if comment.author == SYSTEM_AUTHOR {
        style(comment.author.as_str()).dim()
    } else {
        style(comment.author.as_str()).bold()
    };
    let marker = if comment.is_internal { " [internal]" } else { "" };
    println!(
        "  {}  {}{}",
        style(fmt_ts(&comment.timestamp)).dim(),
        author,
        style(marker).dim()
    );
    println!("      {}", comment.body);
}

// ============================================================================
// Rules
// ============================================================================

pub fn print_rules(rules: &WorkflowRules) {
    println!();
    println!("{}", style("SLA hours (low / medium / high / critical)").bold());
    for (stage, sla) in &rules.sla {
        print_kv(
            stage.as_str(),
            format!("{} / {} / {} / {}", sla.low, sla.medium, sla.high, sla.critical),
        );
    }

    println!();
    println!("{}", style("Assignment rules").bold());
    if rules.assignment.is_empty() {
        println!("  (none; every case falls through to the default)");
    }
    for rule in &rules.assignment {
        let category = rule.product_category.as_deref().unwrap_or("*");
        let region = rule.region.as_deref().unwrap_or("*");
        let escalation = rule
            .escalation_assignee
            .as_deref()
            .map(|senior| format!(", escalates to {}", senior))
            .unwrap_or_default();
        println!("  {:<20} {:<10} -> {}{}", category, region, rule.assignee, escalation);
    }

    println!();
    match &rules.default_assignee {
        Some(fallback) => print_kv("default_owner", fallback),
        None => print_kv("default_owner", style("unassigned").dim()),
    }
    println!();
}
