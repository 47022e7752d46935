//! RMA Control - CLI client for the RMA Workflow Engine
//!
//! Operator interface for case intake, workflow transitions and inspection.

use anyhow::Result;
use clap::Parser;
use rmactl::cli::{Cli, Commands};
use rmactl::client::EngineClient;
use rmactl::commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = EngineClient::new(cli.server.clone());

    match cli.command {
        Commands::Health => commands::health(&client).await,
        Commands::List {
            stage,
            assignee,
            overdue,
        } => commands::list(&client, stage, assignee, overdue).await,
        Commands::Show { case } => commands::show(&client, &case).await,
        Commands::Open {
            site,
            product,
            product_category,
            region,
            warranty,
            reporter,
            summary,
            priority,
        } => {
            commands::open(
                &client,
                site,
                product,
                product_category,
                region,
                warranty,
                reporter,
                summary,
                priority,
            )
            .await
        }
        Commands::Submit {
            case,
            reference,
            actor,
        } => commands::submit(&client, &case, reference, actor).await,
        Commands::Approve {
            case,
            actor,
            cds_case,
            notes,
        } => commands::approve(&client, &case, actor, cds_case, notes).await,
        Commands::Reject {
            case,
            reason,
            actor,
        } => commands::reject(&client, &case, reason, actor).await,
        Commands::Ship {
            case,
            tracking,
            carrier,
        } => commands::ship(&client, &case, tracking, carrier).await,
        Commands::Receive { case } => commands::receive(&client, &case).await,
        Commands::Return {
            case,
            tracking,
            carrier,
            actor,
        } => commands::start_return(&client, &case, tracking, carrier, actor).await,
        Commands::ConfirmReturn { case, actor, notes } => {
            commands::confirm_return(&client, &case, actor, notes).await
        }
        Commands::Complete { case, actor, notes } => {
            commands::complete(&client, &case, actor, notes).await
        }
        Commands::Assign { case, to, actor } => commands::assign(&client, &case, to, actor).await,
        Commands::Comment {
            case,
            body,
            author,
            internal,
        } => commands::comment(&client, &case, body, author, internal).await,
        Commands::Rules => commands::rules(&client).await,
    }
}
