//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap.
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};

/// RMA Workflow Engine CLI
#[derive(Parser)]
#[command(name = "rmactl")]
#[command(about = "RMA Workflow Engine - case intake, transitions and inspection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine base URL (overrides $RMAD_URL and the default)
    #[arg(long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check daemon health
    Health,

    /// List cases, newest deadline pressure first
    List {
        /// Only cases in this stage (e.g. under_review, sent_to_cds)
        #[arg(long)]
        stage: Option<String>,

        /// Only cases owned by this person
        #[arg(long)]
        assignee: Option<String>,

        /// Only cases past their deadline
        #[arg(long)]
        overdue: bool,
    },

    /// Show one case with its full history
    Show {
        /// Case id or RMA number
        case: String,
    },

    /// Open a new case from an intake report
    Open {
        /// Site the faulty unit is installed at
        #[arg(long)]
        site: String,

        /// Product name
        #[arg(long)]
        product: String,

        /// Product category used by the assignment rules
        #[arg(long = "category")]
        product_category: String,

        /// Site region used by the assignment rules
        #[arg(long)]
        region: String,

        /// Warranty status: in-warranty, out-of-warranty or unknown
        #[arg(long, default_value = "unknown")]
        warranty: String,

        /// Person reporting the fault
        #[arg(long)]
        reporter: String,

        /// One-line fault description
        #[arg(long)]
        summary: String,

        /// Initial priority: low, medium, high or critical (default medium)
        #[arg(long)]
        priority: Option<String>,
    },

    /// Submit the case to CDS for approval
    Submit {
        /// Case id or RMA number
        case: String,

        /// CDS reference number for the submission
        #[arg(long)]
        reference: String,

        /// Person performing the submission
        #[arg(long)]
        actor: String,
    },

    /// Record that CDS approved the replacement
    Approve {
        /// Case id or RMA number
        case: String,

        /// Person or system recording the approval
        #[arg(long)]
        actor: String,

        /// Case id on the CDS side
        #[arg(long)]
        cds_case: Option<String>,

        /// Free-form approval notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Reject the case (from review or after CDS submission)
    Reject {
        /// Case id or RMA number
        case: String,

        /// Why the case is rejected
        #[arg(long)]
        reason: String,

        /// Person or system recording the rejection
        #[arg(long)]
        actor: String,
    },

    /// Record the outbound replacement shipment
    Ship {
        /// Case id or RMA number
        case: String,

        /// Carrier tracking number
        #[arg(long)]
        tracking: String,

        /// Carrier name
        #[arg(long)]
        carrier: String,
    },

    /// Confirm the replacement arrived on site
    Receive {
        /// Case id or RMA number
        case: String,
    },

    /// Start the faulty-part return to CDS
    Return {
        /// Case id or RMA number
        case: String,

        /// Return shipment tracking number
        #[arg(long)]
        tracking: String,

        /// Carrier name
        #[arg(long)]
        carrier: String,

        /// Person initiating the return
        #[arg(long)]
        actor: String,
    },

    /// Record CDS confirmation that the faulty part arrived
    ConfirmReturn {
        /// Case id or RMA number
        case: String,

        /// Person or system recording the confirmation
        #[arg(long)]
        actor: String,

        /// Free-form confirmation notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Close the case
    Complete {
        /// Case id or RMA number
        case: String,

        /// Person closing the case
        #[arg(long)]
        actor: String,

        /// Closing notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Assign the case, or re-run the assignment rules
    Assign {
        /// Case id or RMA number
        case: String,

        /// Pin this owner; omit to auto-resolve via the rules
        #[arg(long)]
        to: Option<String>,

        /// Person requesting the change
        #[arg(long)]
        actor: String,
    },

    /// Add a comment to the case
    Comment {
        /// Case id or RMA number
        case: String,

        /// Comment text
        body: String,

        /// Comment author
        #[arg(long)]
        author: String,

        /// Keep the comment off customer-facing views
        #[arg(long)]
        internal: bool,
    },

    /// Show the active workflow rules
    Rules,
}
