use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "treasurer")]
#[command(version = "0.1.0")]
#[command(about = "Autonomous treasury payment saga orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run against in-memory collaborators (no chain, no database)
    #[arg(long)]
    pub dry_run: bool,

    /// Config directory
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one payment saga
    Pay {
        /// Requester identity recorded on the request
        #[arg(long, default_value = "cli")]
        requester: String,
        /// Vendor chain address or registered vendor name
        vendor: String,
        /// Payment amount
        amount: Decimal,
        /// Token currency label
        #[arg(long, default_value = "MNEE")]
        currency: String,
    },
    /// Inspect and resolve approval tickets
    Approvals {
        #[command(subcommand)]
        command: ApprovalsCommands,
    },
    /// Read or change the spending limit
    Limit {
        #[command(subcommand)]
        command: LimitCommands,
    },
    /// Show the treasury token balance
    Balance,
}

#[derive(Subcommand)]
pub enum ApprovalsCommands {
    /// List pending approval tickets
    List,
    /// Approve or reject a ticket; approval resumes the saga
    Resolve {
        /// Ticket id
        ticket: Uuid,
        /// Approve the payment and resume it
        #[arg(long, conflicts_with = "reject")]
        approve: bool,
        /// Reject the payment
        #[arg(long)]
        reject: bool,
    },
}

#[derive(Subcommand)]
pub enum LimitCommands {
    /// Print the effective spending limit
    Get,
    /// Store a new spending limit
    Set {
        /// New limit value
        value: Decimal,
    },
}
