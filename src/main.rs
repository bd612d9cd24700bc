use clap::Parser;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;

use treasurer::adapters::{
    EvmClient, LogNotifier, MemoryApprovalStore, MemoryChain, MemoryLedger, MemoryPolicyStore,
    PostgresStore, WebhookNotifier,
};
use treasurer::cli::{ApprovalsCommands, Cli, Commands, LimitCommands};
use treasurer::config::AppConfig;
use treasurer::error::{Result, TreasurerError};
use treasurer::logging::{init_logging, init_logging_simple};
use treasurer::ports::{ApprovalStore, BlockchainClient, Ledger, NotificationSink, PolicyStore};
use treasurer::saga::{
    ApprovalQueue, FundsReservation, PolicyGate, SagaOrchestrator, TransferExecutor,
};
use treasurer::signing::Wallet;
use treasurer::{ApprovalDecision, PaymentRequest, RetryPolicy};

struct Components {
    orchestrator: SagaOrchestrator,
    policy: Arc<dyn PolicyStore>,
    approvals: ApprovalQueue,
    chain: Arc<dyn BlockchainClient>,
    config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.dry_run {
        AppConfig::load_from(&cli.config).unwrap_or_else(|_| AppConfig::default_config(true))
    } else {
        AppConfig::load_from(&cli.config)?
    };

    match &cli.command {
        Commands::Pay { .. } | Commands::Approvals { .. } => init_logging(&config.logging),
        Commands::Limit { .. } | Commands::Balance => init_logging_simple(),
    }

    if let Err(problems) = config.validate() {
        for p in &problems {
            eprintln!("config error: {}", p);
        }
        return Err(TreasurerError::Validation(format!(
            "{} config problem(s)",
            problems.len()
        )));
    }

    let components = build_components(config, cli.dry_run).await?;

    match cli.command {
        Commands::Pay {
            requester,
            vendor,
            amount,
            currency,
        } => {
            let request = PaymentRequest::new(&requester, &vendor, amount, &currency);
            info!(request_id = %request.request_id, %vendor, %amount, "submitting payment request");
            let outcome = components.orchestrator.execute(request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Approvals { command } => match command {
            ApprovalsCommands::List => {
                let pending = components.approvals.list_pending().await?;
                if pending.is_empty() {
                    println!("No pending approval tickets.");
                }
                for ticket in pending {
                    println!(
                        "{}  {} -> {}  {} {}  ({})",
                        ticket.ticket_id,
                        ticket.request.requester_id,
                        ticket.request.vendor_identifier,
                        ticket.request.amount,
                        ticket.request.currency,
                        ticket.reason
                    );
                }
            }
            ApprovalsCommands::Resolve {
                ticket,
                approve,
                reject,
            } => {
                if approve == reject {
                    return Err(TreasurerError::Validation(
                        "pass exactly one of --approve or --reject".into(),
                    ));
                }
                let decision = if approve {
                    ApprovalDecision::Approve
                } else {
                    ApprovalDecision::Reject
                };
                let resolved = components.approvals.resolve(ticket, decision).await?;
                println!("ticket {} -> {}", resolved.ticket_id, resolved.status);
                if approve {
                    let outcome = components.orchestrator.resume_approved(ticket).await?;
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
            }
        },
        Commands::Limit { command } => match command {
            LimitCommands::Get => {
                let limit = components
                    .policy
                    .get_limit(&components.config.policy.limit_name)
                    .await?
                    .unwrap_or(components.config.policy.default_limit);
                println!("{}", limit);
            }
            LimitCommands::Set { value } => {
                components
                    .policy
                    .set_limit(&components.config.policy.limit_name, value)
                    .await?;
                println!("limit set to {}", value);
            }
        },
        Commands::Balance => {
            let balance = components
                .chain
                .balance_of(&components.config.chain.treasury_address)
                .await
                .map_err(TreasurerError::Chain)?;
            println!("{}", balance);
        }
    }

    Ok(())
}

async fn build_components(config: AppConfig, dry_run: bool) -> Result<Components> {
    let dry_run = dry_run || config.dry_run.enabled;

    let (policy, ledger, approval_store, chain, notifier): (
        Arc<dyn PolicyStore>,
        Arc<dyn Ledger>,
        Arc<dyn ApprovalStore>,
        Arc<dyn BlockchainClient>,
        Arc<dyn NotificationSink>,
    ) = if dry_run {
        info!("dry-run mode: in-memory stores, no chain, no database");
        let chain = MemoryChain::new(&config.chain.treasury_address);
        chain.fund(&config.chain.treasury_address, dec!(1000)).await;
        (
            MemoryPolicyStore::new(),
            MemoryLedger::new(),
            MemoryApprovalStore::new(),
            chain,
            LogNotifier::new(),
        )
    } else {
        let store = Arc::new(
            PostgresStore::new(&config.database.url, config.database.max_connections).await?,
        );
        store.migrate().await?;

        let wallet = Wallet::from_env(config.chain.chain_id)?;
        let chain: Arc<dyn BlockchainClient> = Arc::new(EvmClient::new(&config.chain, wallet)?);

        let notifier: Arc<dyn NotificationSink> = match &config.notifications.webhook_url {
            Some(url) => WebhookNotifier::new(url.clone()),
            None => match WebhookNotifier::from_env() {
                Some(n) => n,
                None => LogNotifier::new(),
            },
        };

        (store.clone(), store.clone(), store, chain, notifier)
    };

    let gate = PolicyGate::new(policy.clone(), config.policy.clone());
    let funds = FundsReservation::new(ledger);
    let executor = TransferExecutor::new(
        chain.clone(),
        notifier.clone(),
        config.vendors.clone(),
        config.chain.treasury_address.clone(),
        RetryPolicy::from(&config.retry),
    );
    let approvals = ApprovalQueue::new(approval_store);
    let orchestrator = SagaOrchestrator::new(
        gate,
        funds,
        executor,
        approvals.clone(),
        notifier,
    );

    Ok(Components {
        orchestrator,
        policy,
        approvals,
        chain,
        config,
    })
}
