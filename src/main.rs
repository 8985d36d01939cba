//! Bridge portal operator CLI.
//!
//! Inspects and drives the transaction ledger of one rollup network:
//! list and show stored records, resolve pending ones, check or grant the
//! vault allowance, and submit transfers, withdrawals and deposits.

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use bridge_portal::blockchain::abi::L2_BASE_TOKEN_ADDRESS;
use bridge_portal::blockchain::WalletSigner;
use bridge_portal::commit::{FeeParams, TransactionParams};
use bridge_portal::config::loader::load_config;
use bridge_portal::ledger::{TokenAmount, TransactionRecord, TransactionType};
use bridge_portal::observability::{logging, metrics};
use bridge_portal::PortalContext;

#[derive(Parser)]
#[command(name = "bridge-portal")]
#[command(about = "Operator CLI for the bridge transaction portal", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "portal.toml")]
    config: PathBuf,

    /// Network key; the configured selection when omitted
    #[arg(short, long)]
    network: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored transactions
    List {
        /// Only transactions sent by, or withdrawn to, this account
        #[arg(long)]
        account: Option<Address>,
    },
    /// Print one stored transaction
    Show { hash: String },
    /// Poll one stored transaction until it is terminal
    Track { hash: String },
    /// Poll every pending transaction concurrently
    Resume,
    /// Check (and optionally grant) the vault allowance for a token
    Allowance {
        token: Address,
        amount: U256,
        /// Account to inspect; the environment wallet when omitted
        #[arg(long)]
        owner: Option<Address>,
        /// Submit an approval when the allowance is insufficient
        #[arg(long)]
        approve: bool,
    },
    /// Submit a transaction and record it
    Send {
        #[arg(value_enum)]
        kind: Kind,
        /// L2 token address; the base token when omitted
        #[arg(long)]
        token: Option<Address>,
        amount: U256,
        #[arg(long)]
        to: Address,
        #[arg(long, default_value = "ETH")]
        symbol: String,
        #[arg(long, default_value_t = 18)]
        decimals: u8,
        /// Settlement chain token address (ERC-20 deposits)
        #[arg(long)]
        l1_token: Option<Address>,
        /// Custom withdrawal bridge
        #[arg(long)]
        bridge: Option<Address>,
        #[arg(long)]
        gas_limit: Option<u64>,
        /// Deposits: L2 gas limit of the priority request
        #[arg(long)]
        l2_gas_limit: Option<u64>,
        /// Deposits: L2 execution cost paid on L1
        #[arg(long, default_value = "0")]
        base_cost: U256,
        /// Keep polling until the transaction is terminal
        #[arg(long)]
        track: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Transfer,
    Withdrawal,
    Deposit,
}

impl From<Kind> for TransactionType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Transfer => TransactionType::Transfer,
            Kind::Withdrawal => TransactionType::Withdrawal,
            Kind::Deposit => TransactionType::Deposit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let context = match &cli.network {
        Some(key) => PortalContext::for_network(config, key)?,
        None => PortalContext::from_config(config)?,
    };

    let cancel = context.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping tracking");
            cancel.cancel();
        }
    });

    let network = context.network().key.clone();
    match cli.command {
        Commands::List { account } => {
            let records = match account {
                Some(account) => context.ledger().user_records(&network, account),
                None => context.ledger().records(&network),
            };
            for record in &records {
                println!("{}", summary(record));
            }
        }
        Commands::Show { hash } => {
            let record = context
                .ledger()
                .get(&network, &hash)
                .ok_or_else(|| format!("transaction {} is not in the {} ledger", hash, network))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Track { hash } => {
            ensure_session(&context).await?;
            let record = context.tracker().track(&hash).await?;
            println!("{}", summary(&record));
        }
        Commands::Resume => {
            ensure_session(&context).await?;
            let results = context.tracker().resume().await;
            if results.is_empty() {
                println!("No pending transactions on {}", network);
            }
            for (hash, result) in results {
                match result {
                    Ok(record) => println!("{}", summary(&record)),
                    Err(e) => eprintln!("{} {}", hash, e),
                }
            }
        }
        Commands::Allowance {
            token,
            amount,
            owner,
            approve,
        } => {
            ensure_session(&context).await?;
            let flow = match (owner, approve) {
                (Some(owner), false) => context.allowance_flow(owner),
                _ => {
                    let wallet = Arc::new(context.l2_wallet()?);
                    context.allowance_flow(wallet.address()).with_signer(wallet)
                }
            };
            flow.set_amount(amount);
            flow.set_token(Some(token)).await?;

            let state = flow.state();
            println!("owner:     {}", flow.owner());
            println!("native:    {:?}", state.is_native_token);
            println!("allowance: {:?}", state.approved_allowance);
            println!("approved:  {}", flow.amount_to_transfer_is_approved());

            if approve && flow.show_allowance_process() {
                let allowance = flow.approve().await?;
                println!("approved allowance: {}", allowance);
                for hash in flow.transaction_hashes() {
                    println!("approval tx: {}", hash);
                }
            }
        }
        Commands::Send {
            kind,
            token,
            amount,
            to,
            symbol,
            decimals,
            l1_token,
            bridge,
            gas_limit,
            l2_gas_limit,
            base_cost,
            track,
        } => {
            ensure_session(&context).await?;
            let kind = TransactionType::from(kind);
            let signer: Arc<dyn WalletSigner> = Arc::new(context.l2_wallet()?);
            let l1_signer: Option<Arc<dyn WalletSigner>> = match kind {
                TransactionType::Deposit => context
                    .l1_wallet()?
                    .map(|wallet| Arc::new(wallet) as Arc<dyn WalletSigner>),
                _ => None,
            };
            let committer = context.committer(signer, l1_signer);

            let params = TransactionParams {
                kind,
                to,
                token: TokenAmount {
                    address: token.unwrap_or(L2_BASE_TOKEN_ADDRESS),
                    l1_address: l1_token,
                    symbol,
                    decimals,
                    amount,
                },
                bridge_address: bridge,
            };
            let fee = FeeParams {
                gas_limit,
                l2_gas_limit,
                base_cost,
                ..Default::default()
            };

            let result = committer.commit(&params, &fee).await?;
            println!("{} submitted ({}): {}", kind, result.path.as_str(), result.hash);

            if track {
                let record = context.tracker().resolve(result.record).await?;
                println!("{}", summary(&record));
            }
        }
    }

    Ok(())
}

/// Authenticate once up front on networks that gate RPC access.
async fn ensure_session(context: &PortalContext) -> Result<(), Box<dyn std::error::Error>> {
    let gate = context.gate();
    if !gate.requires_auth() || gate.check_status() {
        return Ok(());
    }
    if !gate.authenticate().await? {
        let reason = gate
            .session()
            .auth_error
            .unwrap_or_else(|| "authentication failed".to_string());
        return Err(reason.into());
    }
    Ok(())
}

fn summary(record: &TransactionRecord) -> String {
    format!(
        "{} {:<10} {:<9} {} {} -> {}",
        record.transaction_hash,
        record.kind.as_str(),
        record.outcome(),
        record.token.amount,
        record.token.symbol,
        record.to.address
    )
}
