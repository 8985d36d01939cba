//! Per-session service container.
//!
//! Built once from [`PortalConfig`] for the selected network. Owns the auth
//! gate, the chain clients, the ledger and the bridge address memo, and hands
//! out the tracker, allowance flow and committer wired to them.

use alloy::primitives::Address;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::allowance::AllowanceApprovalFlow;
use crate::auth::{AuthGate, AuthTransport, EnvTokenTransport};
use crate::blockchain::{
    BridgeRegistry, ChainRpc, ClientSettings, EvmClient, RollupRpc, SessionProvider, Wallet,
    WalletSigner,
};
use crate::commit::{AddressScreener, AllowAll, DenyList, TransactionCommitter};
use crate::config::schema::{NetworkConfig, RpcConfig, StorageBackend};
use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use crate::ledger::{JsonFileStorage, LedgerStorage, MemoryStorage, TransactionLedger};
use crate::tracker::TransactionStatusTracker;

pub struct PortalContext {
    config: PortalConfig,
    network: NetworkConfig,
    gate: Arc<AuthGate>,
    l2: Arc<SessionProvider>,
    l1: Option<Arc<EvmClient>>,
    public: Option<Arc<EvmClient>>,
    bridges: Arc<BridgeRegistry>,
    ledger: Arc<TransactionLedger>,
    screener: Arc<dyn AddressScreener>,
    cancel: CancellationToken,
}

impl PortalContext {
    /// Context for the configured `selected_network`.
    pub fn from_config(config: PortalConfig) -> PortalResult<Self> {
        let network = config
            .selected()
            .cloned()
            .ok_or_else(|| PortalError::Config("no network is configured".to_string()))?;
        Self::build(config, network)
    }

    /// Context for the network with `key`.
    pub fn for_network(config: PortalConfig, key: &str) -> PortalResult<Self> {
        let network = config
            .network(key)
            .cloned()
            .ok_or_else(|| PortalError::Config(format!("unknown network '{}'", key)))?;
        Self::build(config, network)
    }

    fn build(config: PortalConfig, network: NetworkConfig) -> PortalResult<Self> {
        let transport = network
            .auth_token_env
            .as_ref()
            .map(|var| Arc::new(EnvTokenTransport::new(var.clone())) as Arc<dyn AuthTransport>);
        let gate = Arc::new(if network.requires_auth {
            AuthGate::new(transport, true)
        } else {
            AuthGate::open()
        });

        let l2_settings = client_settings(
            "l2",
            network.chain_id,
            &network.rpc_url,
            &network.failover_urls,
            &config.rpc,
        );
        let l2 = Arc::new(SessionProvider::new(l2_settings, gate.clone()));

        let l1 = match &network.l1 {
            Some(l1) => Some(Arc::new(EvmClient::build(client_settings(
                "l1",
                l1.chain_id,
                &l1.rpc_url,
                &l1.failover_urls,
                &config.rpc,
            ))?)),
            None => None,
        };

        let public = match &network.delegated {
            Some(delegated) => Some(Arc::new(EvmClient::build(client_settings(
                "public",
                network.chain_id,
                &delegated.public_rpc_url,
                &[],
                &config.rpc,
            ))?)),
            None => None,
        };

        let storage: Arc<dyn LedgerStorage> = match config.storage.backend {
            StorageBackend::File => Arc::new(JsonFileStorage::new(PathBuf::from(&config.storage.path))),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        let ledger = Arc::new(TransactionLedger::open(storage)?);

        let screener: Arc<dyn AddressScreener> = if config.screening.denied_addresses.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(DenyList::from_config(&config.screening))
        };

        let bridges = Arc::new(BridgeRegistry::new(l2.clone() as Arc<dyn RollupRpc>));

        tracing::info!(
            network = %network.key,
            chain_id = network.chain_id,
            requires_auth = network.requires_auth,
            delegated = public.is_some(),
            settlement = l1.is_some(),
            "Portal context ready"
        );

        Ok(Self {
            config,
            network,
            gate,
            l2,
            l1,
            public,
            bridges,
            ledger,
            screener,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn gate(&self) -> &Arc<AuthGate> {
        &self.gate
    }

    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    pub fn l2(&self) -> Arc<dyn RollupRpc> {
        self.l2.clone()
    }

    /// Token that stops every poll chain started from this context.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn tracker(&self) -> TransactionStatusTracker {
        let tracker = TransactionStatusTracker::new(
            self.network.key.clone(),
            self.l2.clone(),
            self.ledger.clone(),
            self.config.tracking.clone(),
        )
        .with_bridges(self.bridges.clone())
        .with_cancellation(self.cancel.clone());
        match &self.l1 {
            Some(l1) => tracker.with_l1(l1.clone() as Arc<dyn ChainRpc>),
            None => tracker,
        }
    }

    /// Read-only allowance flow for `owner`.
    pub fn allowance_flow(&self, owner: Address) -> AllowanceApprovalFlow {
        AllowanceApprovalFlow::new(self.l2.clone(), owner, self.config.allowance.clone())
    }

    /// Committer signing with `signer`; deposits additionally need `l1_signer`.
    pub fn committer(
        &self,
        signer: Arc<dyn WalletSigner>,
        l1_signer: Option<Arc<dyn WalletSigner>>,
    ) -> TransactionCommitter {
        let mut committer =
            TransactionCommitter::new(self.network.key.clone(), self.l2.clone(), signer, self.ledger.clone())
                .with_bridges(self.bridges.clone())
                .with_screener(self.screener.clone());
        if let Some(l1_signer) = l1_signer {
            committer = committer.with_l1_signer(l1_signer);
        }
        if let Some(public) = &self.public {
            committer = committer.with_delegated(public.clone() as Arc<dyn ChainRpc>);
        }
        committer
    }

    /// Environment wallet connected to the L2 endpoint.
    pub fn l2_wallet(&self) -> PortalResult<Wallet> {
        let wallet = Wallet::from_env(self.network.chain_id)?;
        Ok(wallet.connect(&self.network.rpc_url)?)
    }

    /// Environment wallet connected to the settlement chain, when there is one.
    pub fn l1_wallet(&self) -> PortalResult<Option<Wallet>> {
        match &self.network.l1 {
            Some(l1) => {
                let wallet = Wallet::from_env(l1.chain_id)?;
                Ok(Some(wallet.connect(&l1.rpc_url)?))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for PortalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalContext")
            .field("network", &self.network.key)
            .field("gate", &self.gate)
            .field("settlement", &self.l1.is_some())
            .field("delegated", &self.public.is_some())
            .finish()
    }
}

fn client_settings(
    label: &str,
    chain_id: u64,
    rpc_url: &str,
    failover_urls: &[String],
    rpc: &RpcConfig,
) -> ClientSettings {
    ClientSettings {
        label: label.to_string(),
        chain_id,
        rpc_url: rpc_url.to_string(),
        failover_urls: failover_urls.to_vec(),
        timeout: Duration::from_secs(rpc.timeout_secs),
        receipt_poll_interval: Duration::from_millis(rpc.receipt_poll_interval_ms),
        receipt_timeout: Duration::from_secs(rpc.receipt_timeout_secs),
        headers: Default::default(),
    }
}
