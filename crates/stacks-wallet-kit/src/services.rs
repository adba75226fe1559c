use std::{fmt::Debug, sync::Arc};

use crossbeam_channel::{Receiver, Sender};
use futures::future::BoxFuture;

use crate::types::{
    message::ExtensionMessage,
    network::Network,
    wallet::{
        Account, AppEntry, AuthResponseParams, BroadcastOutcome, GaiaHubConfig,
        SignedTransaction, TransactionDraft, Wallet,
    },
};

pub type ServiceFuture<'a, T> = BoxFuture<'a, T>;

/// Reachability check for a storage hub. Implementations never surface errors: anything
/// short of a usable hub is `false`.
pub trait HubProbe: Send + Sync + Debug {
    fn probe<'a>(&'a self, url: &'a str) -> ServiceFuture<'a, bool>;
}

pub trait StorageClient: Send + Sync + Debug {
    fn configure_account<'a>(
        &'a self,
        wallet: &'a Wallet,
        hub_url: &'a str,
    ) -> ServiceFuture<'a, Result<GaiaHubConfig, String>>;

    fn upload_app_entry<'a>(
        &'a self,
        config: &'a GaiaHubConfig,
        entry: &'a AppEntry,
    ) -> ServiceFuture<'a, Result<(), String>>;
}

pub trait SigningService: Send + Sync + Debug {
    /// `None` when the account cannot sign (locked wallet, missing key).
    fn sign_transaction(
        &self,
        draft: &TransactionDraft,
        account: &Account,
    ) -> Option<SignedTransaction>;

    fn make_auth_response<'a>(
        &'a self,
        params: &'a AuthResponseParams,
    ) -> ServiceFuture<'a, Result<String, String>>;
}

pub trait BroadcastService: Send + Sync + Debug {
    /// `Err` is a transport failure; a node refusing the transaction is a
    /// [BroadcastOutcome::Rejected].
    fn broadcast<'a>(
        &'a self,
        transaction: &'a SignedTransaction,
        network: &'a Network,
    ) -> ServiceFuture<'a, Result<BroadcastOutcome, String>>;
}

pub trait MessageChannel: Send + Sync + Debug {
    fn send(&self, message: ExtensionMessage) -> Result<(), String>;
}

/// In-process relay towards the context that issued a request.
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    tx: Sender<ExtensionMessage>,
}

impl ChannelMessenger {
    pub fn new() -> (Self, Receiver<ExtensionMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded::<ExtensionMessage>();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: Sender<ExtensionMessage>) -> Self {
        Self { tx }
    }
}

impl MessageChannel for ChannelMessenger {
    fn send(&self, message: ExtensionMessage) -> Result<(), String> {
        self.tx.send(message).map_err(|e| format!("requester context is gone: {e}"))
    }
}

#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub hub_probe: Arc<dyn HubProbe>,
    pub storage: Arc<dyn StorageClient>,
    pub signer: Arc<dyn SigningService>,
    pub broadcaster: Arc<dyn BroadcastService>,
    pub channel: Arc<dyn MessageChannel>,
}

impl ServiceContext {
    pub fn new(
        hub_probe: Arc<dyn HubProbe>,
        storage: Arc<dyn StorageClient>,
        signer: Arc<dyn SigningService>,
        broadcaster: Arc<dyn BroadcastService>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self { hub_probe, storage, signer, broadcaster, channel }
    }
}
