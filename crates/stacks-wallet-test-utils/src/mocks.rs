use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use kit::services::{
    BroadcastService, HubProbe, MessageChannel, ServiceContext, ServiceFuture, SigningService,
    StorageClient,
};
use kit::types::message::ExtensionMessage;
use kit::types::network::Network;
use kit::types::wallet::{
    Account, AppEntry, AuthResponseParams, BroadcastOutcome, GaiaHubConfig, SignedTransaction,
    TransactionDraft, Wallet,
};

/// Hub probe answering from a fixed set of reachable urls, recording every call.
#[derive(Debug, Default)]
pub struct MockHubProbe {
    reachable: HashSet<String>,
    probed: Mutex<Vec<String>>,
}

impl MockHubProbe {
    pub fn reachable(urls: &[&str]) -> Self {
        Self {
            reachable: urls.iter().map(|u| u.trim_end_matches('/').to_string()).collect(),
            probed: Mutex::new(vec![]),
        }
    }

    pub fn probed_urls(&self) -> Vec<String> {
        self.probed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.probed_urls().len()
    }
}

impl HubProbe for MockHubProbe {
    fn probe<'a>(&'a self, url: &'a str) -> ServiceFuture<'a, bool> {
        Box::pin(async move {
            if let Ok(mut probed) = self.probed.lock() {
                probed.push(url.to_string());
            }
            self.reachable.contains(url.trim_end_matches('/'))
        })
    }
}

#[derive(Debug, Default)]
pub struct MockStorageClient {
    failure: Mutex<Option<String>>,
    configured: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<AppEntry>>,
}

impl MockStorageClient {
    pub fn fail_with(&self, reason: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(reason.to_string());
        }
    }

    pub fn configured_hubs(&self) -> Vec<String> {
        self.configured.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn uploaded_entries(&self) -> Vec<AppEntry> {
        self.uploaded.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|f| f.clone())
    }
}

impl StorageClient for MockStorageClient {
    fn configure_account<'a>(
        &'a self,
        wallet: &'a Wallet,
        hub_url: &'a str,
    ) -> ServiceFuture<'a, Result<GaiaHubConfig, String>> {
        Box::pin(async move {
            if let Some(reason) = self.failure() {
                return Err(reason);
            }
            if let Ok(mut configured) = self.configured.lock() {
                configured.push(hub_url.to_string());
            }
            Ok(GaiaHubConfig {
                server: hub_url.to_string(),
                url_prefix: format!("{}/read/", hub_url.trim_end_matches('/')),
                address: wallet.accounts.first().map(|a| a.stx_address.clone()).unwrap_or_default(),
                token: "v1:token".to_string(),
                max_file_upload_size_megabytes: Some(20),
            })
        })
    }

    fn upload_app_entry<'a>(
        &'a self,
        _config: &'a GaiaHubConfig,
        entry: &'a AppEntry,
    ) -> ServiceFuture<'a, Result<(), String>> {
        Box::pin(async move {
            if let Some(reason) = self.failure() {
                return Err(reason);
            }
            if let Ok(mut uploaded) = self.uploaded.lock() {
                uploaded.push(entry.clone());
            }
            Ok(())
        })
    }
}

/// Signer producing recognizable fake artifacts. [MockSigner::lock] makes it refuse to sign.
#[derive(Debug, Default)]
pub struct MockSigner {
    locked: AtomicBool,
    drafts: Mutex<Vec<TransactionDraft>>,
}

impl MockSigner {
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn auth_response_for(&self, account_index: u32) -> String {
        format!("auth-response.account-{}", account_index)
    }

    pub fn signed_drafts(&self) -> Vec<TransactionDraft> {
        self.drafts.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl SigningService for MockSigner {
    fn sign_transaction(
        &self,
        draft: &TransactionDraft,
        account: &Account,
    ) -> Option<SignedTransaction> {
        if self.locked.load(Ordering::SeqCst) {
            return None;
        }
        if let Ok(mut drafts) = self.drafts.lock() {
            drafts.push(draft.clone());
        }
        let tx_bytes = format!(
            "{}:{}:{}:{}",
            account.stx_address,
            draft.kind.tx_type(),
            draft.fee,
            draft.nonce
        )
        .into_bytes();
        Some(SignedTransaction { tx_bytes, sponsored: draft.sponsored })
    }

    fn make_auth_response<'a>(
        &'a self,
        params: &'a AuthResponseParams,
    ) -> ServiceFuture<'a, Result<String, String>> {
        Box::pin(async move { Ok(self.auth_response_for(params.account.index)) })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum BroadcastMode {
    #[default]
    Accept,
    Reject(String),
    Unreachable(String),
}

#[derive(Debug, Default)]
pub struct MockBroadcaster {
    mode: Mutex<BroadcastMode>,
    accepted: Mutex<Vec<String>>,
    attempts: Mutex<usize>,
}

impl MockBroadcaster {
    pub fn reject_with(&self, reason: &str) {
        self.set_mode(BroadcastMode::Reject(reason.to_string()));
    }

    pub fn fail_with(&self, error: &str) {
        self.set_mode(BroadcastMode::Unreachable(error.to_string()));
    }

    pub fn broadcast_count(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }

    pub fn last_tx_id(&self) -> Option<String> {
        self.accepted.lock().ok().and_then(|a| a.last().cloned())
    }

    fn set_mode(&self, mode: BroadcastMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }
}

impl BroadcastService for MockBroadcaster {
    fn broadcast<'a>(
        &'a self,
        transaction: &'a SignedTransaction,
        _network: &'a Network,
    ) -> ServiceFuture<'a, Result<BroadcastOutcome, String>> {
        Box::pin(async move {
            if let Ok(mut attempts) = self.attempts.lock() {
                *attempts += 1;
            }
            let mode = self.mode.lock().map(|m| m.clone()).unwrap_or_default();
            match mode {
                BroadcastMode::Accept => {
                    let tx_id = transaction.tx_id();
                    if let Ok(mut accepted) = self.accepted.lock() {
                        accepted.push(tx_id.clone());
                    }
                    Ok(BroadcastOutcome::Accepted { tx_id })
                }
                BroadcastMode::Reject(reason) => Ok(BroadcastOutcome::Rejected { reason }),
                BroadcastMode::Unreachable(error) => Err(error),
            }
        })
    }
}

/// Channel keeping every delivered message. A disconnected channel refuses deliveries.
#[derive(Debug)]
pub struct RecordingChannel {
    connected: AtomicBool,
    messages: Mutex<Vec<ExtensionMessage>>,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self { connected: AtomicBool::new(true), messages: Mutex::new(vec![]) }
    }
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ExtensionMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }
}

impl MessageChannel for RecordingChannel {
    fn send(&self, message: ExtensionMessage) -> Result<(), String> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err("requester context is gone".to_string());
        }
        self.messages.lock().map_err(|e| e.to_string())?.push(message);
        Ok(())
    }
}

/// Every collaborator double, kept typed so tests can inspect them after a flow ran.
#[derive(Debug, Clone)]
pub struct MockServices {
    pub hub_probe: Arc<MockHubProbe>,
    pub storage: Arc<MockStorageClient>,
    pub signer: Arc<MockSigner>,
    pub broadcaster: Arc<MockBroadcaster>,
    pub channel: Arc<RecordingChannel>,
}

impl MockServices {
    pub fn services(&self) -> ServiceContext {
        ServiceContext::new(
            self.hub_probe.clone(),
            self.storage.clone(),
            self.signer.clone(),
            self.broadcaster.clone(),
            self.channel.clone(),
        )
    }
}

pub fn services_with(hub_probe: MockHubProbe) -> MockServices {
    MockServices {
        hub_probe: Arc::new(hub_probe),
        storage: Arc::new(MockStorageClient::default()),
        signer: Arc::new(MockSigner::default()),
        broadcaster: Arc::new(MockBroadcaster::default()),
        channel: Arc::new(RecordingChannel::new()),
    }
}
