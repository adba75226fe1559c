pub mod local_store;
pub mod networks;
pub mod nonce;
pub mod storage;

use std::collections::{HashMap, HashSet};

use kit::constants::DEFAULT_NETWORK_KEY;
use kit::serde_json::Value as JsonValue;
use kit::types::message::{ExtensionMessage, ExtensionMethod, MessagePayload};
use kit::types::network::{default_networks, Network, Networks};
use kit::types::notification::Notification;
use kit::types::request::{DecodedAuthRequest, DecodedRequest, DecodedTransactionRequest};
use kit::types::wallet::{Account, Wallet};

use crate::decoder::try_decode_request;
use crate::Context;

use local_store::{read_json, write_json, KeyValueStore, StoreError};
use networks::{find_matching_network_key, resolve_network, NETWORK_KEY};
use nonce::LocalNonces;
use storage::{StorageConfig, STORAGE_CONFIG_KEY};

/// Operations guarded against duplicate submission while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingKey {
    ChooseStorage,
    ChooseAccount,
    ConfirmDrawer,
    EditNonceDrawer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeEstimation {
    pub fee: u64,
    pub fee_rate: f64,
}

/// Request being served, with the token it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub token: String,
    pub request: DecodedRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Application state shared by the flows. Every mutation goes through a named operation.
#[derive(Debug)]
pub struct AppState {
    ctx: Context,
    store: Box<dyn KeyValueStore>,
    pending_request: Option<PendingRequest>,
    storage_config: StorageConfig,
    wallet: Option<Wallet>,
    current_account_index: Option<u32>,
    networks: Networks,
    network_key: String,
    nonces: LocalNonces,
    balances: HashMap<(String, String), u64>,
    loading: HashSet<LoadingKey>,
    notifications: Vec<Notification>,
    fee_estimations: Vec<FeeEstimation>,
}

impl AppState {
    /// Restores persisted selections from `store`. Unreadable entries fall back to defaults.
    pub fn load(ctx: &Context, store: Box<dyn KeyValueStore>) -> Self {
        let storage_config = read_json::<StorageConfig>(store.as_ref(), STORAGE_CONFIG_KEY)
            .unwrap_or_else(|e| {
                ctx.try_log(|logger| warn!(logger, "Ignoring persisted storage config: {}", e));
                None
            })
            .unwrap_or_default();
        let networks = default_networks();
        let network_key = read_json::<String>(store.as_ref(), NETWORK_KEY)
            .unwrap_or_else(|e| {
                ctx.try_log(|logger| warn!(logger, "Ignoring persisted network key: {}", e));
                None
            })
            .filter(|key| networks.contains_key(key))
            .unwrap_or_else(|| DEFAULT_NETWORK_KEY.to_string());

        Self {
            ctx: ctx.clone(),
            store,
            pending_request: None,
            storage_config,
            wallet: None,
            current_account_index: None,
            networks,
            network_key,
            nonces: LocalNonces::default(),
            balances: HashMap::new(),
            loading: HashSet::new(),
            notifications: vec![],
            fee_estimations: vec![],
        }
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Decodes `token` and makes it the pending request. Undecodable tokens leave the
    /// state untouched and return `None`.
    pub fn receive_request(
        &mut self,
        method: ExtensionMethod,
        token: &str,
    ) -> Option<&PendingRequest> {
        match try_decode_request(method, token) {
            Ok(request) => {
                self.set_pending_request(token, request);
                self.pending_request.as_ref()
            }
            Err(e) => {
                self.ctx.try_log(|logger| debug!(logger, "Ignoring {} token: {}", method, e));
                None
            }
        }
    }

    /// Intake of a message relayed by the content script. Foreign, malformed or
    /// non-request messages are ignored.
    pub fn receive_message(&mut self, message: &JsonValue) -> Option<&PendingRequest> {
        let message = match ExtensionMessage::try_from_json(message) {
            Ok(message) => message,
            Err(e) => {
                self.ctx.try_log(|logger| debug!(logger, "Ignoring message: {}", e));
                return None;
            }
        };
        match message.into_payload() {
            MessagePayload::AuthenticationRequest(token) => {
                self.receive_request(ExtensionMethod::AuthenticationRequest, &token)
            }
            MessagePayload::TransactionRequest(token) => {
                self.receive_request(ExtensionMethod::TransactionRequest, &token)
            }
            other => {
                self.ctx
                    .try_log(|logger| debug!(logger, "Ignoring {} message", other.method()));
                None
            }
        }
    }

    pub fn set_pending_request(&mut self, token: &str, request: DecodedRequest) {
        self.pending_request = Some(PendingRequest { token: token.to_string(), request });
    }

    pub fn clear_pending_request(&mut self) {
        self.pending_request = None;
    }

    /// Clears the pending request only if it is still the one issued as `token`. A request
    /// received meanwhile stays pending.
    pub fn clear_pending_request_for(&mut self, token: &str) -> bool {
        match &self.pending_request {
            Some(pending) if pending.token == token => {
                self.pending_request = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending_request.as_ref()
    }

    pub fn pending_auth_request(&self) -> Option<(&str, &DecodedAuthRequest)> {
        let pending = self.pending_request.as_ref()?;
        pending.request.as_authentication().map(|r| (pending.token.as_str(), r))
    }

    pub fn pending_transaction_request(&self) -> Option<(&str, &DecodedTransactionRequest)> {
        let pending = self.pending_request.as_ref()?;
        pending.request.as_transaction().map(|r| (pending.token.as_str(), r))
    }

    pub fn storage_config(&self) -> &StorageConfig {
        &self.storage_config
    }

    /// Persists then applies the storage choice.
    pub fn update_storage_config(&mut self, config: StorageConfig) -> Result<(), StateError> {
        write_json(self.store.as_mut(), STORAGE_CONFIG_KEY, &config)?;
        self.storage_config = config;
        Ok(())
    }

    pub fn set_wallet(&mut self, wallet: Option<Wallet>) {
        if wallet.is_none() {
            self.current_account_index = None;
        }
        self.wallet = wallet;
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    pub fn switch_account(&mut self, index: u32) {
        self.current_account_index = Some(index);
    }

    pub fn current_account(&self) -> Option<&Account> {
        let index = self.current_account_index?;
        self.wallet.as_ref()?.account(index)
    }

    pub fn networks(&self) -> &Networks {
        &self.networks
    }

    /// A pending transaction request pins the network it was issued for, when it is one
    /// the wallet knows. Otherwise the user's selection applies.
    pub fn current_network_key(&self) -> String {
        self.network_key_for(self.pending_transaction_request().map(|(_, r)| r))
    }

    /// Network key serving `request`: the one it targets when known, else the selection.
    pub fn network_key_for(&self, request: Option<&DecodedTransactionRequest>) -> String {
        request
            .and_then(|request| request.network.as_ref())
            .and_then(|network| find_matching_network_key(network, &self.networks))
            .unwrap_or_else(|| self.network_key.clone())
    }

    pub fn current_network(&self) -> Result<Network, StateError> {
        self.network_for(self.pending_transaction_request().map(|(_, r)| r))
    }

    pub fn network_for(
        &self,
        request: Option<&DecodedTransactionRequest>,
    ) -> Result<Network, StateError> {
        let key = self.network_key_for(request);
        resolve_network(&key, &self.networks)
            .cloned()
            .ok_or(StateError::UnknownNetwork(key))
    }

    pub fn set_current_network_key(&mut self, key: &str) -> Result<(), StateError> {
        if !self.networks.contains_key(key) {
            return Err(StateError::UnknownNetwork(key.to_string()));
        }
        write_json(self.store.as_mut(), NETWORK_KEY, &key.to_string())?;
        self.network_key = key.to_string();
        Ok(())
    }

    pub fn next_nonce(&self, address: &str, network_url: &str) -> Option<u64> {
        self.nonces.get(address, network_url)
    }

    pub fn set_latest_nonce(&mut self, address: &str, network_url: &str, used_nonce: u64) {
        self.nonces.set_latest(address, network_url, used_nonce);
    }

    /// Records the spendable balance of `address`, in micro-STX, as last fetched from the node.
    pub fn set_available_balance(&mut self, address: &str, network_url: &str, ustx: u64) {
        self.balances.insert((address.to_string(), network_url.to_string()), ustx);
    }

    pub fn available_balance(&self, address: &str, network_url: &str) -> Option<u64> {
        self.balances.get(&(address.to_string(), network_url.to_string())).copied()
    }

    /// Marks `key` as in flight. Returns `false` when it already was.
    pub fn begin_loading(&mut self, key: LoadingKey) -> bool {
        self.loading.insert(key)
    }

    pub fn finish_loading(&mut self, key: LoadingKey) {
        self.loading.remove(&key);
    }

    pub fn is_loading(&self, key: LoadingKey) -> bool {
        self.loading.contains(&key)
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn set_fee_estimations(&mut self, estimations: Vec<FeeEstimation>) {
        self.fee_estimations = estimations;
    }

    pub fn clear_fee_estimations(&mut self) {
        self.fee_estimations.clear();
    }

    pub fn fee_estimations(&self) -> &[FeeEstimation] {
        &self.fee_estimations
    }
}
