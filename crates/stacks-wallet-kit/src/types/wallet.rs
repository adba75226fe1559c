use super::message::{FinishedTxPayload, SponsoredFinishedTxPayload, TxResult};
use super::network::Network;
use super::request::TransactionRequestKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub index: u32,
    pub stx_address: String,
    pub data_public_key: String,
}

/// Handle on the unlocked wallet; key material stays with the signing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub accounts: Vec<Account>,
}

impl Wallet {
    pub fn account(&self, index: u32) -> Option<&Account> {
        self.accounts.iter().find(|a| a.index == index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaiaHubConfig {
    pub server: String,
    pub url_prefix: String,
    pub address: String,
    pub token: String,
    pub max_file_upload_size_megabytes: Option<u64>,
}

/// Entry recorded in the wallet config for every app the user signed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEntry {
    pub origin: String,
    pub last_login_at: i64,
    pub scopes: Vec<String>,
    pub app_icon: Option<String>,
    pub name: Option<String>,
    pub account_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponseParams {
    pub gaia_hub_url: String,
    pub app_domain: String,
    pub transit_public_key: String,
    pub scopes: Vec<String>,
    pub account: Account,
}

/// Everything the signing service needs to build and sign a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub kind: TransactionRequestKind,
    pub fee: u64,
    pub nonce: u64,
    pub network: Network,
    pub sponsored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx_bytes: Vec<u8>,
    pub sponsored: bool,
}

impl SignedTransaction {
    pub fn tx_raw(&self) -> String {
        format!("0x{}", hex::encode(&self.tx_bytes))
    }

    pub fn tx_id(&self) -> String {
        format!("0x{}", crate::crypto::transaction_id(&self.tx_bytes))
    }

    /// Result relayed to the requesting app once the transaction left the wallet.
    pub fn to_tx_result(&self, broadcast_tx_id: Option<&str>) -> TxResult {
        match broadcast_tx_id {
            Some(tx_id) => TxResult::Finished(FinishedTxPayload {
                tx_id: tx_id.to_string(),
                tx_raw: self.tx_raw(),
            }),
            None => TxResult::Sponsored(SponsoredFinishedTxPayload { tx_raw: self.tx_raw() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted { tx_id: String },
    Rejected { reason: String },
}

impl BroadcastOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BroadcastOutcome::Accepted { .. })
    }
}
