use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use url::Url;

use super::message::ExtensionMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDetails {
    pub name: String,
    pub icon: String,
}

/// Authentication request, as signed by the requesting app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedAuthRequest {
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Transit keys; the first one encrypts the app private key in the response.
    pub public_keys: Vec<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub manifest_uri: Option<String>,
    #[serde(rename = "appDetails", default)]
    pub app_details: Option<AppDetails>,
    #[serde(rename = "enableGaiaSelection", default)]
    pub enable_gaia_selection: bool,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub supports_hub_url: bool,
}

impl DecodedAuthRequest {
    pub fn redirect_url(&self) -> Result<Url, String> {
        Url::parse(&self.redirect_uri).map_err(|e| format!("invalid redirect uri: {e}"))
    }

    /// Origin of the redirect uri, the app domain the response is scoped to.
    pub fn app_origin(&self) -> Result<String, String> {
        Ok(self.redirect_url()?.origin().ascii_serialization())
    }

    pub fn transit_public_key(&self) -> Option<&str> {
        self.public_keys.first().map(|k| k.as_str())
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_details.as_ref().map(|d| d.name.as_str())
    }

    pub fn app_icon(&self) -> Option<&str> {
        self.app_details.as_ref().map(|d| d.icon.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNetwork {
    #[serde(alias = "coreApiUrl", default)]
    pub url: Option<String>,
    #[serde(rename = "chainId", default)]
    pub chain_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PostConditionMode {
    Allow,
    Deny,
}

impl<'de> Deserialize<'de> for PostConditionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        // connect serializes the enum discriminant (1 = allow, 2 = deny)
        match JsonValue::deserialize(deserializer)? {
            JsonValue::Number(n) if n.as_u64() == Some(1) => Ok(PostConditionMode::Allow),
            JsonValue::Number(n) if n.as_u64() == Some(2) => Ok(PostConditionMode::Deny),
            JsonValue::String(s) if s.eq_ignore_ascii_case("allow") => Ok(PostConditionMode::Allow),
            JsonValue::String(s) if s.eq_ignore_ascii_case("deny") => Ok(PostConditionMode::Deny),
            other => Err(D::Error::custom(format!("invalid post condition mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransferRequest {
    pub recipient: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: u64,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallRequest {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    /// Hex encoded clarity values.
    #[serde(default)]
    pub function_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeployRequest {
    pub contract_name: String,
    pub code_body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "txType")]
pub enum TransactionRequestKind {
    #[serde(rename = "token_transfer")]
    TokenTransfer(TokenTransferRequest),
    #[serde(rename = "contract_call")]
    ContractCall(ContractCallRequest),
    #[serde(rename = "smart_contract")]
    ContractDeploy(ContractDeployRequest),
}

impl TransactionRequestKind {
    pub fn tx_type(&self) -> &'static str {
        match self {
            TransactionRequestKind::TokenTransfer(_) => "token_transfer",
            TransactionRequestKind::ContractCall(_) => "contract_call",
            TransactionRequestKind::ContractDeploy(_) => "smart_contract",
        }
    }

    pub fn as_token_transfer(&self) -> Option<&TokenTransferRequest> {
        match self {
            TransactionRequestKind::TokenTransfer(transfer) => Some(transfer),
            _ => None,
        }
    }
}

/// Transaction request, as signed (or not) by the requesting app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedTransactionRequest {
    #[serde(flatten)]
    pub kind: TransactionRequestKind,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub app_details: Option<AppDetails>,
    #[serde(default)]
    pub network: Option<RequestNetwork>,
    #[serde(default)]
    pub stx_address: Option<String>,
    #[serde(default)]
    pub sponsored: bool,
    #[serde(default)]
    pub post_condition_mode: Option<PostConditionMode>,
    #[serde(default)]
    pub post_conditions: Vec<JsonValue>,
    #[serde(default)]
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRequest {
    Authentication(DecodedAuthRequest),
    Transaction(DecodedTransactionRequest),
}

impl DecodedRequest {
    pub fn request_method(&self) -> ExtensionMethod {
        match self {
            DecodedRequest::Authentication(_) => ExtensionMethod::AuthenticationRequest,
            DecodedRequest::Transaction(_) => ExtensionMethod::TransactionRequest,
        }
    }

    pub fn as_authentication(&self) -> Option<&DecodedAuthRequest> {
        match self {
            DecodedRequest::Authentication(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&DecodedTransactionRequest> {
        match self {
            DecodedRequest::Transaction(request) => Some(request),
            _ => None,
        }
    }

    pub fn enables_gaia_selection(&self) -> bool {
        self.as_authentication().map(|r| r.enable_gaia_selection).unwrap_or(false)
    }
}

/// Amounts travel as decimal strings since they may exceed the js number range.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => s.trim().parse::<u64>().map_err(D::Error::custom),
        JsonValue::Number(n) => n.as_u64().ok_or_else(|| D::Error::custom("amount must be unsigned")),
        other => Err(D::Error::custom(format!("invalid amount: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_token_transfer_request() {
        let request: DecodedTransactionRequest = serde_json::from_value(json!({
            "txType": "token_transfer",
            "recipient": "ST2PHCPANVT8DVPSY5W2ZZ81M285Q5Z8Y6DQMZE7Z",
            "amount": "1000",
            "memo": "coffee",
            "publicKey": "02aa",
            "network": { "coreApiUrl": "https://stacks-node-api.testnet.stacks.co", "chainId": 2147483648u32 },
            "postConditionMode": 2,
            "appDetails": { "name": "Demo", "icon": "https://demo.app/icon.png" }
        }))
        .unwrap();

        let transfer = request.kind.as_token_transfer().unwrap();
        assert_eq!(transfer.amount, 1000);
        assert_eq!(transfer.memo.as_deref(), Some("coffee"));
        assert_eq!(request.kind.tx_type(), "token_transfer");
        assert_eq!(request.post_condition_mode, Some(PostConditionMode::Deny));
        assert_eq!(
            request.network.unwrap().url.as_deref(),
            Some("https://stacks-node-api.testnet.stacks.co")
        );
        assert!(!request.sponsored);
    }

    #[test]
    fn parses_contract_call_request() {
        let request: DecodedTransactionRequest = serde_json::from_value(json!({
            "txType": "contract_call",
            "contractAddress": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            "contractName": "counter",
            "functionName": "increment",
            "functionArgs": ["0x0100000000000000000000000000000001"],
        }))
        .unwrap();
        let TransactionRequestKind::ContractCall(call) = request.kind else {
            panic!("expected contract call")
        };
        assert_eq!(call.function_name, "increment");
        assert_eq!(call.function_args.len(), 1);
    }

    #[test]
    fn rejects_unknown_transaction_types_and_bad_amounts() {
        assert!(serde_json::from_value::<DecodedTransactionRequest>(json!({
            "txType": "stacking",
        }))
        .is_err());
        assert!(serde_json::from_value::<DecodedTransactionRequest>(json!({
            "txType": "token_transfer",
            "recipient": "ST2PHCPANVT8DVPSY5W2ZZ81M285Q5Z8Y6DQMZE7Z",
            "amount": "-4",
        }))
        .is_err());
    }

    #[test]
    fn auth_request_exposes_origin_and_transit_key() {
        let request: DecodedAuthRequest = serde_json::from_value(json!({
            "redirect_uri": "https://app.example.com/callback?x=1",
            "public_keys": ["02bb"],
            "scopes": ["store_write", "publish_data"],
            "enableGaiaSelection": true,
        }))
        .unwrap();
        assert_eq!(request.app_origin().unwrap(), "https://app.example.com");
        assert_eq!(request.transit_public_key(), Some("02bb"));
        assert!(request.enable_gaia_selection);
        assert_eq!(request.app_name(), None);
        assert!(DecodedRequest::Authentication(request).enables_gaia_selection());
    }
}
