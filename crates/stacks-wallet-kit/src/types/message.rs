use std::str::FromStr;

use serde_json::Value as JsonValue;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::constants::{CANCELLED_RESPONSE, MESSAGE_SOURCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, EnumIter)]
pub enum ExtensionMethod {
    #[strum(serialize = "authenticationRequest")]
    AuthenticationRequest,
    #[strum(serialize = "authenticationResponse")]
    AuthenticationResponse,
    #[strum(serialize = "transactionRequest")]
    TransactionRequest,
    #[strum(serialize = "transactionResponse")]
    TransactionResponse,
    RequestDerivedStxAccounts,
    ShareInMemoryKeyToBackground,
    RequestInMemoryKeys,
    RemoveInMemoryKeys,
}

impl ExtensionMethod {
    /// Methods exchanged with pages, as opposed to wallet-internal traffic.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            ExtensionMethod::AuthenticationRequest
                | ExtensionMethod::AuthenticationResponse
                | ExtensionMethod::TransactionRequest
                | ExtensionMethod::TransactionResponse
        )
    }

    pub fn is_internal(&self) -> bool {
        !self.is_external()
    }

    pub fn is_from_content_script(&self) -> bool {
        matches!(self, ExtensionMethod::AuthenticationRequest | ExtensionMethod::TransactionRequest)
    }

    pub fn is_to_content_script(&self) -> bool {
        matches!(
            self,
            ExtensionMethod::AuthenticationResponse | ExtensionMethod::TransactionResponse
        )
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("unknown message source '{0}'")]
    UnknownSource(String),
    #[error("unknown message method '{0}'")]
    UnknownMethod(String),
    #[error("payload does not match method '{method}': {reason}")]
    PayloadMismatch { method: ExtensionMethod, reason: String },
    #[error("malformed message: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponsePayload {
    pub authentication_request: String,
    pub authentication_response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedTxPayload {
    pub tx_id: String,
    pub tx_raw: String,
}

/// Sponsored transactions are handed back unbroadcast, so there is no id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredFinishedTxPayload {
    pub tx_raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TxResult {
    Finished(FinishedTxPayload),
    Sponsored(SponsoredFinishedTxPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionResponse {
    Result(TxResult),
    Raw(String),
}

impl TransactionResponse {
    pub fn cancelled() -> Self {
        TransactionResponse::Raw(CANCELLED_RESPONSE.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransactionResponse::Raw(raw) if raw == CANCELLED_RESPONSE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponsePayload {
    pub transaction_request: String,
    pub transaction_response: TransactionResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStxAccountsRequest {
    pub secret_key: String,
    pub highest_account_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryKeyPayload {
    pub secret_key: String,
    pub key_id: String,
}

/// One case per [ExtensionMethod]; the variant alone decides the method of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    AuthenticationRequest(String),
    AuthenticationResponse(AuthenticationResponsePayload),
    TransactionRequest(String),
    TransactionResponse(TransactionResponsePayload),
    RequestDerivedStxAccounts(DerivedStxAccountsRequest),
    ShareInMemoryKeyToBackground(InMemoryKeyPayload),
    RequestInMemoryKeys,
    RemoveInMemoryKeys,
}

impl MessagePayload {
    pub fn method(&self) -> ExtensionMethod {
        match self {
            MessagePayload::AuthenticationRequest(_) => ExtensionMethod::AuthenticationRequest,
            MessagePayload::AuthenticationResponse(_) => ExtensionMethod::AuthenticationResponse,
            MessagePayload::TransactionRequest(_) => ExtensionMethod::TransactionRequest,
            MessagePayload::TransactionResponse(_) => ExtensionMethod::TransactionResponse,
            MessagePayload::RequestDerivedStxAccounts(_) => {
                ExtensionMethod::RequestDerivedStxAccounts
            }
            MessagePayload::ShareInMemoryKeyToBackground(_) => {
                ExtensionMethod::ShareInMemoryKeyToBackground
            }
            MessagePayload::RequestInMemoryKeys => ExtensionMethod::RequestInMemoryKeys,
            MessagePayload::RemoveInMemoryKeys => ExtensionMethod::RemoveInMemoryKeys,
        }
    }

    fn to_json(&self) -> JsonValue {
        let value = match self {
            MessagePayload::AuthenticationRequest(token)
            | MessagePayload::TransactionRequest(token) => Ok(JsonValue::String(token.clone())),
            MessagePayload::AuthenticationResponse(payload) => serde_json::to_value(payload),
            MessagePayload::TransactionResponse(payload) => serde_json::to_value(payload),
            MessagePayload::RequestDerivedStxAccounts(payload) => serde_json::to_value(payload),
            MessagePayload::ShareInMemoryKeyToBackground(payload) => serde_json::to_value(payload),
            MessagePayload::RequestInMemoryKeys | MessagePayload::RemoveInMemoryKeys => {
                Ok(JsonValue::Null)
            }
        };
        // Payload structs only hold strings and integers, serialization cannot fail.
        value.unwrap_or(JsonValue::Null)
    }

    fn from_json(method: ExtensionMethod, payload: JsonValue) -> Result<Self, EnvelopeError> {
        let mismatch = |reason: String| EnvelopeError::PayloadMismatch { method, reason };
        let payload = match method {
            ExtensionMethod::AuthenticationRequest => {
                MessagePayload::AuthenticationRequest(expect_token(payload).map_err(mismatch)?)
            }
            ExtensionMethod::TransactionRequest => {
                MessagePayload::TransactionRequest(expect_token(payload).map_err(mismatch)?)
            }
            ExtensionMethod::AuthenticationResponse => MessagePayload::AuthenticationResponse(
                serde_json::from_value(payload).map_err(|e| mismatch(e.to_string()))?,
            ),
            ExtensionMethod::TransactionResponse => MessagePayload::TransactionResponse(
                serde_json::from_value(payload).map_err(|e| mismatch(e.to_string()))?,
            ),
            ExtensionMethod::RequestDerivedStxAccounts => {
                MessagePayload::RequestDerivedStxAccounts(
                    serde_json::from_value(payload).map_err(|e| mismatch(e.to_string()))?,
                )
            }
            ExtensionMethod::ShareInMemoryKeyToBackground => {
                MessagePayload::ShareInMemoryKeyToBackground(
                    serde_json::from_value(payload).map_err(|e| mismatch(e.to_string()))?,
                )
            }
            ExtensionMethod::RequestInMemoryKeys => {
                expect_empty(payload).map_err(mismatch)?;
                MessagePayload::RequestInMemoryKeys
            }
            ExtensionMethod::RemoveInMemoryKeys => {
                expect_empty(payload).map_err(mismatch)?;
                MessagePayload::RemoveInMemoryKeys
            }
        };
        Ok(payload)
    }
}

fn expect_token(payload: JsonValue) -> Result<String, String> {
    match payload {
        JsonValue::String(token) if !token.is_empty() => Ok(token),
        JsonValue::String(_) => Err("request token is empty".into()),
        other => Err(format!("expected a request token, got {other}")),
    }
}

fn expect_empty(payload: JsonValue) -> Result<(), String> {
    match payload {
        JsonValue::Null => Ok(()),
        other => Err(format!("method takes no payload, got {other}")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawMessage {
    source: String,
    method: String,
    #[serde(default)]
    payload: JsonValue,
}

/// Message exchanged between the wallet's execution contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage", into = "RawMessage")]
pub struct ExtensionMessage {
    payload: MessagePayload,
}

impl ExtensionMessage {
    pub fn new(payload: MessagePayload) -> Self {
        Self { payload }
    }

    /// Builds a message from a method and an untyped payload, rejecting payloads that do not
    /// have the shape the method requires.
    pub fn from_parts(method: ExtensionMethod, payload: JsonValue) -> Result<Self, EnvelopeError> {
        Ok(Self { payload: MessagePayload::from_json(method, payload)? })
    }

    pub fn authentication_response(request_token: &str, response_token: &str) -> Self {
        Self::new(MessagePayload::AuthenticationResponse(AuthenticationResponsePayload {
            authentication_request: request_token.to_string(),
            authentication_response: response_token.to_string(),
        }))
    }

    pub fn transaction_response(request_token: &str, response: TransactionResponse) -> Self {
        Self::new(MessagePayload::TransactionResponse(TransactionResponsePayload {
            transaction_request: request_token.to_string(),
            transaction_response: response,
        }))
    }

    pub fn source(&self) -> &'static str {
        MESSAGE_SOURCE
    }

    pub fn method(&self) -> ExtensionMethod {
        self.payload.method()
    }

    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    pub fn into_payload(self) -> MessagePayload {
        self.payload
    }

    /// Token of the request this message answers or carries, if any.
    pub fn request_token(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::AuthenticationRequest(token)
            | MessagePayload::TransactionRequest(token) => Some(token),
            MessagePayload::AuthenticationResponse(payload) => {
                Some(&payload.authentication_request)
            }
            MessagePayload::TransactionResponse(payload) => Some(&payload.transaction_request),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "source": MESSAGE_SOURCE,
            "method": self.method().as_ref(),
            "payload": self.payload.to_json(),
        })
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    pub fn try_from_json(value: &JsonValue) -> Result<Self, EnvelopeError> {
        let raw: RawMessage = serde_json::from_value(value.clone())
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Reads a message off a shared channel. Anything that is not a well-formed wallet
    /// message is dropped, since other senders use the same channel.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        Self::try_from_json(value).ok()
    }

    pub fn from_json_str(value: &str) -> Option<Self> {
        let value: JsonValue = serde_json::from_str(value).ok()?;
        Self::from_json(&value)
    }
}

impl TryFrom<RawMessage> for ExtensionMessage {
    type Error = EnvelopeError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        if raw.source != MESSAGE_SOURCE {
            return Err(EnvelopeError::UnknownSource(raw.source));
        }
        let method = ExtensionMethod::from_str(&raw.method)
            .map_err(|_| EnvelopeError::UnknownMethod(raw.method.clone()))?;
        Self::from_parts(method, raw.payload)
    }
}

impl From<ExtensionMessage> for RawMessage {
    fn from(message: ExtensionMessage) -> Self {
        RawMessage {
            source: MESSAGE_SOURCE.to_string(),
            method: message.method().to_string(),
            payload: message.payload.to_json(),
        }
    }
}
