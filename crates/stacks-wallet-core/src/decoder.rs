use std::collections::HashMap;

use base64::Engine;
use kit::constants::{AUTH_REQUEST_PARAM, TRANSACTION_REQUEST_PARAM};
use kit::crypto::verify_es256k;
use kit::serde_json::{self, Value as JsonValue};
use kit::types::message::ExtensionMethod;
use kit::types::request::{DecodedAuthRequest, DecodedRequest, DecodedTransactionRequest};

const ALG_ES256K: &str = "ES256K";
const ALG_NONE: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("token must have two or three segments, found {0}")]
    Segments(usize),
    #[error("segment is not base64url: {0}")]
    Encoding(String),
    #[error("segment is not json: {0}")]
    Json(String),
    #[error("unsupported signing algorithm '{0}'")]
    Algorithm(String),
    #[error("authentication requests must be signed")]
    Unsigned,
    #[error("signed token carries no public key")]
    MissingPublicKey,
    #[error("unsigned token carries a signature")]
    UnexpectedSignature,
    #[error("invalid signature: {0}")]
    Signature(String),
    #[error("signature does not match the token issuer")]
    BadSignature,
    #[error("missing or invalid field: {0}")]
    Field(String),
    #[error("request expired at {0}")]
    Expired(u64),
}

#[derive(Debug, Clone, Deserialize)]
struct TokenHeader {
    alg: String,
}

/// Structurally valid token whose signature has not been checked yet.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    alg: String,
    payload: JsonValue,
    signing_input: String,
    signature: Vec<u8>,
}

impl DecodedToken {
    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn is_signed(&self) -> bool {
        self.alg == ALG_ES256K
    }

    fn verify(&self, public_key: Option<&str>) -> Result<(), DecodeError> {
        if !self.is_signed() {
            if !self.signature.is_empty() {
                return Err(DecodeError::UnexpectedSignature);
            }
            return Ok(());
        }
        let public_key = public_key.ok_or(DecodeError::MissingPublicKey)?;
        match verify_es256k(self.signing_input.as_bytes(), &self.signature, public_key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DecodeError::BadSignature),
            Err(e) => Err(DecodeError::Signature(e)),
        }
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| DecodeError::Encoding(e.to_string()))
}

/// Splits a compact JWS (`header.payload[.signature]`) and decodes its segments.
pub fn decode_token(token: &str) -> Result<DecodedToken, DecodeError> {
    let token = token.trim();
    let segments: Vec<&str> = token.split('.').collect();
    let (header, payload, signature) = match segments.as_slice() {
        [header, payload] => (*header, *payload, ""),
        [header, payload, signature] => (*header, *payload, *signature),
        other => return Err(DecodeError::Segments(other.len())),
    };

    let header: TokenHeader = serde_json::from_slice(&decode_segment(header)?)
        .map_err(|e| DecodeError::Json(e.to_string()))?;
    if header.alg != ALG_ES256K && header.alg != ALG_NONE {
        return Err(DecodeError::Algorithm(header.alg));
    }
    let payload_json: JsonValue = serde_json::from_slice(&decode_segment(payload)?)
        .map_err(|e| DecodeError::Json(e.to_string()))?;
    if !payload_json.is_object() {
        return Err(DecodeError::Json("payload is not an object".into()));
    }

    Ok(DecodedToken {
        alg: header.alg,
        payload: payload_json,
        signing_input: format!("{}.{}", segments[0], segments[1]),
        signature: decode_segment(signature)?,
    })
}

pub fn try_decode_auth_request(
    token: &str,
    now_secs: u64,
) -> Result<DecodedAuthRequest, DecodeError> {
    let decoded = decode_token(token)?;
    let request: DecodedAuthRequest = serde_json::from_value(decoded.payload.clone())
        .map_err(|e| DecodeError::Field(e.to_string()))?;

    if request.public_keys.is_empty() {
        return Err(DecodeError::Field("public_keys".into()));
    }
    let redirect_url =
        request.redirect_url().map_err(|_| DecodeError::Field("redirect_uri".into()))?;
    if !matches!(redirect_url.scheme(), "http" | "https") {
        return Err(DecodeError::Field("redirect_uri".into()));
    }
    if let Some(exp) = request.exp {
        if exp > 0 && exp < now_secs {
            return Err(DecodeError::Expired(exp));
        }
    }

    if !decoded.is_signed() {
        return Err(DecodeError::Unsigned);
    }
    decoded.verify(request.transit_public_key())?;
    Ok(request)
}

pub fn try_decode_transaction_request(
    token: &str,
) -> Result<DecodedTransactionRequest, DecodeError> {
    let decoded = decode_token(token)?;
    let request: DecodedTransactionRequest = serde_json::from_value(decoded.payload.clone())
        .map_err(|e| DecodeError::Field(e.to_string()))?;
    decoded.verify(request.public_key.as_deref())?;
    Ok(request)
}

/// Decodes an authentication request token. Any failure yields `None`: tokens go missing
/// or arrive truncated during ordinary page loads.
pub fn decode_auth_request(token: &str) -> Option<DecodedAuthRequest> {
    try_decode_auth_request(token, now_secs()).ok()
}

pub fn decode_transaction_request(token: &str) -> Option<DecodedTransactionRequest> {
    try_decode_transaction_request(token).ok()
}

pub fn try_decode_request(
    method: ExtensionMethod,
    token: &str,
) -> Result<DecodedRequest, DecodeError> {
    match method {
        ExtensionMethod::AuthenticationRequest => {
            try_decode_auth_request(token, now_secs()).map(DecodedRequest::Authentication)
        }
        ExtensionMethod::TransactionRequest => {
            try_decode_transaction_request(token).map(DecodedRequest::Transaction)
        }
        other => Err(DecodeError::Field(format!("'{other}' does not carry a request"))),
    }
}

pub fn decode_request(method: ExtensionMethod, token: &str) -> Option<DecodedRequest> {
    try_decode_request(method, token).ok()
}

pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Request tokens found in the navigation parameters of a wallet page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub auth_request: Option<String>,
    pub transaction_request: Option<String>,
}

impl RequestParams {
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let mut params: HashMap<String, String> =
            serde_urlencoded::from_str(query).unwrap_or_default();
        let mut take = |key: &str| params.remove(key).filter(|v| !v.trim().is_empty());
        RequestParams {
            auth_request: take(AUTH_REQUEST_PARAM),
            transaction_request: take(TRANSACTION_REQUEST_PARAM),
        }
    }

    pub fn request(&self) -> Option<(ExtensionMethod, &str)> {
        if let Some(token) = &self.auth_request {
            return Some((ExtensionMethod::AuthenticationRequest, token));
        }
        self.transaction_request
            .as_deref()
            .map(|token| (ExtensionMethod::TransactionRequest, token))
    }

    pub fn decode(&self) -> Option<(String, DecodedRequest)> {
        let (method, token) = self.request()?;
        decode_request(method, token).map(|request| (token.to_string(), request))
    }
}

#[cfg(test)]
mod tests {
    use kit::serde_json::json;
    use stacks_wallet_test_utils::tokens::{unsecured_token, TestSigner};
    use test_case::test_case;

    use super::*;

    fn auth_payload(signer: &TestSigner) -> JsonValue {
        json!({
            "jti": "c9f5b3c8",
            "iat": 1_700_000_000u64,
            "exp": 4_000_000_000u64,
            "redirect_uri": "https://app.example.com/",
            "public_keys": [signer.public_key_hex()],
            "scopes": ["store_write"],
            "appDetails": { "name": "Example", "icon": "https://app.example.com/icon.png" },
            "enableGaiaSelection": true,
        })
    }

    #[test]
    fn decodes_signed_auth_request() {
        let signer = TestSigner::new(1);
        let token = signer.sign(&auth_payload(&signer));
        let request = decode_auth_request(&token).unwrap();
        assert_eq!(request.redirect_uri, "https://app.example.com/");
        assert_eq!(request.app_name(), Some("Example"));
        assert!(request.enable_gaia_selection);
    }

    #[test]
    fn rejects_auth_request_signed_by_another_key() {
        let signer = TestSigner::new(1);
        let impostor = TestSigner::new(2);
        let token = impostor.sign(&auth_payload(&signer));
        assert_eq!(
            try_decode_auth_request(&token, 1_700_000_000),
            Err(DecodeError::BadSignature)
        );
    }

    #[test]
    fn rejects_tampered_payload() {
        let signer = TestSigner::new(1);
        let token = signer.sign(&auth_payload(&signer));
        let mut segments: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
        let mut payload = auth_payload(&signer);
        payload["redirect_uri"] = json!("https://evil.example.com/");
        segments[1] = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(payload.to_string().as_bytes());
        assert_eq!(decode_auth_request(&segments.join(".")), None);
    }

    #[test]
    fn rejects_expired_auth_request() {
        let signer = TestSigner::new(1);
        let mut payload = auth_payload(&signer);
        payload["exp"] = json!(1_600_000_000u64);
        let token = signer.sign(&payload);
        assert_eq!(
            try_decode_auth_request(&token, 1_700_000_000),
            Err(DecodeError::Expired(1_600_000_000))
        );
    }

    #[test_case(json!({ "redirect_uri": "javascript:alert(1)" }); "script redirect")]
    #[test_case(json!({ "redirect_uri": "not a url" }); "unparsable redirect")]
    #[test_case(json!({ "public_keys": [] }); "no transit key")]
    fn rejects_auth_request_with_invalid_fields(overrides: JsonValue) {
        let signer = TestSigner::new(1);
        let mut payload = auth_payload(&signer);
        for (key, value) in overrides.as_object().unwrap() {
            payload[key] = value.clone();
        }
        let token = unsecured_token(&payload);
        assert!(matches!(
            try_decode_auth_request(&token, 1_700_000_000),
            Err(DecodeError::Field(_))
        ));
    }

    #[test]
    fn rejects_unsigned_auth_request() {
        let signer = TestSigner::new(1);
        let mut payload = auth_payload(&signer);
        payload["redirect_uri"] = json!("https://evil.example.com/");
        let token = unsecured_token(&payload);
        assert_eq!(try_decode_auth_request(&token, 1_700_000_000), Err(DecodeError::Unsigned));
        assert_eq!(decode_auth_request(&token), None);
    }

    #[test]
    fn accepts_unsigned_transaction_request() {
        let token = unsecured_token(&json!({
            "txType": "token_transfer",
            "recipient": "ST2PHCPANVT8DVPSY5W2ZZ81M285Q5Z8Y6DQMZE7Z",
            "amount": "250",
        }));
        let request = decode_transaction_request(&token).unwrap();
        assert_eq!(request.kind.as_token_transfer().unwrap().amount, 250);
    }

    #[test]
    fn signed_transaction_request_needs_its_public_key() {
        let signer = TestSigner::new(3);
        let payload = json!({
            "txType": "smart_contract",
            "contractName": "hello",
            "codeBody": "(define-public (hello) (ok u1))",
        });
        assert_eq!(
            try_decode_transaction_request(&signer.sign(&payload)).unwrap_err(),
            DecodeError::MissingPublicKey
        );

        let mut payload = payload;
        payload["publicKey"] = json!(signer.public_key_hex());
        assert!(decode_transaction_request(&signer.sign(&payload)).is_some());
    }

    #[test_case(""; "empty")]
    #[test_case("not-a-token"; "single segment")]
    #[test_case("a.b.c.d"; "too many segments")]
    #[test_case("!!!.???.***"; "invalid base64")]
    #[test_case("eyJhbGciOiJIUzI1NiJ9.e30."; "unsupported algorithm")]
    #[test_case("eyJhbGciOiJub25lIn0.WzFd."; "payload not an object")]
    #[test_case("eyJhbGciOiJub25lIn0.e30.c2ln"; "unsigned token with signature")]
    #[test_case("eyJhbGciOiJub25lIn0.e30."; "empty payload")]
    fn decoding_garbage_is_total(token: &str) {
        assert_eq!(decode_auth_request(token), None);
        assert_eq!(decode_transaction_request(token), None);
        for method in [ExtensionMethod::AuthenticationRequest, ExtensionMethod::TransactionRequest]
        {
            assert_eq!(decode_request(method, token), None);
        }
    }

    #[test]
    fn response_methods_do_not_decode_as_requests() {
        let token = unsecured_token(&json!({ "txType": "smart_contract", "contractName": "a", "codeBody": "b" }));
        assert!(decode_request(ExtensionMethod::TransactionResponse, &token).is_none());
    }

    #[test]
    fn reads_tokens_from_navigation_parameters() {
        let params = RequestParams::from_query("?authRequest=abc.def.ghi&other=1");
        assert_eq!(params.auth_request.as_deref(), Some("abc.def.ghi"));
        assert_eq!(params.request(), Some((ExtensionMethod::AuthenticationRequest, "abc.def.ghi")));

        let params = RequestParams::from_query("request=x.y.&authRequest=");
        assert_eq!(params.auth_request, None);
        assert_eq!(params.request(), Some((ExtensionMethod::TransactionRequest, "x.y.")));

        assert_eq!(RequestParams::from_query(""), RequestParams::default());
        assert_eq!(RequestParams::from_query("%%%").request(), None);
    }

    #[test]
    fn decodes_request_found_in_query() {
        let token = unsecured_token(&json!({
            "txType": "contract_call",
            "contractAddress": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            "contractName": "counter",
            "functionName": "increment",
        }));
        let params = RequestParams::from_query(&format!("request={token}"));
        let (decoded_token, request) = params.decode().unwrap();
        assert_eq!(decoded_token, token);
        assert!(request.as_transaction().is_some());
    }
}
