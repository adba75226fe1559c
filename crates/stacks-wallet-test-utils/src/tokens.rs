use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use kit::crypto::sha256;
use kit::hex;
use kit::secp256k1::{self, Message, PublicKey, SecretKey};
use kit::serde_json::{json, Value as JsonValue};

fn encode_segment(value: &JsonValue) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string().as_bytes())
}

/// `alg: none` token, as issued by apps that do not sign their requests.
pub fn unsecured_token(payload: &JsonValue) -> String {
    format!(
        "{}.{}.",
        encode_segment(&json!({ "typ": "JWT", "alg": "none" })),
        encode_segment(payload)
    )
}

/// Issues ES256K request tokens from a deterministic key.
#[derive(Debug, Clone)]
pub struct TestSigner {
    secret_key: SecretKey,
}

impl TestSigner {
    /// `seed` must be non-zero.
    pub fn new(seed: u8) -> Self {
        let secret_key = SecretKey::parse(&[seed.max(1); 32]).expect("valid secret key");
        Self { secret_key }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(PublicKey::from_secret_key(&self.secret_key).serialize_compressed())
    }

    pub fn sign(&self, payload: &JsonValue) -> String {
        let signing_input = format!(
            "{}.{}",
            encode_segment(&json!({ "typ": "JWT", "alg": "ES256K" })),
            encode_segment(payload)
        );
        let message = Message::parse(&sha256(signing_input.as_bytes()));
        let (signature, _) = secp256k1::sign(&message, &self.secret_key);
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.serialize()))
    }
}
