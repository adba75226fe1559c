use libsecp256k1::{Message, PublicKey, Signature};
use sha2::{Digest, Sha256, Sha512_256};

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Stacks transaction ids are the SHA-512/256 digest of the serialized transaction.
pub fn transaction_id(tx_bytes: &[u8]) -> String {
    let digest: [u8; 32] = Sha512_256::digest(tx_bytes).into();
    hex::encode(digest)
}

pub fn parse_public_key(public_key_hex: &str) -> Result<PublicKey, String> {
    let bytes = hex::decode(public_key_hex.trim_start_matches("0x"))
        .map_err(|e| format!("public key is not hex: {e}"))?;
    PublicKey::parse_slice(&bytes, None).map_err(|e| format!("invalid public key: {e:?}"))
}

/// Verifies a compact (`r || s`) ES256K signature over `sha256(signing_input)`.
pub fn verify_es256k(
    signing_input: &[u8],
    signature: &[u8],
    public_key_hex: &str,
) -> Result<bool, String> {
    let public_key = parse_public_key(public_key_hex)?;
    let signature = Signature::parse_standard_slice(signature)
        .map_err(|e| format!("invalid signature encoding: {e:?}"))?;
    let message = Message::parse(&sha256(signing_input));
    Ok(libsecp256k1::verify(&message, &signature, &public_key))
}

#[cfg(test)]
mod tests {
    use libsecp256k1::SecretKey;

    use super::*;

    fn keypair() -> (SecretKey, String) {
        let secret_key = SecretKey::parse(&[7u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(&secret_key);
        (secret_key, hex::encode(public_key.serialize_compressed()))
    }

    #[test]
    fn verifies_signature_produced_by_matching_key() {
        let (secret_key, public_key) = keypair();
        let input = b"header.payload";
        let (signature, _) = libsecp256k1::sign(&Message::parse(&sha256(input)), &secret_key);

        assert_eq!(verify_es256k(input, &signature.serialize(), &public_key), Ok(true));
        assert_eq!(verify_es256k(b"header.tampered", &signature.serialize(), &public_key), Ok(false));
    }

    #[test]
    fn rejects_malformed_inputs() {
        let (_, public_key) = keypair();
        assert!(verify_es256k(b"input", &[1u8; 10], &public_key).is_err());
        assert!(verify_es256k(b"input", &[1u8; 64], "not-hex").is_err());
        assert!(verify_es256k(b"input", &[1u8; 64], "02abcd").is_err());
    }

    #[test]
    fn transaction_id_is_hex_digest() {
        let id = transaction_id(&[0u8; 4]);
        assert_eq!(id.len(), 64);
        assert_ne!(id, transaction_id(&[1u8; 4]));
    }
}
