use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";
const PEM_LINE_WIDTH: usize = 64;

// DER SubjectPublicKeyInfo prefix for an uncompressed secp256k1 point
// (id-ecPublicKey, secp256k1, BIT STRING of 66 bytes).
const SPKI_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];
const UNCOMPRESSED_KEY_LEN: usize = 65;
const SCALAR_LEN: usize = 32;
const ADDRESS_LEN: usize = 20;

#[derive(Error, PartialEq, Debug)]
pub enum VerificationError {
    #[error("Malformed public key")]
    MalformedPublicKey,
    #[error("Malformed signature")]
    MalformedSignature,
}

/// ECDSA signature as the `(r, s)` pair, each a hex encoded 32-byte scalar.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSignature(pub String, pub String);

#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    pub fn generate() -> KeyPair {
        let (secret_key, public_key) = SECP256K1.generate_keypair(&mut OsRng);

        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn public_key_pem(&self) -> String {
        encode_public_key_pem(&self.public_key)
    }

    pub fn address(&self) -> String {
        address_from_key(&self.public_key)
    }

    /// Signs the canonical JSON form of `message`. RFC 6979 nonces make the
    /// result deterministic for a given key and message.
    pub fn sign<T: Serialize>(&self, message: &T) -> TransactionSignature {
        let digest = message_digest(message);
        let compact = SECP256K1
            .sign_ecdsa(&digest, &self.secret_key)
            .serialize_compact();
        let (r, s) = compact.split_at(SCALAR_LEN);

        TransactionSignature(hex::encode(r), hex::encode(s))
    }
}

/// Checks `signature` over `message` against a PEM encoded public key.
/// Malformed keys or signatures count as a failed verification.
pub fn verify<T: Serialize>(
    public_key_pem: &str,
    message: &T,
    signature: &TransactionSignature,
) -> bool {
    match try_verify(public_key_pem, message, signature) {
        Ok(is_valid) => is_valid,
        Err(err) => {
            debug!("Signature verification failed: {}", err);
            false
        }
    }
}

fn try_verify<T: Serialize>(
    public_key_pem: &str,
    message: &T,
    signature: &TransactionSignature,
) -> Result<bool, VerificationError> {
    let public_key = decode_public_key_pem(public_key_pem)?;
    let signature = decode_signature(signature)?;
    let digest = message_digest(message);

    Ok(SECP256K1
        .verify_ecdsa(&digest, &signature, &public_key)
        .is_ok())
}

/// Address owned by a PEM encoded public key: the hex encoded first
/// `ADDRESS_LEN` bytes of the SHA-256 of its uncompressed SEC1 form.
pub fn address_of(public_key_pem: &str) -> Result<String, VerificationError> {
    decode_public_key_pem(public_key_pem).map(|public_key| address_from_key(&public_key))
}

fn address_from_key(public_key: &PublicKey) -> String {
    let digest = Sha256::digest(public_key.serialize_uncompressed());

    hex::encode(&digest[..ADDRESS_LEN])
}

/// Canonical serialization shared by signing, verification and block hashing.
/// Every hashed type is built from strings, integers, sequences and ordered
/// maps, so serialization is infallible and field order is fixed.
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("hashed types always serialize")
}

fn message_digest<T: Serialize>(message: &T) -> Message {
    let digest: [u8; 32] = Sha256::digest(canonical_json(message).as_bytes()).into();

    Message::from_digest(digest)
}

fn decode_signature(signature: &TransactionSignature) -> Result<Signature, VerificationError> {
    let r = hex::decode(&signature.0).map_err(|_| VerificationError::MalformedSignature)?;
    let s = hex::decode(&signature.1).map_err(|_| VerificationError::MalformedSignature)?;

    if r.len() != SCALAR_LEN || s.len() != SCALAR_LEN {
        return Err(VerificationError::MalformedSignature);
    }

    let compact = [r, s].concat();
    Signature::from_compact(&compact).map_err(|_| VerificationError::MalformedSignature)
}

fn encode_public_key_pem(public_key: &PublicKey) -> String {
    let der = [&SPKI_PREFIX[..], &public_key.serialize_uncompressed()[..]].concat();
    let body = STANDARD.encode(der);

    let mut pem = String::from(PEM_HEADER);
    pem.push('\n');
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem.push('\n');

    pem
}

fn decode_public_key_pem(pem: &str) -> Result<PublicKey, VerificationError> {
    let trimmed = pem.trim();
    let body = trimmed
        .strip_prefix(PEM_HEADER)
        .and_then(|rest| rest.strip_suffix(PEM_FOOTER))
        .ok_or(VerificationError::MalformedPublicKey)?;

    let body: String = body.split_whitespace().collect();
    let der = STANDARD
        .decode(body)
        .map_err(|_| VerificationError::MalformedPublicKey)?;

    match der.strip_prefix(&SPKI_PREFIX[..]) {
        Some(point) if point.len() == UNCOMPRESSED_KEY_LEN => {
            PublicKey::from_slice(point).map_err(|_| VerificationError::MalformedPublicKey)
        }
        _ => Err(VerificationError::MalformedPublicKey),
    }
}
