//! Key and credential primitives for the Lattice hub.
//!
//! Two distinct trust directions live here and must not be conflated:
//!
//! - **Node proving itself to the hub**: each node holds an Ed25519
//!   private key and signs its outbound event payloads; the hub
//!   verifies the detached signature against the node's registered
//!   public key ([`verify_signed_message`]).
//! - **Hub proving itself to a node**: the hub presents an application
//!   credential pair as an HTTP Basic `Authorization` header
//!   ([`basic_auth_header`]).
//!
//! Keys and signatures are hex-encoded on the wire and in storage; the
//! per-node symmetric secret key is base64-encoded. All randomness
//! comes from the OS CSPRNG through the fallible fill path — if the
//! entropy source is unavailable the operation fails loudly rather
//! than falling back to anything weaker.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Number of random bytes in a node secret key (256 bits).
const SECRET_KEY_BYTES: usize = 32;

/// Errors that can occur during key generation or message verification.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The OS random source was unavailable. Fatal for the operation;
    /// there is deliberately no fallback key path.
    #[error("entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),

    /// Key or signature material was not valid hex.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Decoded key material had the wrong length for Ed25519.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected byte length.
        expected: usize,
        /// Actual decoded length.
        actual: usize,
    },

    /// Decoded signature had the wrong length for Ed25519.
    #[error("invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// The public key bytes did not decode to a valid curve point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(ed25519_dalek::SignatureError),

    /// The signature did not verify against the given public key.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// A freshly generated Ed25519 key pair, hex-encoded.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Hex-encoded 32-byte signing key. Handed to the node once at
    /// registration; the hub retains it only for reissue.
    pub private_key: String,
    /// Hex-encoded 32-byte verifying key.
    pub public_key: String,
}

/// Generates a 256-bit symmetric secret key, base64-encoded.
///
/// Called at most once per node: the registry checks for an existing
/// key before calling this (check-then-set, never overwrite).
///
/// # Errors
///
/// Returns [`CryptoError::Entropy`] if the OS random source fails.
pub fn generate_secret_key() -> Result<String, CryptoError> {
    let mut bytes = [0u8; SECRET_KEY_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(BASE64.encode(bytes))
}

/// Generates a new Ed25519 key pair for a node.
///
/// # Errors
///
/// Returns [`CryptoError::Entropy`] if the OS random source fails.
pub fn generate_key_pair() -> Result<KeyPair, CryptoError> {
    let mut seed = [0u8; 32];
    OsRng.try_fill_bytes(&mut seed)?;
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();

    Ok(KeyPair {
        private_key: hex::encode(signing_key.to_bytes()),
        public_key: hex::encode(verifying_key.to_bytes()),
    })
}

/// Signs a message with a hex-encoded private key, returning the
/// detached signature as hex.
///
/// The hub itself never signs events; this exists for node-side tooling
/// and for exercising the verification path in tests.
pub fn sign_message(message: &[u8], private_key_hex: &str) -> Result<String, CryptoError> {
    let key_bytes = decode_key_bytes(private_key_hex)?;
    let signing_key = SigningKey::from_bytes(&key_bytes);
    let signature = signing_key.sign(message);
    Ok(hex::encode(signature.to_bytes()))
}

/// Verifies a detached signature over a message against a hex-encoded
/// public key.
///
/// # Errors
///
/// Malformed hex, wrong-length material, and an invalid curve point are
/// each reported distinctly; a well-formed signature that does not
/// match yields [`CryptoError::VerificationFailed`]. Callers must never
/// treat any error here as a verified message.
pub fn verify_signed_message(
    message: &[u8],
    signature_hex: &str,
    public_key_hex: &str,
) -> Result<(), CryptoError> {
    let key_bytes = decode_key_bytes(public_key_hex)?;
    let public_key = VerifyingKey::from_bytes(&key_bytes).map_err(CryptoError::InvalidPublicKey)?;

    let signature_bytes = hex::decode(signature_hex)?;
    let signature_bytes: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| CryptoError::InvalidSignatureLength(bytes.len()))?;
    let signature = Signature::from_bytes(&signature_bytes);

    public_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Builds an HTTP Basic `Authorization` header value from an
/// application credential pair.
pub fn basic_auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{user}:{pass}")))
}

fn decode_key_bytes(key_hex: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = hex::decode(key_hex)?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })
}
