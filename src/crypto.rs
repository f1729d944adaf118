//! Trusted cryptographic primitives (§6 Collaborator: cryptography).
//!
//! These are bit-exact contracts the rest of the engine treats as given:
//! SHA-256 for hashing and address derivation, ECDSA over secp256k1 (via
//! `k256`) for transaction/structural signatures, and BLS12-381 (via `blst`)
//! for RANDAO reveals. The API shapes mirror the spec's §6 function list
//! (`sha256`, `ecdsa_sign`/`ecdsa_verify`, `bls_sign`/`bls_verify`/
//! `bls_aggregate`, deterministic key derivation) rather than any one
//! upstream crate's naming.

use crate::error::CryptoError;
use crate::types::Address;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// Domain separation tag for BLS signatures, as mandated by the IETF
/// hash-to-curve draft that `blst`'s `min_pk` sign/verify implement.
const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Salt mixed into a node's id to deterministically derive its private key
/// material, per §6's "Deterministic key derivation" contract.
const PRIVATE_KEY_SALT: &str = "PRIVATE_KEY_SALT";

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `priv = SHA256(utf8(node_id || "PRIVATE_KEY_SALT"))`.
pub fn derive_node_seed(node_id: &str) -> [u8; 32] {
    let mut buf = String::with_capacity(node_id.len() + PRIVATE_KEY_SALT.len());
    buf.push_str(node_id);
    buf.push_str(PRIVATE_KEY_SALT);
    sha256(buf.as_bytes())
}

/// `SHA256(compressed_public_key)`, rendered as an `Address`.
pub fn derive_address(compressed_public_key: &[u8]) -> Address {
    Address::from_bytes(sha256(compressed_public_key))
}

// ---- ECDSA / secp256k1 ----

pub fn ecdsa_signing_key_from_seed(seed: &[u8; 32]) -> Result<SigningKey, CryptoError> {
    SigningKey::from_bytes(seed.into()).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Compressed SEC1 public key bytes for a signing key.
pub fn ecdsa_public_key(signing_key: &SigningKey) -> Vec<u8> {
    let verifying_key = VerifyingKey::from(signing_key);
    verifying_key.to_encoded_point(true).as_bytes().to_vec()
}

pub fn ecdsa_sign(message_hash: &[u8; 32], signing_key: &SigningKey) -> Vec<u8> {
    let sig: EcdsaSignature = signing_key.sign(message_hash);
    sig.to_bytes().to_vec()
}

pub fn ecdsa_verify(signature: &[u8], message_hash: &[u8], compressed_public_key: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(compressed_public_key) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify(message_hash, &sig).is_ok()
}

// ---- BLS12-381 ----

pub fn bls_secret_key(seed: &[u8; 32]) -> Result<blst::min_pk::SecretKey, CryptoError> {
    blst::min_pk::SecretKey::key_gen(seed, &[]).map_err(|_| CryptoError::InvalidPrivateKey)
}

pub fn bls_public_key(secret_key: &blst::min_pk::SecretKey) -> Vec<u8> {
    secret_key.sk_to_pk().to_bytes().to_vec()
}

pub fn bls_sign(message: &[u8], secret_key: &blst::min_pk::SecretKey) -> Vec<u8> {
    secret_key.sign(message, BLS_DST, &[]).to_bytes().to_vec()
}

pub fn bls_verify(signature: &[u8], message: &[u8], compressed_public_key: &[u8]) -> bool {
    let Ok(sig) = blst::min_pk::Signature::from_bytes(signature) else {
        return false;
    };
    let Ok(pk) = blst::min_pk::PublicKey::from_bytes(compressed_public_key) else {
        return false;
    };
    sig.verify(true, message, BLS_DST, &[], &pk, true) == blst::BLST_ERROR::BLST_SUCCESS
}

/// Aggregates BLS signatures that share no message-domain assumptions beyond
/// the single `RANDAO_REVEAL_<epoch>` string each was produced over.
pub fn bls_aggregate(signatures: &[Vec<u8>]) -> Result<Vec<u8>, CryptoError> {
    let mut parsed = Vec::with_capacity(signatures.len());
    for sig in signatures {
        parsed.push(
            blst::min_pk::Signature::from_bytes(sig).map_err(|_| CryptoError::InvalidSignature)?,
        );
    }
    let refs: Vec<&blst::min_pk::Signature> = parsed.iter().collect();
    let first = refs.first().ok_or(CryptoError::EmptyAggregation)?;
    let mut agg = blst::min_pk::AggregateSignature::from_signature(first);
    for sig in &refs[1..] {
        agg.add_signature(sig, true).map_err(|_| CryptoError::InvalidSignature)?;
    }
    Ok(agg.to_signature().to_bytes().to_vec())
}

/// The UTF-8 message every RANDAO reveal is a BLS signature over.
pub fn randao_reveal_message(epoch: u64) -> Vec<u8> {
    format!("RANDAO_REVEAL_{epoch}").into_bytes()
}
