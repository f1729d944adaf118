//! Data model (§3): headers, blocks, transactions, accounts, validators,
//! attestations and receipts. Canonical serialization for hashing purposes
//! is plain `serde_json` over a struct whose field order is fixed by its
//! declaration, which is deterministic for the fixed-shape values this
//! system hashes (transaction lists, headers) — the spec does not require a
//! merkle-trie commitment scheme (explicitly a non-goal in §1).

use crate::crypto;
use crate::types::{Address, Hash};
use serde::{Deserialize, Serialize};

/// Placeholder carried in `Transaction::signature` for the coinbase
/// transaction, which has no sender to sign with.
pub const COINBASE_SIGNATURE_PLACEHOLDER: &[u8] = b"COINBASE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub slot: u64,
    pub timestamp: u64,
    pub previous_header_hash: Hash,
    pub transaction_hash: Hash,
    pub ceiling: [u8; 32],
    pub nonce: u32,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        let bytes = serde_json::to_vec(self).expect("BlockHeader serialization cannot fail");
        Hash::from_bytes(crypto::sha256(&bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub validator_address: Address,
    pub block_hash: Hash,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: Hash,
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub nonce: u64,
    pub timestamp: u64,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub data: Option<Vec<u8>>,
}

#[derive(Serialize)]
struct TxidPayload {
    from: Address,
    to: Address,
    value: u128,
    nonce: u64,
    timestamp: u64,
}

#[derive(Serialize)]
struct SignaturePayload {
    txid: Hash,
}

/// `SHA256(JSON({from, to, value, nonce, timestamp}))`, computed before
/// signing so the signature can cover it.
pub fn compute_txid(from: Address, to: Address, value: u128, nonce: u64, timestamp: u64) -> Hash {
    let payload = TxidPayload { from, to, value, nonce, timestamp };
    let bytes = serde_json::to_vec(&payload).expect("TxidPayload serialization cannot fail");
    Hash::from_bytes(crypto::sha256(&bytes))
}

/// The message hash a non-coinbase transaction's signature is taken over:
/// `SHA256(JSON({txid}))`.
pub fn signature_message_hash(txid: Hash) -> [u8; 32] {
    let payload = SignaturePayload { txid };
    let bytes = serde_json::to_vec(&payload).expect("SignaturePayload serialization cannot fail");
    crypto::sha256(&bytes)
}

impl Transaction {
    pub fn coinbase(
        rewarder_sentinel: Address,
        proposer: Address,
        block_reward: u128,
        timestamp: u64,
    ) -> Transaction {
        let txid = compute_txid(rewarder_sentinel, proposer, block_reward, 0, timestamp);
        Transaction {
            txid,
            from: rewarder_sentinel,
            to: proposer,
            value: block_reward,
            nonce: 0,
            timestamp,
            public_key: Vec::new(),
            signature: COINBASE_SIGNATURE_PLACEHOLDER.to_vec(),
            data: None,
        }
    }

    pub fn new_signed(
        from: Address,
        to: Address,
        value: u128,
        nonce: u64,
        timestamp: u64,
        public_key: Vec<u8>,
        signing_key: &k256::ecdsa::SigningKey,
        data: Option<Vec<u8>>,
    ) -> Transaction {
        let txid = compute_txid(from, to, value, nonce, timestamp);
        let message_hash = signature_message_hash(txid);
        let signature = crypto::ecdsa_sign(&message_hash, signing_key);
        Transaction { txid, from, to, value, nonce, timestamp, public_key, signature, data }
    }

    pub fn is_coinbase(&self, rewarder_sentinel: Address) -> bool {
        self.from == rewarder_sentinel
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub attestations: Vec<Attestation>,
    /// BLS signature over `"RANDAO_REVEAL_<epoch>"`; `None` only for genesis.
    #[serde(with = "opt_hex_bytes")]
    pub randao_reveal: Option<Vec<u8>>,
    pub hash: Hash,
}

mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(s).map_err(serde::de::Error::custom)).transpose()
    }
}

impl Block {
    pub fn transaction_hash(transactions: &[Transaction]) -> Hash {
        let bytes = serde_json::to_vec(transactions).expect("transaction list serialization cannot fail");
        Hash::from_bytes(crypto::sha256(&bytes))
    }

    /// Recomputes `header.hash()` and stores it in `self.hash`, as a
    /// proposer does once the header's nonce search has settled.
    pub fn finalize_hash(&mut self) {
        self.hash = self.header.hash();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub balance: u128,
    pub nonce: u64,
    pub code: Option<Vec<u8>>,
    pub storage: Option<Vec<u8>>,
    pub code_hash: Option<Hash>,
}

impl Account {
    pub fn new(address: Address) -> Account {
        Account { address, balance: 0, nonce: 0, code: None, storage: None, code_hash: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub node_address: Address,
    pub staked_eth: u64,
    /// Compressed secp256k1 public key, used to derive `node_address` and to
    /// verify transactions the validator's node originates.
    pub ecdsa_public_key: Vec<u8>,
    /// Compressed BLS12-381 public key, used to verify this validator's
    /// RANDAO reveals when it proposes.
    pub bls_public_key: Vec<u8>,
}

impl Validator {
    /// Weight used by fork-choice and proposer election; validators staking
    /// zero are excluded (a validator "stakes at least 0").
    pub fn is_active(&self) -> bool {
        self.staked_eth > 0
    }

    pub fn effective_balance(&self, max_effective_balance: u128) -> u128 {
        (self.staked_eth as u128).min(max_effective_balance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub txid: Hash,
    pub status: ReceiptStatus,
    pub from: Address,
    pub to: Address,
    pub value: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_is_identified_by_sentinel() {
        let sentinel = Address::zero();
        let proposer = Address::from_bytes([9u8; 32]);
        let tx = Transaction::coinbase(sentinel, proposer, 4, 1000);
        assert!(tx.is_coinbase(sentinel));
        assert_eq!(tx.signature, COINBASE_SIGNATURE_PLACEHOLDER);
    }

    #[test]
    fn txid_is_deterministic_and_order_sensitive() {
        let a = Address::from_bytes([1u8; 32]);
        let b = Address::from_bytes([2u8; 32]);
        let t1 = compute_txid(a, b, 5, 0, 100);
        let t2 = compute_txid(a, b, 5, 0, 100);
        let t3 = compute_txid(b, a, 5, 0, 100);
        assert_eq!(t1, t2);
        assert_ne!(t1, t3);
    }

    #[test]
    fn signed_transaction_verifies() {
        let seed = crypto::sha256(b"alice");
        let sk = crypto::ecdsa_signing_key_from_seed(&seed).unwrap();
        let pubkey = crypto::ecdsa_public_key(&sk);
        let from = crypto::derive_address(&pubkey);
        let to = Address::from_bytes([5u8; 32]);
        let tx = Transaction::new_signed(from, to, 1, 0, 100, pubkey.clone(), &sk, None);
        let hash = signature_message_hash(tx.txid);
        assert!(crypto::ecdsa_verify(&tx.signature, &hash, &pubkey));
    }
}
