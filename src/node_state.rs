//! `NodeState`, the read-only snapshot contract for the out-of-scope
//! presentation layer (§6: "Read-only consumer of `NodeState = { node_id,
//! blocks, tree, beacon_state, world_state, receipts, mempool, peer_ids,
//! address, public_key }`").

use crate::types::{Address, Hash};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TreeSummary {
    pub block_count: usize,
    pub ghost_head: Hash,
}

#[derive(Debug, Clone, Serialize)]
pub struct BeaconStateSummary {
    pub validator_count: usize,
    pub beacon_pool_size: usize,
    pub latest_attestation_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldStateSummary {
    pub account_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MempoolSummary {
    pub pending_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    pub node_id: String,
    pub address: Address,
    #[serde(serialize_with = "serialize_hex")]
    pub public_key: Vec<u8>,
    pub block_hashes: Vec<Hash>,
    pub tree: TreeSummary,
    pub beacon_state: BeaconStateSummary,
    pub world_state: WorldStateSummary,
    pub mempool: MempoolSummary,
    pub peer_ids: Vec<String>,
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Emitted to `set_on_chain_updated` observers: forward progress carries the
/// newly-applied blocks, a reorganization carries the fully-replayed chain.
#[derive(Debug, Clone)]
pub enum ChainUpdate {
    ForwardProgress { old_head: Hash, new_head: Hash, applied_block_hashes: Vec<Hash> },
    Reorganization { old_head: Hash, new_head: Hash, canonical_chain_hashes: Vec<Hash> },
}
