//! In-process binding of multiple `Node`s (§2): a broadcast/direct-message
//! switch plus the genesis bootstrap every node must observe identically to
//! ever converge. There is no real network here — `tick`/`sync_round` just
//! call into each `Node`'s event entry points in a fixed order, matching the
//! single-threaded cooperative model of §5 applied one level up.

use crate::config::SimulatorConfig;
use crate::engine;
use crate::error::CryptoError;
use crate::model::{Block, BlockHeader, Transaction, Validator};
use crate::node::{Node, NodeIdentity};
use crate::node_state::NodeState;
use crate::sync::SyncMessage;
use crate::types::{Address, Hash};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use tracing::debug;

/// Builds the single shared genesis block every node in a `Network` starts
/// from. Genesis carries no RANDAO reveal or attestations (§3: "`None` only
/// for genesis") and its coinbase credits `miner`.
pub fn build_genesis_block(config: &SimulatorConfig, miner: Address, timestamp: u64) -> Block {
    let coinbase = Transaction::coinbase(config.rewarder_sentinel, miner, config.block_reward, timestamp);
    let transactions = vec![coinbase];
    let transaction_hash = Block::transaction_hash(&transactions);
    let mut header = BlockHeader {
        height: 0,
        slot: 0,
        timestamp,
        previous_header_hash: config.genesis_prev_hash,
        transaction_hash,
        ceiling: config.ceiling,
        nonce: 0,
    };
    let cancel = AtomicBool::new(false);
    engine::mine_nonce(&mut header, &config.ceiling, config.mining_batch_size, &cancel);
    let mut block = Block { header, transactions, attestations: vec![], randao_reveal: None, hash: Hash::zero() };
    block.finalize_hash();
    block
}

pub struct Network {
    config: SimulatorConfig,
    nodes: HashMap<String, Node>,
    node_order: Vec<String>,
}

impl Network {
    /// Every node id becomes a validator with `stake_per_validator` stake,
    /// its identity deterministically derived from its id (§6). All nodes
    /// receive the identical genesis block before the first `tick`.
    pub fn new(
        config: SimulatorConfig,
        node_ids: Vec<String>,
        stake_per_validator: u64,
        genesis_time: u64,
    ) -> Result<Network, CryptoError> {
        let mut validators = Vec::with_capacity(node_ids.len());
        for id in &node_ids {
            let identity = NodeIdentity::derive(id)?;
            validators.push(Validator {
                node_address: identity.address,
                staked_eth: stake_per_validator,
                ecdsa_public_key: identity.ecdsa_public_key,
                bls_public_key: identity.bls_public_key,
            });
        }

        let mut nodes = HashMap::new();
        for id in &node_ids {
            let mut node = Node::new(id.clone(), config.clone(), validators.clone(), genesis_time)?;
            let peers = node_ids.iter().filter(|peer| *peer != id).cloned().collect();
            node.set_peers(peers);
            nodes.insert(id.clone(), node);
        }

        let genesis_miner = validators.first().map(|v| v.node_address).unwrap_or_else(Address::zero);
        let genesis = build_genesis_block(&config, genesis_miner, genesis_time);
        for id in &node_ids {
            let node = nodes.get_mut(id).expect("just inserted above");
            node.receive_block(genesis.clone()).expect("genesis always extends an empty tree");
        }

        Ok(Network { config, nodes, node_order: node_ids })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn node_ids(&self) -> &[String] {
        &self.node_order
    }

    pub fn submit_transaction(&mut self, node_id: &str, tx: Transaction) -> bool {
        self.nodes.get_mut(node_id).map(|node| node.submit_transaction(tx)).unwrap_or(false)
    }

    pub fn snapshot_all(&self) -> Vec<NodeState> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id)).map(|node| node.snapshot()).collect()
    }

    /// Advances every node one slot, in a fixed order, then fans out whatever
    /// each node produced (a proposed block, an attestation) to every other
    /// node via their `receive_block`/`receive_attestation` entry points —
    /// the direct-message half of the broadcast/direct-message switch.
    pub fn tick(&mut self, slot: u64, timestamp: u64) {
        let _span = tracing::debug_span!("network_tick", slot).entered();
        let mut proposed_blocks = Vec::new();
        let mut emitted_attestations = Vec::new();

        for id in &self.node_order {
            let node = self.nodes.get_mut(id).expect("node_order entries always exist in nodes");
            let output = node.tick(slot, timestamp);
            if let Some(block) = output.proposed_block {
                proposed_blocks.push((id.clone(), block));
            }
            if let Some(attestation) = output.attestation {
                emitted_attestations.push((id.clone(), attestation));
            }
        }

        for (origin, block) in &proposed_blocks {
            for id in &self.node_order {
                if id == origin {
                    continue;
                }
                if let Some(node) = self.nodes.get_mut(id) {
                    let _ = node.receive_block(block.clone());
                }
            }
        }

        for (origin, attestation) in &emitted_attestations {
            for id in &self.node_order {
                if id == origin {
                    continue;
                }
                if let Some(node) = self.nodes.get_mut(id) {
                    node.receive_attestation(attestation.clone());
                }
            }
        }
    }

    /// One round of the periodic head-broadcast protocol (§4.8, "default
    /// once per second"): every node announces its head to every peer; a
    /// peer that doesn't recognize it requests and applies the chain behind
    /// it. Recovers from a block a node missed during `tick`'s direct
    /// fan-out (e.g. because it wasn't a peer at broadcast time).
    pub fn sync_round(&mut self) {
        debug!(node_count = self.node_order.len(), "starting sync round");
        let broadcasts: Vec<(String, crate::sync::HeadBroadcast)> =
            self.node_order.iter().map(|id| (id.clone(), self.nodes[id].head_broadcast())).collect();

        for (origin, broadcast) in &broadcasts {
            for id in &self.node_order {
                if id == origin {
                    continue;
                }
                let Some(node) = self.nodes.get_mut(id) else { continue };
                let reply = node.receive_message(SyncMessage::HeadBroadcast(broadcast.clone()));
                let Some(SyncMessage::ChainRequest(request)) = reply else { continue };

                let Some(responder) = self.nodes.get_mut(origin) else { continue };
                let reply = responder.receive_message(SyncMessage::ChainRequest(request));
                let Some(SyncMessage::ChainResponse(response)) = reply else { continue };

                if let Some(requester) = self.nodes.get_mut(id) {
                    requester.receive_message(SyncMessage::ChainResponse(response));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_converge_on_the_same_head_after_several_slots() {
        let config = SimulatorConfig::default();
        let ids = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];
        let mut network = Network::new(config.clone(), ids.clone(), 32, 0).unwrap();

        for slot in 1..10 {
            network.tick(slot, slot * config.seconds_per_slot * 1000);
        }

        let heads: Vec<Hash> = ids.iter().map(|id| network.node(id).unwrap().head_hash()).collect();
        assert!(heads.iter().all(|h| *h == heads[0]), "all nodes must agree on GHOST-HEAD");
    }

    #[test]
    fn genesis_is_identical_across_all_nodes() {
        let config = SimulatorConfig::default();
        let ids = vec!["n1".to_string(), "n2".to_string()];
        let network = Network::new(config, ids.clone(), 32, 0).unwrap();
        let genesis_hashes: Vec<Hash> =
            ids.iter().map(|id| network.node(id).unwrap().snapshot().block_hashes[0]).collect();
        assert_eq!(genesis_hashes[0], genesis_hashes[1]);
    }

    #[test]
    fn submit_transaction_reaches_the_named_nodes_mempool() {
        let config = SimulatorConfig::default();
        let ids = vec!["solo".to_string()];
        let mut network = Network::new(config, ids, 32, 0).unwrap();

        let seed = crate::crypto::sha256(b"payer");
        let sk = crate::crypto::ecdsa_signing_key_from_seed(&seed).unwrap();
        let pk = crate::crypto::ecdsa_public_key(&sk);
        let from = crate::crypto::derive_address(&pk);
        let to = Address::from_bytes([9; 32]);
        let tx = Transaction::new_signed(from, to, 1, 0, 1, pk, &sk, None);

        assert!(network.submit_transaction("solo", tx));
        assert_eq!(network.node("solo").unwrap().mempool_len(), 1);
    }
}
