//! `Node`, owner of the per-node collaborating components (§2), exposing the
//! single-threaded cooperative event entry points of §5: `tick`,
//! `receive_block`, `receive_attestation`, `receive_message`,
//! `submit_transaction`. Each runs to completion before the next begins;
//! there is no internal concurrency here for `Network` to race against.

use crate::beacon_state::BeaconState;
use crate::collaborators::{NoOpTxProvider, OptionalTxProvider};
use crate::config::SimulatorConfig;
use crate::crypto;
use crate::engine::{self, ProposerIdentity, SlotState};
use crate::error::{BlockValidationError, CryptoError, EngineError};
use crate::mempool::Mempool;
use crate::model::{Attestation, Block, Transaction, Validator};
use crate::node_state::{BeaconStateSummary, ChainUpdate, MempoolSummary, NodeState, TreeSummary, WorldStateSummary};
use crate::proposer_election;
use crate::sync::{self, SyncMessage};
use crate::tree::BlockTree;
use crate::fork_choice;
use crate::types::{Address, Hash};
use crate::validation;
use crate::world_state::WorldState;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A node's cryptographic identity, deterministically derived from its id
/// (§6 "Deterministic key derivation: `priv = SHA256(utf8(node_id ||
/// "PRIVATE_KEY_SALT"))`"). The same seed feeds both the ECDSA transaction
/// key and the BLS RANDAO key; the spec names one derivation formula and
/// does not distinguish key purposes.
pub struct NodeIdentity {
    pub address: Address,
    pub ecdsa_signing_key: k256::ecdsa::SigningKey,
    pub ecdsa_public_key: Vec<u8>,
    pub bls_secret_key: blst::min_pk::SecretKey,
    pub bls_public_key: Vec<u8>,
}

impl NodeIdentity {
    pub fn derive(node_id: &str) -> Result<NodeIdentity, CryptoError> {
        let seed = crypto::derive_node_seed(node_id);
        let ecdsa_signing_key = crypto::ecdsa_signing_key_from_seed(&seed)?;
        let ecdsa_public_key = crypto::ecdsa_public_key(&ecdsa_signing_key);
        let address = crypto::derive_address(&ecdsa_public_key);
        let bls_secret_key = crypto::bls_secret_key(&seed)?;
        let bls_public_key = crypto::bls_public_key(&bls_secret_key);
        Ok(NodeIdentity { address, ecdsa_signing_key, ecdsa_public_key, bls_secret_key, bls_public_key })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Already present in the tree; no-op.
    AlreadyKnown,
    /// Inserted but not canonical-extending (§4.5 step 4).
    Fork,
    /// Inserted, canonical-extending, but failed structural validation; kept
    /// in the tree with `is_invalid = true` so fork-choice routes around it.
    Invalid(BlockValidationError),
    /// Validated, applied, and became the new head.
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationOutcome {
    Duplicate,
    NoChange,
    ForwardProgress { applied: usize },
    Reorganization { chain_len: usize },
}

#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub proposed_block: Option<Block>,
    pub attestation: Option<Attestation>,
}

pub struct Node {
    node_id: String,
    config: SimulatorConfig,
    address: Address,
    #[allow(dead_code)]
    ecdsa_signing_key: k256::ecdsa::SigningKey,
    ecdsa_public_key: Vec<u8>,
    bls_secret_key: blst::min_pk::SecretKey,
    #[allow(dead_code)]
    bls_public_key: Vec<u8>,

    tree: BlockTree,
    beacon_state: BeaconState,
    world_state: WorldState,
    mempool: Mempool,

    head: Option<Hash>,
    slot_state: SlotState,
    attested_slots: HashSet<u64>,
    mining_cancel: Arc<AtomicBool>,

    tx_provider: Box<dyn OptionalTxProvider>,
    peer_ids: Vec<String>,

    on_chain_updated: Option<Box<dyn FnMut(&ChainUpdate)>>,
    on_block_broadcast: Option<Box<dyn FnMut(&Block)>>,
    on_attestation_broadcast: Option<Box<dyn FnMut(&Attestation)>>,
}

impl Node {
    pub fn new(
        node_id: String,
        config: SimulatorConfig,
        validators: Vec<Validator>,
        genesis_time: u64,
    ) -> Result<Node, CryptoError> {
        let identity = NodeIdentity::derive(&node_id)?;
        let tree = BlockTree::new(config.genesis_prev_hash);
        let beacon_state = BeaconState::new(genesis_time, validators);
        Ok(Node {
            node_id,
            config,
            address: identity.address,
            ecdsa_signing_key: identity.ecdsa_signing_key,
            ecdsa_public_key: identity.ecdsa_public_key,
            bls_secret_key: identity.bls_secret_key,
            bls_public_key: identity.bls_public_key,
            tree,
            beacon_state,
            world_state: WorldState::new(),
            mempool: Mempool::new(),
            head: None,
            slot_state: SlotState::Idle,
            attested_slots: HashSet::new(),
            mining_cancel: engine::new_cancel_flag(),
            tx_provider: Box::new(NoOpTxProvider),
            peer_ids: Vec::new(),
            on_chain_updated: None,
            on_block_broadcast: None,
            on_attestation_broadcast: None,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn head_hash(&self) -> Hash {
        self.tree.ghost_head_hash()
    }

    pub fn slot_state(&self) -> SlotState {
        self.slot_state
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.len()
    }

    pub fn set_peers(&mut self, peer_ids: Vec<String>) {
        self.peer_ids = peer_ids;
    }

    pub fn set_tx_provider(&mut self, tx_provider: Box<dyn OptionalTxProvider>) {
        self.tx_provider = tx_provider;
    }

    pub fn set_on_chain_updated(&mut self, callback: Box<dyn FnMut(&ChainUpdate)>) {
        self.on_chain_updated = Some(callback);
    }

    pub fn set_on_block_broadcast(&mut self, callback: Box<dyn FnMut(&Block)>) {
        self.on_block_broadcast = Some(callback);
    }

    pub fn set_on_attestation_broadcast(&mut self, callback: Box<dyn FnMut(&Attestation)>) {
        self.on_attestation_broadcast = Some(callback);
    }

    /// §5 event entry point: accepts a structurally valid transaction into
    /// the mempool, or drops it silently (§7 "invalid-signature: drop").
    pub fn submit_transaction(&mut self, tx: Transaction) -> bool {
        self.mempool.submit(tx)
    }

    /// §5 event entry point / §4.6: advances the slot state machine,
    /// proposing a block if `self` is the scheduled proposer and emitting an
    /// attestation for the current head. Returns whatever this node produced
    /// so the caller (`Network`) can fan it out to peers.
    pub fn tick(&mut self, slot: u64, timestamp: u64) -> TickOutput {
        let _span = tracing::info_span!("tick", node_id = %self.node_id, slot).entered();
        let epoch = self.config.epoch_of_slot(slot);
        self.ensure_schedule(epoch);

        let expected_proposer = self.beacon_state.proposer_for_slot(epoch, slot);
        let mut output = TickOutput::default();

        if expected_proposer == Some(self.address) {
            self.slot_state = SlotState::Proposing;
            match self.propose(slot, epoch, timestamp) {
                Some(block) => {
                    output.proposed_block = Some(block);
                    self.slot_state = SlotState::Proposed;
                }
                None => self.slot_state = SlotState::Skipped,
            }
        } else {
            self.slot_state = SlotState::Skipped;
        }

        output.attestation = self.maybe_attest(slot, timestamp);
        output
    }

    /// §4.6 step 1: lazily computes and caches the proposer schedule for
    /// `epoch` the first time it is needed, seeded by the prior epoch's
    /// RANDAO mix (or the zero mix at genesis, per "at initialization for
    /// epoch 0").
    fn ensure_schedule(&mut self, epoch: u64) {
        if self.beacon_state.has_schedule(epoch) {
            return;
        }
        let seed = if epoch == 0 { self.beacon_state.randao_mix(0) } else { self.beacon_state.randao_mix(epoch - 1) };
        let active = self.beacon_state.active_validators();
        let schedule = proposer_election::compute_epoch_schedule(&self.config, &active, seed, epoch);
        self.beacon_state.set_schedule(epoch, schedule);
    }

    /// §4.6 step 2: assembles and mines a block atop the current head, adds
    /// it locally, and notifies the block-broadcast observer. Returns `None`
    /// if there is no head to extend yet, or the nonce search is cancelled.
    fn propose(&mut self, slot: u64, epoch: u64, timestamp: u64) -> Option<Block> {
        let parent_hash = self.head?;
        let parent = self.tree.get_node(parent_hash)?.block.clone()?;

        self.mining_cancel.store(false, Ordering::Relaxed);
        let identity = ProposerIdentity { address: self.address, bls_secret_key: &self.bls_secret_key };
        let block = engine::assemble_block(
            &self.config,
            &self.tree,
            &self.beacon_state,
            &self.world_state,
            &self.mempool,
            self.tx_provider.as_mut(),
            &identity,
            &parent,
            slot,
            epoch,
            timestamp,
            &self.mining_cancel,
        )?;

        let included: Vec<Hash> = block.transactions.iter().skip(1).map(|tx| tx.txid).collect();
        match self.receive_block(block.clone()) {
            Ok(BlockOutcome::Accepted) => {
                self.mempool.remove_included(&included);
                if let Some(cb) = self.on_block_broadcast.as_mut() {
                    cb(&block);
                }
                Some(block)
            }
            _ => None,
        }
    }

    /// §4.6 step 3: once a block at `slot` has landed locally (own or
    /// received), emits and self-applies an attestation for the current
    /// head. Only validators attest; each node attests at most once per
    /// slot.
    fn maybe_attest(&mut self, slot: u64, timestamp: u64) -> Option<Attestation> {
        self.head?;
        if !self.beacon_state.validators.contains_key(&self.address) {
            return None;
        }
        if !self.attested_slots.insert(slot) {
            return None;
        }
        self.slot_state = SlotState::Attesting;
        let attestation =
            Attestation { validator_address: self.address, block_hash: self.tree.ghost_head_hash(), timestamp };
        self.receive_attestation(attestation.clone());
        if let Some(cb) = self.on_attestation_broadcast.as_mut() {
            cb(&attestation);
        }
        self.slot_state = SlotState::Done;
        Some(attestation)
    }

    /// §5 event entry point / §4.5: inserts `block`, applying the state
    /// transition and moving HEAD only when it extends the canonical chain.
    /// A block that extends canonical but fails validation stays in the tree
    /// marked invalid, rather than being rejected outright — only an
    /// unknown parent is a hard rejection (`Err`).
    pub fn receive_block(&mut self, mut block: Block) -> Result<BlockOutcome, EngineError> {
        block.finalize_hash();
        let block_hash = block.hash;
        let already_known = self.tree.get_node(block_hash).is_some();
        let index = self.tree.add_block(block.clone()).map_err(EngineError::Tree)?;
        if already_known {
            return Ok(BlockOutcome::AlreadyKnown);
        }

        let parent_hash = block.header.previous_header_hash;
        let extends_canonical = match self.head {
            Some(head_hash) => parent_hash == head_hash,
            None => parent_hash == self.config.genesis_prev_hash,
        };
        if !extends_canonical {
            return Ok(BlockOutcome::Fork);
        }

        let is_genesis = self.head.is_none();
        let head_block = self.head.and_then(|h| self.tree.get_node(h)).and_then(|n| n.block.clone());
        let epoch = self.config.epoch_of_slot(block.header.slot);
        let expected_proposer = self.beacon_state.proposer_for_slot(epoch, block.header.slot);

        let validation_result = {
            let beacon_state = &self.beacon_state;
            let config = &self.config;
            validation::validate_block_structure(
                config,
                &self.tree,
                head_block.as_ref(),
                expected_proposer,
                |slot| {
                    let epoch = config.epoch_of_slot(slot);
                    beacon_state
                        .proposer_for_slot(epoch, slot)
                        .and_then(|addr| beacon_state.validators.get(&addr))
                        .map(|v| v.bls_public_key.clone())
                },
                &beacon_state.validators,
                |block_hash, validator_address| beacon_state.is_processed(block_hash, validator_address),
                is_genesis,
                &block,
            )
        };

        if let Err(err) = validation_result {
            warn!(node_id = %self.node_id, %block_hash, error = %err, "rejecting canonical-extending block");
            self.tree.node_mut(index).is_invalid = true;
            return Ok(BlockOutcome::Invalid(err));
        }

        self.world_state.apply_block(&self.config, &mut self.beacon_state, &block);
        self.tree.set_ghost_head(block_hash).map_err(EngineError::Tree)?;
        let old_head = head_block.as_ref().map(|b| b.hash).unwrap_or(self.config.genesis_prev_hash);
        self.head = Some(block_hash);
        debug!(node_id = %self.node_id, %old_head, new_head = %block_hash, height = block.header.height, "head advanced");

        if let Some(cb) = self.on_chain_updated.as_mut() {
            cb(&ChainUpdate::ForwardProgress {
                old_head,
                new_head: block_hash,
                applied_block_hashes: vec![block_hash],
            });
        }

        Ok(BlockOutcome::Accepted)
    }

    /// §5 event entry point / §4.7: folds one observed attestation into the
    /// latest-attestation map and fork-choice weights, then reacts to any
    /// resulting HEAD change with forward application or a full replay.
    pub fn receive_attestation(&mut self, attestation: Attestation) -> AttestationOutcome {
        if !self.beacon_state.push_attestation(attestation.clone()) {
            return AttestationOutcome::Duplicate;
        }

        let old_head = self.tree.ghost_head_hash();
        let outcome = fork_choice::process_attestation(
            &mut self.tree,
            &mut self.beacon_state.latest_attestations,
            &self.beacon_state.validators,
            attestation,
        );
        if !outcome.head_changed {
            return AttestationOutcome::NoChange;
        }

        let new_head = outcome.new_head;
        let old_idx = self.tree.index_of(old_head).expect("old head always present in the tree");
        let new_idx = self.tree.index_of(new_head).expect("ghost_head_walk only returns known hashes");

        let (result, update) = if self.tree.is_descendant(old_idx, new_idx) {
            let path = self.tree.path_between(old_idx, new_idx).expect("descendant implies a path exists");
            let applied_block_hashes: Vec<Hash> = path.iter().map(|b| b.hash).collect();
            for block in &path {
                self.world_state.apply_block(&self.config, &mut self.beacon_state, block);
            }
            let count = applied_block_hashes.len();
            (
                AttestationOutcome::ForwardProgress { applied: count },
                ChainUpdate::ForwardProgress { old_head, new_head, applied_block_hashes },
            )
        } else {
            let chain = self.tree.canonical_chain(Some(new_head)).expect("new head is always present");
            let canonical_chain_hashes: Vec<Hash> = chain.iter().map(|b| b.hash).collect();
            self.world_state = WorldState::replay(&self.config, &mut self.beacon_state, &chain);
            let chain_len = canonical_chain_hashes.len();
            info!(node_id = %self.node_id, %old_head, %new_head, chain_len, "reorganized onto a new canonical chain");
            (
                AttestationOutcome::Reorganization { chain_len },
                ChainUpdate::Reorganization { old_head, new_head, canonical_chain_hashes },
            )
        };

        self.head = Some(new_head);
        if let Some(cb) = self.on_chain_updated.as_mut() {
            cb(&update);
        }
        result
    }

    /// §5 event entry point / §4.8: the three-message sync protocol.
    pub fn receive_message(&mut self, message: SyncMessage) -> Option<SyncMessage> {
        match message {
            SyncMessage::HeadBroadcast(broadcast) => {
                sync::on_head_broadcast(&self.tree, &self.node_id, &broadcast).map(SyncMessage::ChainRequest)
            }
            SyncMessage::ChainRequest(request) => {
                sync::on_chain_request(&self.tree, &self.node_id, &request).map(SyncMessage::ChainResponse)
            }
            SyncMessage::ChainResponse(response) => {
                sync::apply_chain_response(&mut self.tree, &response);
                None
            }
        }
    }

    pub fn head_broadcast(&self) -> sync::HeadBroadcast {
        sync::HeadBroadcast { from: self.node_id.clone(), head_hash: self.tree.ghost_head_hash() }
    }

    pub fn snapshot(&self) -> NodeState {
        let blocks = self.tree.get_all_blocks();
        NodeState {
            node_id: self.node_id.clone(),
            address: self.address,
            public_key: self.ecdsa_public_key.clone(),
            block_hashes: blocks.iter().map(|b| b.hash).collect(),
            tree: TreeSummary { block_count: blocks.len(), ghost_head: self.tree.ghost_head_hash() },
            beacon_state: BeaconStateSummary {
                validator_count: self.beacon_state.validators.len(),
                beacon_pool_size: self.beacon_state.beacon_pool.len(),
                latest_attestation_count: self.beacon_state.latest_attestations.len(),
            },
            world_state: WorldStateSummary { account_count: self.world_state.accounts.len() },
            mempool: MempoolSummary { pending_count: self.mempool.len() },
            peer_ids: self.peer_ids.clone(),
        }
    }
}
