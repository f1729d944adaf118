//! Per-node slot state machine and block assembly (§4.6). Stateless helper
//! functions operating on borrowed components, in the same spirit as
//! `fork_choice`: `Node` owns the actual `SlotState` and drives these.

use crate::beacon_state::BeaconState;
use crate::collaborators::OptionalTxProvider;
use crate::config::SimulatorConfig;
use crate::crypto;
use crate::mempool::Mempool;
use crate::model::{Block, BlockHeader, Transaction};
use crate::proposer_election;
use crate::tree::BlockTree;
use crate::types::{Address, Hash};
use crate::world_state::WorldState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Proposing,
    Proposed,
    Skipped,
    Attesting,
    Done,
}

/// A validator's materials for proposing at a given slot: its own address,
/// the block reward's destination, and the BLS key that signs the RANDAO
/// reveal. Kept out of `Node` so `assemble_block` stays free of `Node`'s
/// other bookkeeping (mempool submission, peer list, callbacks).
pub struct ProposerIdentity<'a> {
    pub address: Address,
    pub bls_secret_key: &'a blst::min_pk::SecretKey,
}

/// Searches nonces in batches of `batch_size`, checking `cancel` between
/// batches so an external driver can abandon a slot whose block arrived from
/// elsewhere (§5 "the proposer's nonce search respects a cooperative
/// cancellation flag"). Mutates `header.nonce` in place; returns `true` once
/// `header.hash()` falls under `ceiling`, `false` if cancelled first.
pub fn mine_nonce(header: &mut BlockHeader, ceiling: &[u8; 32], batch_size: u32, cancel: &AtomicBool) -> bool {
    loop {
        if cancel.load(Ordering::Relaxed) {
            trace!(slot = header.slot, "nonce search cancelled");
            return false;
        }
        let batch_start = header.nonce;
        for offset in 0..batch_size {
            let nonce = batch_start.wrapping_add(offset);
            header.nonce = nonce;
            if header.hash().is_below(ceiling) {
                trace!(slot = header.slot, nonce, "found a satisfying nonce");
                return true;
            }
            if nonce == u32::MAX {
                header.nonce = 0;
                break;
            }
        }
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        header.nonce = batch_start.wrapping_add(batch_size);
    }
}

/// Assembles a candidate block for `slot` atop `parent`: coinbase first,
/// mempool transactions honoring nonce/balance order, one optional
/// demo-collaborator transaction, attestations covering the canonical chain
/// that aren't yet processed, and a RANDAO reveal for `epoch` — then mines a
/// satisfying nonce (§4.6 step 2). Returns `None` if the nonce search is
/// cancelled before a satisfying nonce is found.
#[allow(clippy::too_many_arguments)]
pub fn assemble_block(
    config: &SimulatorConfig,
    tree: &BlockTree,
    beacon_state: &BeaconState,
    world_state: &WorldState,
    mempool: &Mempool,
    tx_provider: &mut dyn OptionalTxProvider,
    identity: &ProposerIdentity,
    parent: &Block,
    slot: u64,
    epoch: u64,
    timestamp: u64,
    cancel: &AtomicBool,
) -> Option<Block> {
    let mut transactions = Vec::with_capacity(config.max_block_transactions + 2);
    transactions.push(Transaction::coinbase(config.rewarder_sentinel, identity.address, config.block_reward, timestamp));

    let mempool_txs = mempool.select_for_block(config.max_block_transactions, world_state);
    transactions.extend(mempool_txs);

    if let Some(demo_tx) = tx_provider.maybe_transaction(identity.address, world_state.nonce(identity.address), timestamp) {
        transactions.push(demo_tx);
    }

    let canonical_hashes: std::collections::HashSet<Hash> =
        tree.canonical_chain(Some(parent.hash)).ok()?.into_iter().map(|b| b.hash).collect();
    let attestations: Vec<_> =
        beacon_state.pending_attestations_for_inclusion(&canonical_hashes).cloned().collect();

    let randao_reveal = proposer_election::generate_randao_reveal(epoch, identity.bls_secret_key);

    let transaction_hash = Block::transaction_hash(&transactions);
    let mut header = BlockHeader {
        height: parent.header.height + 1,
        slot,
        timestamp,
        previous_header_hash: parent.hash,
        transaction_hash,
        ceiling: config.ceiling,
        nonce: 0,
    };

    if !mine_nonce(&mut header, &config.ceiling, config.mining_batch_size, cancel) {
        return None;
    }

    let mut block = Block { header, transactions, attestations, randao_reveal: Some(randao_reveal), hash: Hash::zero() };
    block.finalize_hash();
    Some(block)
}

/// Hash of `"RANDAO_REVEAL_<epoch>"` verification key lookups go through
/// `BeaconState::validators`; this just re-derives the seed a harness uses to
/// build a node's BLS/ECDSA identity deterministically from its id (§6).
pub fn derive_bls_secret_key(node_id: &str) -> Result<blst::min_pk::SecretKey, crate::error::CryptoError> {
    let seed = crypto::derive_node_seed(node_id);
    crypto::bls_secret_key(&seed)
}

pub fn new_cancel_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}
