//! Beacon-chain state (§3): validator registry, RANDAO mix chain, per-epoch
//! proposer schedule, attestation pool, latest-attestation map and
//! processed-attestation set.
//!
//! Per the design notes, the latest-attestation map lives *only* here (the
//! source duplicated it inside fork-choice too); `fork_choice` is handed
//! `&mut self.latest_attestations` rather than keeping its own copy.

use crate::crypto;
use crate::model::{Attestation, Validator};
use crate::types::{Address, Hash};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct BeaconState {
    pub genesis_time: u64,
    pub validators: HashMap<Address, Validator>,
    randao_mixes: HashMap<u64, Hash>,
    epoch_schedules: HashMap<u64, HashMap<u64, Address>>,
    pub beacon_pool: Vec<Attestation>,
    pub latest_attestations: HashMap<Address, Attestation>,
    processed_attestations: HashSet<(Hash, Address)>,
}

impl BeaconState {
    pub fn new(genesis_time: u64, validators: Vec<Validator>) -> BeaconState {
        let validators = validators.into_iter().map(|v| (v.node_address, v)).collect();
        BeaconState {
            genesis_time,
            validators,
            randao_mixes: HashMap::new(),
            epoch_schedules: HashMap::new(),
            beacon_pool: Vec::new(),
            latest_attestations: HashMap::new(),
            processed_attestations: HashSet::new(),
        }
    }

    pub fn active_validators(&self) -> Vec<Validator> {
        let mut v: Vec<Validator> = self.validators.values().cloned().filter(|v| v.is_active()).collect();
        v.sort_by_key(|v| *v.node_address.as_bytes());
        v
    }

    pub fn randao_mix(&self, epoch: u64) -> Hash {
        self.randao_mixes.get(&epoch).copied().unwrap_or_else(Hash::zero)
    }

    /// `randao_mixes[epoch] ^= SHA256(randao_reveal)` (§4.3); the XOR
    /// accumulation is commutative so every proposer in the epoch
    /// contributes equally regardless of reveal order (P6).
    pub fn accumulate_randao(&mut self, epoch: u64, randao_reveal: &[u8]) {
        let contribution = crypto::sha256(randao_reveal);
        let mix = self.randao_mixes.entry(epoch).or_insert_with(Hash::zero);
        let mut bytes = *mix.as_bytes();
        for (b, c) in bytes.iter_mut().zip(contribution.iter()) {
            *b ^= c;
        }
        *mix = Hash::from_bytes(bytes);
    }

    pub fn has_schedule(&self, epoch: u64) -> bool {
        self.epoch_schedules.contains_key(&epoch)
    }

    pub fn set_schedule(&mut self, epoch: u64, schedule: HashMap<u64, Address>) {
        self.epoch_schedules.insert(epoch, schedule);
    }

    pub fn proposer_for_slot(&self, epoch: u64, slot: u64) -> Option<Address> {
        self.epoch_schedules.get(&epoch)?.get(&slot).copied()
    }

    /// Rejects exact `(block_hash, validator_address)` duplicates already
    /// sitting in the pool; §4.7 step 1.
    pub fn push_attestation(&mut self, attestation: Attestation) -> bool {
        let key = (attestation.block_hash, attestation.validator_address);
        if self.beacon_pool.iter().any(|a| (a.block_hash, a.validator_address) == key) {
            return false;
        }
        self.beacon_pool.push(attestation);
        true
    }

    pub fn is_processed(&self, block_hash: Hash, validator_address: Address) -> bool {
        self.processed_attestations.contains(&(block_hash, validator_address))
    }

    /// Marks `(block_hash, validator_address)` processed and prunes any
    /// matching pool entry, per the state-transition function's step 3 and
    /// the resource-cleanup policy ("pruned whenever attestations are
    /// included in a block").
    pub fn mark_processed(&mut self, block_hash: Hash, validator_address: Address) {
        self.processed_attestations.insert((block_hash, validator_address));
        self.beacon_pool.retain(|a| !(a.block_hash == block_hash && a.validator_address == validator_address));
    }

    /// Clears RANDAO mixes and the processed-attestation set ahead of a full
    /// replay (§3 Lifecycles: "WorldState ... discarded and rebuilt from
    /// scratch"; the RANDAO mix chain is chain history in exactly the same
    /// sense and must be rebuilt alongside it). Validators, cached epoch
    /// schedules, the attestation pool and the latest-attestation map are
    /// untouched — per the design notes only fork-choice/world-state react
    /// to a reorg; an already-cached epoch schedule is a one-epoch-ahead
    /// lookahead commitment and is not retroactively invalidated.
    pub fn reset_for_replay(&mut self) {
        self.randao_mixes.clear();
        self.processed_attestations.clear();
    }

    pub fn pending_attestations_for_inclusion<'a>(
        &'a self,
        canonical_hashes: &'a HashSet<Hash>,
    ) -> impl Iterator<Item = &'a Attestation> + 'a {
        self.beacon_pool
            .iter()
            .filter(move |a| canonical_hashes.contains(&a.block_hash))
            .filter(move |a| !self.is_processed(a.block_hash, a.validator_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn randao_xor_is_order_independent() {
        let mut a = BeaconState::new(0, vec![]);
        let mut b = BeaconState::new(0, vec![]);
        let r1 = b"reveal-1".to_vec();
        let r2 = b"reveal-2".to_vec();
        let r3 = b"reveal-3".to_vec();

        a.accumulate_randao(0, &r1);
        a.accumulate_randao(0, &r2);
        a.accumulate_randao(0, &r3);

        b.accumulate_randao(0, &r3);
        b.accumulate_randao(0, &r1);
        b.accumulate_randao(0, &r2);

        assert_eq!(a.randao_mix(0), b.randao_mix(0));
    }

    #[test]
    fn pool_rejects_exact_duplicates_but_allows_multi_vote() {
        let mut state = BeaconState::new(0, vec![]);
        let addr = Address::from_bytes([1; 32]);
        let block_hash = Hash::from_bytes([2; 32]);
        let other_hash = Hash::from_bytes([3; 32]);
        assert!(state.push_attestation(Attestation { validator_address: addr, block_hash, timestamp: 1 }));
        assert!(!state.push_attestation(Attestation { validator_address: addr, block_hash, timestamp: 2 }));
        assert!(state.push_attestation(Attestation { validator_address: addr, block_hash: other_hash, timestamp: 3 }));
    }

    #[test]
    fn mark_processed_prunes_pool() {
        let mut state = BeaconState::new(0, vec![]);
        let addr = Address::from_bytes([1; 32]);
        let block_hash = Hash::from_bytes([2; 32]);
        state.push_attestation(Attestation { validator_address: addr, block_hash, timestamp: 1 });
        state.mark_processed(block_hash, addr);
        assert!(state.is_processed(block_hash, addr));
        assert!(state.beacon_pool.is_empty());
    }
}
