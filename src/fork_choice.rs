//! LMD-GHOST fork-choice (§4.2), implemented as a stateless module per the
//! design notes: it owns no persistent data of its own, operating purely on
//! the `BlockTree` and the latest-attestation map handed to it (which lives
//! in `BeaconState`, not duplicated here).

use crate::model::{Attestation, Validator};
use crate::tree::{BlockTree, NodeIndex};
use crate::types::{Address, Hash};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkChoiceOutcome {
    pub accepted: bool,
    pub head_changed: bool,
    pub old_head: Hash,
    pub new_head: Hash,
}

/// Incrementally applies one observed attestation (§4.2 steps 1-6):
/// dropping stale re-votes, subtracting the validator's weight from its
/// previous vote's ancestry, adding it to the new vote's ancestry, then
/// recomputing GHOST-HEAD.
pub fn process_attestation(
    tree: &mut BlockTree,
    latest_attestations: &mut HashMap<Address, Attestation>,
    validators: &HashMap<Address, Validator>,
    attestation: Attestation,
) -> ForkChoiceOutcome {
    let old_head = tree.ghost_head_hash();
    let no_op = ForkChoiceOutcome { accepted: false, head_changed: false, old_head, new_head: old_head };

    let weight = match validators.get(&attestation.validator_address) {
        Some(v) if v.is_active() => v.staked_eth,
        _ => return no_op,
    };

    if let Some(prev) = latest_attestations.get(&attestation.validator_address) {
        if attestation.timestamp <= prev.timestamp {
            return no_op;
        }
        if let Some(prev_idx) = tree.index_of(prev.block_hash) {
            for idx in tree.ancestors_inclusive(prev_idx) {
                tree.sub_weight(idx, weight);
            }
        }
    }

    latest_attestations.insert(attestation.validator_address, attestation.clone());

    if let Some(new_idx) = tree.index_of(attestation.block_hash) {
        for idx in tree.ancestors_inclusive(new_idx) {
            tree.add_weight(idx, weight);
        }
    }

    let new_head = ghost_head_walk(tree).unwrap_or(old_head);
    let head_changed = new_head != old_head;
    if head_changed {
        tree.set_ghost_head(new_head).expect("ghost_head_walk only returns hashes present in the tree");
    }
    ForkChoiceOutcome { accepted: true, head_changed, old_head, new_head }
}

/// Repeatedly descends into the heaviest valid child, starting at the null
/// root. Ties break on the lexicographically smaller block hash so that any
/// two nodes observing the same tree and weights agree. Returns `None` only
/// when the null root itself has no valid children (no genesis observed
/// yet) — callers fall back to the previously known head in that case.
pub fn ghost_head_walk(tree: &BlockTree) -> Option<Hash> {
    let mut current = tree.null_root();
    loop {
        let mut candidates: Vec<NodeIndex> =
            tree.node(current).children.iter().copied().filter(|&c| !tree.node(c).is_invalid).collect();
        if candidates.is_empty() {
            if current == tree.null_root() {
                return None;
            }
            return Some(tree.node(current).hash);
        }
        candidates.sort_by(|&a, &b| {
            let (na, nb) = (tree.node(a), tree.node(b));
            nb.attested_eth.cmp(&na.attested_eth).then_with(|| na.hash.cmp(&nb.hash))
        });
        current = candidates[0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, BlockHeader};

    fn header(prev: Hash, height: u64, variant: u8) -> BlockHeader {
        BlockHeader {
            height,
            slot: height,
            timestamp: 0,
            previous_header_hash: prev,
            transaction_hash: Hash::zero(),
            ceiling: [0xff; 32],
            nonce: height as u32 * 256 + variant as u32,
        }
    }

    /// `variant` distinguishes sibling blocks sharing the same `(prev,
    /// height)` so they don't collide to the same header hash.
    fn child(prev: Hash, height: u64, variant: u8) -> Block {
        let mut b = Block {
            header: header(prev, height, variant),
            transactions: vec![],
            attestations: vec![],
            randao_reveal: Some(vec![height as u8]),
            hash: Hash::zero(),
        };
        b.finalize_hash();
        b
    }

    fn validators(n: usize) -> (HashMap<Address, Validator>, Vec<Address>) {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for i in 0..n {
            let addr = Address::from_bytes([i as u8 + 1; 32]);
            map.insert(addr, Validator { node_address: addr, staked_eth: 32, ecdsa_public_key: vec![], bls_public_key: vec![] });
            order.push(addr);
        }
        (map, order)
    }

    fn att(validator: Address, block_hash: Hash, ts: u64) -> Attestation {
        Attestation { validator_address: validator, block_hash, timestamp: ts }
    }

    /// Scenario S5: G -> A -> {A1, A2}, G -> B -> B1. Five validators attest
    /// A2, A2, B1, A1, A2. The heaviest subtree at G is A (4 of 5), and at A
    /// it is A2 (3 of 5 landing there directly) — HEAD must be A2.
    #[test]
    fn s5_heaviest_subtree_wins() {
        let mut tree = BlockTree::new(Hash::zero());
        let genesis = child(Hash::zero(), 0, 0);
        let genesis_hash = genesis.hash;
        tree.add_block(genesis).unwrap();
        tree.set_ghost_head(genesis_hash).unwrap();

        let a = child(genesis_hash, 1, 0);
        let a_hash = a.hash;
        tree.add_block(a).unwrap();
        let b = child(genesis_hash, 1, 1);
        let b_hash = b.hash;
        tree.add_block(b).unwrap();

        let a1 = child(a_hash, 2, 0);
        let a1_hash = a1.hash;
        tree.add_block(a1).unwrap();
        let a2 = child(a_hash, 2, 1);
        let a2_hash = a2.hash;
        tree.add_block(a2).unwrap();

        let b1 = child(b_hash, 2, 0);
        let b1_hash = b1.hash;
        tree.add_block(b1).unwrap();

        let (validators, v) = validators(5);
        let mut latest = HashMap::new();

        let votes =
            [(v[0], a2_hash), (v[1], a2_hash), (v[2], b1_hash), (v[3], a1_hash), (v[4], a2_hash)];
        let mut ts = 1;
        let mut last_outcome = None;
        for (validator, target) in votes {
            last_outcome =
                Some(process_attestation(&mut tree, &mut latest, &validators, att(validator, target, ts)));
            ts += 1;
        }

        assert_eq!(tree.ghost_head_hash(), a2_hash);
        assert!(last_outcome.unwrap().accepted);

        // S6: V3 (index 2) moves its vote from B1 to A2. A2's subtree grows
        // to 4/5 and HEAD must not oscillate away from A2.
        let outcome = process_attestation(&mut tree, &mut latest, &validators, att(v[2], a2_hash, 100));
        assert!(outcome.accepted);
        assert_eq!(tree.ghost_head_hash(), a2_hash);
        assert_eq!(tree.node(tree.index_of(a2_hash).unwrap()).attested_eth, 32 * 4);
        assert_eq!(tree.node(tree.index_of(b1_hash).unwrap()).attested_eth, 0);
    }

    #[test]
    fn stale_and_duplicate_timestamps_are_dropped() {
        let mut tree = BlockTree::new(Hash::zero());
        let genesis = child(Hash::zero(), 0, 0);
        let genesis_hash = genesis.hash;
        tree.add_block(genesis).unwrap();
        tree.set_ghost_head(genesis_hash).unwrap();
        let a = child(genesis_hash, 1, 0);
        let a_hash = a.hash;
        tree.add_block(a).unwrap();

        let (validators, v) = validators(1);
        let mut latest = HashMap::new();
        let first = process_attestation(&mut tree, &mut latest, &validators, att(v[0], a_hash, 10));
        assert!(first.accepted && first.head_changed);

        let stale = process_attestation(&mut tree, &mut latest, &validators, att(v[0], genesis_hash, 5));
        assert!(!stale.accepted);
        assert_eq!(tree.node(tree.index_of(a_hash).unwrap()).attested_eth, 32);
    }

    #[test]
    fn zero_stake_validator_is_excluded() {
        let mut tree = BlockTree::new(Hash::zero());
        let genesis = child(Hash::zero(), 0, 0);
        let genesis_hash = genesis.hash;
        tree.add_block(genesis).unwrap();
        tree.set_ghost_head(genesis_hash).unwrap();
        let a = child(genesis_hash, 1, 0);
        let a_hash = a.hash;
        tree.add_block(a).unwrap();

        let addr = Address::from_bytes([9; 32]);
        let mut validators = HashMap::new();
        validators.insert(addr, Validator { node_address: addr, staked_eth: 0, ecdsa_public_key: vec![], bls_public_key: vec![] });
        let mut latest = HashMap::new();

        let outcome = process_attestation(&mut tree, &mut latest, &validators, att(addr, a_hash, 1));
        assert!(!outcome.accepted);
        assert_eq!(tree.ghost_head_hash(), genesis_hash);
    }
}
