//! Pending transactions awaiting inclusion in a block (§2 Mempool &
//! Validation). Structural validity (signature, txid) is checked on
//! submission; nonce/balance applicability is re-checked against the live
//! world state at selection time, since the mempool can hold transactions
//! for longer than one slot.

use crate::model::Transaction;
use crate::types::{Address, Hash};
use crate::validation;
use crate::world_state::WorldState;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    pending: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Structural validation only; returns `false` (and drops the
    /// transaction) on failure, per §7's "Invalid-signature: drop; log".
    pub fn submit(&mut self, tx: Transaction) -> bool {
        if validation::validate_transaction(&tx).is_err() {
            return false;
        }
        if self.pending.iter().any(|p| p.txid == tx.txid) {
            return false;
        }
        self.pending.push(tx);
        true
    }

    /// Selects up to `max` transactions applicable in sequence against
    /// `world_state`, honoring nonce order and running balance per sender so
    /// that a proposer never assembles a block whose own transactions would
    /// conflict with each other.
    pub fn select_for_block(&self, max: usize, world_state: &WorldState) -> Vec<Transaction> {
        let mut scratch_balance: HashMap<Address, u128> = HashMap::new();
        let mut scratch_nonce: HashMap<Address, u64> = HashMap::new();

        let mut ordered = self.pending.clone();
        ordered.sort_by_key(|tx| (tx.from, tx.nonce));

        let mut selected = Vec::new();
        for tx in ordered {
            if selected.len() >= max {
                break;
            }
            let balance =
                *scratch_balance.entry(tx.from).or_insert_with(|| world_state.balance(tx.from));
            let nonce = *scratch_nonce.entry(tx.from).or_insert_with(|| world_state.nonce(tx.from));
            if nonce != tx.nonce || balance < tx.value {
                continue;
            }
            scratch_balance.insert(tx.from, balance - tx.value);
            scratch_nonce.insert(tx.from, nonce + 1);
            selected.push(tx);
        }
        selected
    }

    /// Drops transactions that were included in a block, by txid.
    pub fn remove_included(&mut self, included: &[Hash]) {
        self.pending.retain(|tx| !included.contains(&tx.txid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;

    fn signed(from_seed: &[u8], to: Address, value: u128, nonce: u64) -> Transaction {
        let seed = crypto::sha256(from_seed);
        let sk = crypto::ecdsa_signing_key_from_seed(&seed).unwrap();
        let pk = crypto::ecdsa_public_key(&sk);
        let from = crypto::derive_address(&pk);
        Transaction::new_signed(from, to, value, nonce, 1, pk, &sk, None)
    }

    #[test]
    fn rejects_structurally_invalid_and_duplicate_submissions() {
        let mut pool = Mempool::new();
        let to = Address::from_bytes([1; 32]);
        let tx = signed(b"sender", to, 1, 0);
        assert!(pool.submit(tx.clone()));
        assert!(!pool.submit(tx));
    }

    #[test]
    fn selection_honors_nonce_order_and_running_balance() {
        let mut pool = Mempool::new();
        let to = Address::from_bytes([1; 32]);
        let tx0 = signed(b"spender", to, 3, 0);
        let sender = tx0.from;
        let tx1 = signed(b"spender", to, 3, 1);
        pool.submit(tx1.clone());
        pool.submit(tx0.clone());

        let mut world = WorldState::new();
        world.accounts.insert(sender, crate::model::Account { address: sender, balance: 5, nonce: 0, code: None, storage: None, code_hash: None });

        let selected = pool.select_for_block(10, &world);
        // Only tx0 applies: balance 5 covers it but not both, and tx1's
        // required nonce (1) isn't reached without tx0 applying first.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].txid, tx0.txid);
    }
}
