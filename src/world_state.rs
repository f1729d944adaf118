//! The world state (§3, §4.4): a deterministic account-balance/nonce ledger
//! mutated only through the block state-transition function, and rebuilt
//! from scratch by replaying the canonical chain on reorganization.

use crate::beacon_state::BeaconState;
use crate::config::SimulatorConfig;
use crate::model::{Account, Block, Receipt, ReceiptStatus};
use crate::types::{Address, Hash};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub accounts: HashMap<Address, Account>,
    pub receipts: HashMap<Hash, HashMap<Hash, Receipt>>,
}

impl WorldState {
    pub fn new() -> WorldState {
        WorldState::default()
    }

    pub fn balance(&self, address: Address) -> u128 {
        self.accounts.get(&address).map(|a| a.balance).unwrap_or(0)
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map(|a| a.nonce).unwrap_or(0)
    }

    fn snapshot(&self, address: Address) -> Account {
        self.accounts.get(&address).cloned().unwrap_or_else(|| Account::new(address))
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_insert_with(|| Account::new(address))
    }

    /// Applies one block's transition in the strict order of §4.4: credit
    /// the coinbase (proposer's nonce untouched, P7), apply remaining
    /// transactions against the snapshot taken just before each one
    /// (skipping — never rejecting the block — on insufficient balance or a
    /// mismatched nonce and recording a `status = 0` receipt instead),
    /// record processed attestations (pruning the pool), then fold the
    /// RANDAO reveal into the epoch's mix. Assumes `block` already passed
    /// `validation::validate_block_structure`.
    pub fn apply_block(&mut self, config: &SimulatorConfig, beacon_state: &mut BeaconState, block: &Block) {
        let mut receipts = HashMap::new();

        if let Some(coinbase) = block.transactions.first() {
            self.account_mut(coinbase.to).balance += coinbase.value;
            receipts.insert(
                coinbase.txid,
                Receipt {
                    txid: coinbase.txid,
                    status: ReceiptStatus::Success,
                    from: coinbase.from,
                    to: coinbase.to,
                    value: coinbase.value,
                },
            );
        }

        for tx in block.transactions.iter().skip(1) {
            let sender = self.snapshot(tx.from);
            let applies = sender.nonce == tx.nonce && sender.balance >= tx.value;
            let status = if applies {
                self.account_mut(tx.from).balance -= tx.value;
                self.account_mut(tx.from).nonce += 1;
                self.account_mut(tx.to).balance += tx.value;
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Failed
            };
            receipts.insert(tx.txid, Receipt { txid: tx.txid, status, from: tx.from, to: tx.to, value: tx.value });
        }

        for attestation in &block.attestations {
            beacon_state.mark_processed(attestation.block_hash, attestation.validator_address);
        }

        if let Some(reveal) = &block.randao_reveal {
            let epoch = config.epoch_of_slot(block.header.slot);
            beacon_state.accumulate_randao(epoch, reveal);
        }

        self.receipts.insert(block.hash, receipts);
    }

    /// Rebuilds world state (and `beacon_state`'s RANDAO mixes and
    /// processed-attestation set) from scratch by replaying `chain` in
    /// genesis-to-head order — required on reorganization (§4.7 step 6) and
    /// the mechanism whose equivalence with incremental application is the
    /// central correctness property P2.
    pub fn replay(config: &SimulatorConfig, beacon_state: &mut BeaconState, chain: &[Block]) -> WorldState {
        beacon_state.reset_for_replay();
        let mut state = WorldState::new();
        for block in chain {
            state.apply_block(config, beacon_state, block);
        }
        state
    }
}
