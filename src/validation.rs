//! Transaction and block structural/signature validation (§4.4).
//!
//! This module checks *validity*, not *applicability*: a structurally valid
//! transaction can still be skipped at application time for insufficient
//! balance or a stale nonce (§4.4 item 4; see `world_state::apply_block`),
//! which is a bookkeeping outcome, not a rejection.

use crate::config::SimulatorConfig;
use crate::crypto;
use crate::error::{BlockValidationError, TxValidationError};
use crate::model::{self, Block, Validator, COINBASE_SIGNATURE_PLACEHOLDER};
use crate::proposer_election;
use crate::tree::BlockTree;
use crate::types::{Address, Hash};
use std::collections::HashMap;

/// Items 1-3 of §4.4 for a non-coinbase transaction: the public key hashes
/// to the claimed sender, a real (non-placeholder) signature is present,
/// it verifies over `SHA256(JSON({txid}))`, and the txid itself recomputes.
pub fn validate_transaction(tx: &model::Transaction) -> Result<(), TxValidationError> {
    if tx.public_key.is_empty() {
        return Err(TxValidationError::MissingPublicKey);
    }
    if crypto::derive_address(&tx.public_key) != tx.from {
        return Err(TxValidationError::AddressMismatch);
    }
    if tx.signature.is_empty() || tx.signature == COINBASE_SIGNATURE_PLACEHOLDER {
        return Err(TxValidationError::MissingSignature);
    }
    let message_hash = model::signature_message_hash(tx.txid);
    if !crypto::ecdsa_verify(&tx.signature, &message_hash, &tx.public_key) {
        return Err(TxValidationError::BadSignature);
    }
    let expected_txid = model::compute_txid(tx.from, tx.to, tx.value, tx.nonce, tx.timestamp);
    if expected_txid != tx.txid {
        return Err(TxValidationError::TxidMismatch);
    }
    Ok(())
}

pub fn validate_coinbase(
    tx: &model::Transaction,
    config: &SimulatorConfig,
    expected_proposer: Address,
) -> Result<(), BlockValidationError> {
    if tx.from != config.rewarder_sentinel || tx.to != expected_proposer || tx.value != config.block_reward {
        return Err(BlockValidationError::BadCoinbase);
    }
    Ok(())
}

/// Full structural validity of a block against the current head (§4.4 items
/// 1-6). Does not touch account balances/nonces — that happens during
/// application, item 4, and never rejects the block. `head` is `None` only
/// for a genesis-level block, the one case where there is no parent to
/// compare against. `expected_proposer` is `None` only when no epoch
/// schedule names one yet (also only possible at genesis level).
#[allow(clippy::too_many_arguments)]
pub fn validate_block_structure(
    config: &SimulatorConfig,
    tree: &BlockTree,
    head: Option<&Block>,
    expected_proposer: Option<Address>,
    proposer_public_key_for_slot: impl Fn(u64) -> Option<Vec<u8>>,
    validators: &HashMap<Address, Validator>,
    is_attestation_processed: impl Fn(Hash, Address) -> bool,
    is_genesis: bool,
    block: &Block,
) -> Result<(), BlockValidationError> {
    if !is_genesis {
        let head = head.expect("non-genesis block validation always has a head");
        if block.header.previous_header_hash != head.hash {
            return Err(BlockValidationError::WrongParent);
        }
        if block.header.height != head.header.height + 1 {
            return Err(BlockValidationError::WrongHeight);
        }
    }

    let expected_tx_hash = Block::transaction_hash(&block.transactions);
    if block.header.transaction_hash != expected_tx_hash {
        return Err(BlockValidationError::WrongTransactionHash);
    }

    if !block.hash.is_below(&config.ceiling) {
        return Err(BlockValidationError::CeilingNotSatisfied);
    }

    let coinbase = block.transactions.first().ok_or(BlockValidationError::BadCoinbase)?;
    if coinbase.from != config.rewarder_sentinel || coinbase.value != config.block_reward {
        return Err(BlockValidationError::BadCoinbase);
    }
    if let Some(proposer) = expected_proposer {
        validate_coinbase(coinbase, config, proposer)?;
    }
    for tx in block.transactions.iter().skip(1) {
        if tx.is_coinbase(config.rewarder_sentinel) {
            return Err(BlockValidationError::BadCoinbase);
        }
    }

    if !is_genesis {
        let epoch = config.epoch_of_slot(block.header.slot);
        let reveal = block.randao_reveal.as_ref().ok_or(BlockValidationError::MissingRandaoReveal)?;
        let proposer_public_key =
            proposer_public_key_for_slot(block.header.slot).ok_or(BlockValidationError::BadRandaoReveal)?;
        if !proposer_election::verify_randao_reveal(epoch, reveal, &proposer_public_key) {
            return Err(BlockValidationError::BadRandaoReveal);
        }
    }

    for attestation in &block.attestations {
        if !validators.contains_key(&attestation.validator_address) {
            return Err(BlockValidationError::AttestationUnknownValidator);
        }
        if tree.get_node(attestation.block_hash).is_none() {
            return Err(BlockValidationError::AttestationUnknownBlock);
        }
        if is_attestation_processed(attestation.block_hash, attestation.validator_address) {
            return Err(BlockValidationError::AttestationAlreadyProcessed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attestation, Block, BlockHeader, Transaction};
    use crate::tree::BlockTree;
    use crate::types::Hash;
    use std::sync::atomic::AtomicBool;

    /// A structurally valid genesis-level block with no attestations yet;
    /// tests attach one to `block.attestations` afterward, which doesn't
    /// disturb `header.hash()` (computed over the header alone).
    fn valid_genesis_block(config: &SimulatorConfig, miner: Address) -> Block {
        let coinbase = Transaction::coinbase(config.rewarder_sentinel, miner, config.block_reward, 0);
        let transactions = vec![coinbase];
        let transaction_hash = Block::transaction_hash(&transactions);
        let mut header = BlockHeader {
            height: 0,
            slot: 0,
            timestamp: 0,
            previous_header_hash: config.genesis_prev_hash,
            transaction_hash,
            ceiling: config.ceiling,
            nonce: 0,
        };
        let cancel = AtomicBool::new(false);
        crate::engine::mine_nonce(&mut header, &config.ceiling, config.mining_batch_size, &cancel);
        let mut block = Block { header, transactions, attestations: vec![], randao_reveal: None, hash: Hash::zero() };
        block.finalize_hash();
        block
    }

    #[test]
    fn attestation_from_unknown_validator_is_rejected() {
        let config = SimulatorConfig::default();
        let miner = Address::from_bytes([1; 32]);
        let mut block = valid_genesis_block(&config, miner);

        let mut tree = BlockTree::new(config.genesis_prev_hash);
        tree.add_block(block.clone()).unwrap();

        let stranger = Address::from_bytes([9; 32]);
        block.attestations.push(Attestation { validator_address: stranger, block_hash: block.hash, timestamp: 1 });

        let validators = HashMap::new();
        let result =
            validate_block_structure(&config, &tree, None, None, |_| None, &validators, |_, _| false, true, &block);
        assert_eq!(result, Err(BlockValidationError::AttestationUnknownValidator));
    }

    #[test]
    fn attestation_for_unknown_block_is_rejected() {
        let config = SimulatorConfig::default();
        let miner = Address::from_bytes([1; 32]);
        let mut block = valid_genesis_block(&config, miner);

        let mut tree = BlockTree::new(config.genesis_prev_hash);
        tree.add_block(block.clone()).unwrap();

        let validator = Validator { node_address: miner, staked_eth: 32, ecdsa_public_key: vec![], bls_public_key: vec![] };
        let mut validators = HashMap::new();
        validators.insert(miner, validator);

        let absent_hash = Hash::from_bytes([7; 32]);
        block.attestations.push(Attestation { validator_address: miner, block_hash: absent_hash, timestamp: 1 });

        let result =
            validate_block_structure(&config, &tree, None, None, |_| None, &validators, |_, _| false, true, &block);
        assert_eq!(result, Err(BlockValidationError::AttestationUnknownBlock));
    }

    #[test]
    fn already_processed_attestation_is_rejected() {
        let config = SimulatorConfig::default();
        let miner = Address::from_bytes([1; 32]);
        let mut block = valid_genesis_block(&config, miner);

        let mut tree = BlockTree::new(config.genesis_prev_hash);
        tree.add_block(block.clone()).unwrap();

        let validator = Validator { node_address: miner, staked_eth: 32, ecdsa_public_key: vec![], bls_public_key: vec![] };
        let mut validators = HashMap::new();
        validators.insert(miner, validator);
        block.attestations.push(Attestation { validator_address: miner, block_hash: block.hash, timestamp: 1 });

        let result =
            validate_block_structure(&config, &tree, None, None, |_| None, &validators, |_, _| true, true, &block);
        assert_eq!(result, Err(BlockValidationError::AttestationAlreadyProcessed));
    }

    #[test]
    fn valid_signed_transaction_passes() {
        let seed = crypto::sha256(b"carol");
        let sk = crypto::ecdsa_signing_key_from_seed(&seed).unwrap();
        let pk = crypto::ecdsa_public_key(&sk);
        let from = crypto::derive_address(&pk);
        let to = Address::from_bytes([8; 32]);
        let tx = Transaction::new_signed(from, to, 3, 0, 42, pk, &sk, None);
        assert!(validate_transaction(&tx).is_ok());
    }

    #[test]
    fn coinbase_fails_as_a_regular_transaction() {
        let sentinel = Address::zero();
        let proposer = Address::from_bytes([2; 32]);
        let tx = Transaction::coinbase(sentinel, proposer, 4, 0);
        assert_eq!(validate_transaction(&tx), Err(TxValidationError::MissingPublicKey));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let seed = crypto::sha256(b"dave");
        let sk = crypto::ecdsa_signing_key_from_seed(&seed).unwrap();
        let pk = crypto::ecdsa_public_key(&sk);
        let from = crypto::derive_address(&pk);
        let to = Address::from_bytes([8; 32]);
        let mut tx = Transaction::new_signed(from, to, 3, 0, 42, pk, &sk, None);
        tx.value = 9000;
        assert_eq!(validate_transaction(&tx), Err(TxValidationError::TxidMismatch));
    }
}
