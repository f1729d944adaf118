//! Crate-wide error types. Per the error-handling design, most of the
//! conditions named in the spec are *not* surfaced as exceptions to external
//! collaborators — they are turned into data (a `Reject`, a zero-status
//! receipt, a silently dropped message) at the call site named in the spec's
//! error table. These enums exist so call sites can match precisely and
//! tests can assert on the reason, not so callers are forced to propagate
//! them everywhere.

use crate::types::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("unknown parent {0} for block")]
    UnknownParent(Hash),
    #[error("unknown head {0}")]
    UnknownHead(Hash),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("aggregation of an empty signature set")]
    EmptyAggregation,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxValidationError {
    #[error("missing public key")]
    MissingPublicKey,
    #[error("public key does not hash to the claimed sender address")]
    AddressMismatch,
    #[error("missing or placeholder signature")]
    MissingSignature,
    #[error("signature does not verify")]
    BadSignature,
    #[error("recomputed txid does not match")]
    TxidMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockValidationError {
    #[error("previous_header_hash does not match current head")]
    WrongParent,
    #[error("height is not head.height + 1")]
    WrongHeight,
    #[error("transaction_hash does not match serialized transactions")]
    WrongTransactionHash,
    #[error("header hash is not below the configured ceiling")]
    CeilingNotSatisfied,
    #[error("missing RANDAO reveal on a non-genesis block")]
    MissingRandaoReveal,
    #[error("RANDAO reveal does not verify for the scheduled proposer")]
    BadRandaoReveal,
    #[error("attestation references an unknown validator")]
    AttestationUnknownValidator,
    #[error("attestation references a block absent from the tree")]
    AttestationUnknownBlock,
    #[error("attestation already processed")]
    AttestationAlreadyProcessed,
    #[error("coinbase transaction is missing, misplaced, or has the wrong value")]
    BadCoinbase,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("requested head {0} is unknown locally")]
    UnknownRequestedHead(Hash),
}

/// Top-level error composing the per-concern enums, for the few call sites
/// (`Node::receive_block`) that need to report a rejection reason up through
/// one `Result` instead of matching a dedicated enum per caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    BlockValidation(#[from] BlockValidationError),
}
