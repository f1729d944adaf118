//! The three-message sync protocol (§4.8) by which nodes converge on a
//! common view of the block tree. Fork choice (attestation gossip) is what
//! actually moves HEAD; this protocol only ensures every node has observed
//! the blocks a peer's head implies.

use crate::model::Block;
use crate::tree::BlockTree;
use crate::types::Hash;
use serde::{Deserialize, Serialize};

pub type NodeId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadBroadcast {
    pub from: NodeId,
    pub head_hash: Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRequest {
    pub from: NodeId,
    pub to: NodeId,
    pub requested_head: Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    pub from: NodeId,
    pub to: NodeId,
    pub requested_head: Hash,
    pub blocks: Vec<Block>,
}

/// The three wire messages of §4.8, boxed together so a node's
/// `receive_message` entry point can dispatch on one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncMessage {
    HeadBroadcast(HeadBroadcast),
    ChainRequest(ChainRequest),
    ChainResponse(ChainResponse),
}

/// React to a peer's periodic head broadcast: if we have never seen that
/// block, ask the peer for the chain behind it. Duplicate requests for a
/// head we already lack are idempotent — issuing one again is harmless, it
/// is up to the caller not to spam peers on every broadcast tick.
pub fn on_head_broadcast(tree: &BlockTree, self_id: &NodeId, broadcast: &HeadBroadcast) -> Option<ChainRequest> {
    if tree.get_node(broadcast.head_hash).is_some() {
        return None;
    }
    Some(ChainRequest { from: self_id.clone(), to: broadcast.from.clone(), requested_head: broadcast.head_hash })
}

/// Responds with the canonical chain from `requested_head` back to the
/// genesis level, or no response at all if we don't have that head (§4.8
/// "Failure modes: ... missing parent in response is a silent drop").
pub fn on_chain_request(tree: &BlockTree, self_id: &NodeId, request: &ChainRequest) -> Option<ChainResponse> {
    let blocks = tree.canonical_chain(Some(request.requested_head)).ok()?;
    Some(ChainResponse {
        from: self_id.clone(),
        to: request.from.clone(),
        requested_head: request.requested_head,
        blocks,
    })
}

/// Applies every block of a chain response in order; a block whose parent
/// is still missing is silently dropped (and so is everything after it in
/// this particular batch — a later broadcast/request round will retry).
/// An unsolicited response (one the caller never requested) is simply
/// handled the same way: it either extends the tree or is a no-op.
pub fn apply_chain_response(tree: &mut BlockTree, response: &ChainResponse) -> usize {
    let mut applied = 0;
    for block in &response.blocks {
        match tree.add_block(block.clone()) {
            Ok(_) => applied += 1,
            Err(_) => break,
        }
    }
    applied
}
