//! The block tree (§4.1), re-architected per the design notes as an arena of
//! nodes addressed by small integer indices rather than mutable parent
//! back-pointers: `parent: Option<NodeIndex>` and `children: Vec<NodeIndex>`,
//! so weight-propagation walks are index chases with no ownership cycles.

use crate::error::TreeError;
use crate::model::Block;
use crate::types::Hash;
use std::collections::HashMap;

pub type NodeIndex = usize;

#[derive(Debug, Clone)]
pub struct BlockTreeNode {
    pub hash: Hash,
    /// `None` only for the synthetic null root.
    pub block: Option<Block>,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub attested_eth: u128,
    pub is_invalid: bool,
}

impl BlockTreeNode {
    pub fn height(&self) -> u64 {
        self.block.as_ref().map(|b| b.header.height).unwrap_or(0)
    }
}

/// Authoritative DAG of observed blocks. The null root (hash =
/// `genesis_prev_hash`) is the parent of every genesis block, supporting
/// multiple genesis blocks and arbitrary forks below them.
#[derive(Debug, Clone)]
pub struct BlockTree {
    nodes: Vec<BlockTreeNode>,
    index_by_hash: HashMap<Hash, NodeIndex>,
    null_root: NodeIndex,
    ghost_head: NodeIndex,
}

impl BlockTree {
    pub fn new(genesis_prev_hash: Hash) -> BlockTree {
        let null_root_node = BlockTreeNode {
            hash: genesis_prev_hash,
            block: None,
            parent: None,
            children: Vec::new(),
            attested_eth: 0,
            is_invalid: false,
        };
        let mut index_by_hash = HashMap::new();
        index_by_hash.insert(genesis_prev_hash, 0);
        BlockTree { nodes: vec![null_root_node], index_by_hash, null_root: 0, ghost_head: 0 }
    }

    pub fn null_root(&self) -> NodeIndex {
        self.null_root
    }

    /// Inserts `block` if unseen; returns the (possibly pre-existing) node
    /// index, or `Err` if the parent has not been observed.
    pub fn add_block(&mut self, block: Block) -> Result<NodeIndex, TreeError> {
        if let Some(&existing) = self.index_by_hash.get(&block.hash) {
            return Ok(existing);
        }
        let parent_index = *self
            .index_by_hash
            .get(&block.header.previous_header_hash)
            .ok_or(TreeError::UnknownParent(block.header.previous_header_hash))?;

        let hash = block.hash;
        let node = BlockTreeNode {
            hash,
            block: Some(block),
            parent: Some(parent_index),
            children: Vec::new(),
            attested_eth: 0,
            is_invalid: false,
        };
        let index = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent_index].children.push(index);
        self.index_by_hash.insert(hash, index);
        Ok(index)
    }

    pub fn index_of(&self, hash: Hash) -> Option<NodeIndex> {
        self.index_by_hash.get(&hash).copied()
    }

    pub fn node(&self, index: NodeIndex) -> &BlockTreeNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut BlockTreeNode {
        &mut self.nodes[index]
    }

    pub fn get_node(&self, hash: Hash) -> Option<&BlockTreeNode> {
        self.index_of(hash).map(|i| self.node(i))
    }

    pub fn get_all_blocks(&self) -> Vec<&Block> {
        self.nodes.iter().filter_map(|n| n.block.as_ref()).collect()
    }

    pub fn ghost_head_index(&self) -> NodeIndex {
        self.ghost_head
    }

    pub fn ghost_head_hash(&self) -> Hash {
        self.nodes[self.ghost_head].hash
    }

    pub fn set_ghost_head(&mut self, hash: Hash) -> Result<(), TreeError> {
        let index = self.index_of(hash).ok_or(TreeError::UnknownHead(hash))?;
        self.ghost_head = index;
        Ok(())
    }

    /// Walks parent links from `from` (or the current GHOST-HEAD) up to, but
    /// not including, the null root, reversing so the result runs genesis
    /// to head.
    pub fn canonical_chain(&self, from: Option<Hash>) -> Result<Vec<Block>, TreeError> {
        let start = match from {
            Some(h) => self.index_of(h).ok_or(TreeError::UnknownHead(h))?,
            None => self.ghost_head,
        };
        let mut blocks = Vec::new();
        let mut cursor = start;
        while cursor != self.null_root {
            let node = &self.nodes[cursor];
            blocks.push(node.block.clone().expect("non-root node always carries a block"));
            cursor = node.parent.expect("non-root node always has a parent");
        }
        blocks.reverse();
        Ok(blocks)
    }

    /// Indices from `index` up to and including the null root, closest first.
    pub fn ancestors_inclusive(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            out.push(i);
            if i == self.null_root {
                break;
            }
            cursor = self.nodes[i].parent;
        }
        out
    }

    /// True if `descendant` is `ancestor` or a strict descendant of it.
    pub fn is_descendant(&self, ancestor: NodeIndex, descendant: NodeIndex) -> bool {
        let mut cursor = Some(descendant);
        while let Some(i) = cursor {
            if i == ancestor {
                return true;
            }
            if i == self.null_root {
                return false;
            }
            cursor = self.nodes[i].parent;
        }
        false
    }

    /// Blocks strictly after `old` up to and including `new`, in
    /// genesis-to-head order. `None` if `new` is not a (possibly equal)
    /// descendant of `old`.
    pub fn path_between(&self, old: NodeIndex, new: NodeIndex) -> Option<Vec<Block>> {
        if !self.is_descendant(old, new) {
            return None;
        }
        let mut blocks = Vec::new();
        let mut cursor = new;
        while cursor != old {
            blocks.push(self.nodes[cursor].block.clone().expect("non-root node carries a block"));
            cursor = self.nodes[cursor].parent.expect("reached null root before `old`");
        }
        blocks.reverse();
        Some(blocks)
    }

    pub fn add_weight(&mut self, index: NodeIndex, amount: u64) {
        self.nodes[index].attested_eth = self.nodes[index].attested_eth.saturating_add(amount as u128);
    }

    pub fn sub_weight(&mut self, index: NodeIndex, amount: u64) {
        self.nodes[index].attested_eth = self.nodes[index].attested_eth.saturating_sub(amount as u128);
    }
}
