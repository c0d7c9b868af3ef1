//! Derivation trees.
//!
//! A [`Tree`] owns an arena of nodes addressed by [`NodeId`]. Each node records its symbol, its
//! ordered children and the id of its parent, so moving up the tree is O(1) without any node
//! owning another through a back-reference. Symbols are [`SymbolId`] handles into the grammar the
//! tree was derived from; the tree itself knows nothing about symbol kinds, and treats childless
//! nodes as terminals.
//!
//! Splicing ([`Tree::swap`], [`Tree::replace`]) compacts the arena afterwards, which invalidates
//! every `NodeId` previously obtained from the affected trees.

use std::fmt;

use crate::grammar::SymbolId;
use crate::{Error, Result};

/// Index of a node within one [`Tree`]. Meaningless for any other tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    symbol: SymbolId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A rooted, ordered derivation tree. `clone` is a deep copy.
///
/// Equality is structural: two trees are equal when they have the same shape and the same
/// symbol at every position, regardless of how their arenas are laid out.
#[derive(Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}
impl Tree {
    /// A tree consisting of a single root node.
    pub fn new(symbol: SymbolId) -> Self {
        Tree {
            nodes: vec![Node {
                symbol,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }
    pub fn root(&self) -> NodeId {
        self.root
    }
    pub fn symbol(&self, node: NodeId) -> SymbolId {
        self.nodes[node.0].symbol
    }
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.nodes[node.0].children.is_empty()
    }
    /// Append a new childless node under `parent`.
    pub fn push_child(&mut self, parent: NodeId, symbol: SymbolId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            symbol,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }
    /// Every node reachable from the root, in pre-order.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Distance from the root: `0` at the root.
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = node;
        while let Some(parent) = self.parent(cur) {
            depth += 1;
            cur = parent;
        }
        depth
    }
    /// Height of the subtree below `node`: `0` for a leaf.
    pub fn subtree_depth(&self, node: NodeId) -> usize {
        self.children(node)
            .iter()
            .map(|&c| self.subtree_depth(c) + 1)
            .max()
            .unwrap_or(0)
    }
    /// Number of nodes in the subtree rooted at `node`, including `node`.
    pub fn node_count(&self, node: NodeId) -> usize {
        1 + self
            .children(node)
            .iter()
            .map(|&c| self.node_count(c))
            .sum::<usize>()
    }
    /// Height of the whole tree.
    pub fn height(&self) -> usize {
        self.subtree_depth(self.root)
    }
    /// Number of nodes in the whole tree.
    pub fn size(&self) -> usize {
        self.node_count(self.root)
    }

    /// The parent of `node` and the index of `node` among the parent's children.
    pub fn position(&self, node: NodeId) -> Result<(NodeId, usize)> {
        let parent = self
            .parent(node)
            .ok_or_else(|| Error::Structural(String::from("root node has no position")))?;
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == node)
            .ok_or_else(|| {
                Error::Structural(format!(
                    "node {} is missing from the children of its parent {}",
                    node.0, parent.0
                ))
            })?;
        Ok((parent, index))
    }

    /// Copy the subtree rooted at `node` into `dst`, attached under `parent` (or detached when
    /// `parent` is `None`). Symbols are shared, nodes are fresh. Returns the id of the copy in
    /// `dst`. The copy is not registered among the parent's children; the caller splices it.
    pub fn copy_subtree(&self, node: NodeId, dst: &mut Tree, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(dst.nodes.len());
        dst.nodes.push(Node {
            symbol: self.symbol(node),
            parent,
            children: Vec::with_capacity(self.children(node).len()),
        });
        for &child in self.children(node) {
            let copied = self.copy_subtree(child, dst, Some(id));
            dst.nodes[id.0].children.push(copied);
        }
        id
    }
    /// The subtree rooted at `node` as a tree of its own.
    pub fn subtree(&self, node: NodeId) -> Tree {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        self.copy_subtree(node, &mut tree, None);
        tree
    }

    /// Exchange the subtree at `a` in `t1` with the subtree at `b` in `t2`. Each side receives a
    /// fresh copy of the other. Neither node may be a root.
    pub fn swap(t1: &mut Tree, a: NodeId, t2: &mut Tree, b: NodeId) -> Result<()> {
        let (p1, i1) = t1.position(a)?;
        let (p2, i2) = t2.position(b)?;
        let a_copy = t1.copy_subtree(a, t2, Some(p2));
        let b_copy = t2.copy_subtree(b, t1, Some(p1));
        t1.nodes[p1.0].children[i1] = b_copy;
        t2.nodes[p2.0].children[i2] = a_copy;
        t1.compact();
        t2.compact();
        Ok(())
    }
    /// Put a copy of `replacement` in place of the subtree at `target`, which may not be the root.
    pub fn replace(&mut self, target: NodeId, replacement: &Tree) -> Result<()> {
        let (parent, index) = self.position(target)?;
        let copied = replacement.copy_subtree(replacement.root, self, Some(parent));
        self.nodes[parent.0].children[index] = copied;
        self.compact();
        Ok(())
    }

    /// Drop nodes that are no longer reachable from the root and renumber the rest in pre-order.
    fn compact(&mut self) {
        let mut compacted = Tree {
            nodes: Vec::with_capacity(self.nodes.len()),
            root: NodeId(0),
        };
        self.copy_subtree(self.root, &mut compacted, None);
        *self = compacted;
    }

    fn same_shape(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        self.symbol(a) == other.symbol(b)
            && self.children(a).len() == other.children(b).len()
            && self
                .children(a)
                .iter()
                .zip(other.children(b))
                .all(|(&x, &y)| self.same_shape(x, other, y))
    }
}
impl PartialEq for Tree {
    fn eq(&self, other: &Tree) -> bool {
        self.same_shape(self.root, other, other.root)
    }
}
impl Eq for Tree {}
impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn go(t: &Tree, n: NodeId, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{:?}", t.symbol(n))?;
            if !t.is_leaf(n) {
                f.write_str("(")?;
                for (i, &c) in t.children(n).iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    go(t, c, f)?;
                }
                f.write_str(")")?;
            }
            Ok(())
        }
        go(self, self.root, f)
    }
}

/// Pre-order walk over the nodes of a [`Tree`]. See [`Tree::nodes`].
pub struct Nodes<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}
impl Iterator for Nodes<'_> {
    type Item = NodeId;
    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(self.tree.children(node).iter().rev());
        Some(node)
    }
}
