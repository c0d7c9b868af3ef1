//! Structure-preserving genetic operators.
//!
//! Every operator works on deep copies of its parents and only ever produces trees that are valid
//! derivations of the grammar and no deeper than the configured maximum. When an operator cannot
//! find a legal move it returns an empty `Vec`; that is a normal outcome, not an error.

mod crossover;
mod mutation;
mod reproduction;
pub use self::crossover::Crossover;
pub use self::mutation::Mutation;
pub use self::reproduction::Reproduction;

use itertools::Itertools;
use rand::RngCore;

use crate::grammar::{Grammar, SymbolId};
use crate::tree::{NodeId, Tree};
use crate::Result;

/// Produces offspring from parents.
///
/// Implementors take `&mut dyn RngCore` so that operators of different types can live together
/// in one engine.
pub trait GeneticOperator {
    /// Create offspring from `parents`, which are never modified. An empty result means no legal
    /// move exists for these parents.
    fn evolve(&self, parents: &[&Tree], rng: &mut dyn RngCore) -> Result<Vec<Tree>>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Nodes other than the root whose symbol satisfies `keep`.
fn non_root_nodes<F>(tree: &Tree, keep: F) -> Vec<NodeId>
where
    F: Fn(SymbolId) -> bool,
{
    let root = tree.root();
    tree.nodes()
        .filter(|&n| n != root && keep(tree.symbol(n)))
        .collect()
}

/// The symbols that may stand at `node`'s position without invalidating its parent's derivation.
///
/// A production of the parent's non-terminal is compatible when it has the same length as the
/// parent's current production and the very same symbols at every other position. The result
/// always contains `node`'s own symbol.
fn replacement_symbols<V>(
    grammar: &Grammar<V>,
    tree: &Tree,
    node: NodeId,
) -> Result<Vec<SymbolId>> {
    let (parent, position) = tree.position(node)?;
    let current = tree
        .children(parent)
        .iter()
        .map(|&c| tree.symbol(c))
        .collect_vec();
    Ok(grammar
        .productions_of(tree.symbol(parent))
        .iter()
        .map(|&p| grammar.production(p).rhs())
        .filter(|rhs| {
            rhs.len() == current.len()
                && rhs
                    .iter()
                    .zip(&current)
                    .enumerate()
                    .all(|(i, (a, b))| i == position || a == b)
        })
        .map(|rhs| rhs[position])
        .unique()
        .collect())
}
