use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::trace;

use super::{non_root_nodes, replacement_symbols, GeneticOperator};
use crate::grammar::{DepthOracle, Grammar};
use crate::init::grow;
use crate::tree::Tree;
use crate::utils::draw;
use crate::{Error, Result};

/// Grammar-based mutation: replaces one non-terminal subtree with a freshly grown one.
///
/// The replacement is rooted at any symbol that may legally stand at the chosen position, and
/// is grown within the depth left over below that position.
pub struct Mutation<V> {
    grammar: Arc<Grammar<V>>,
    oracle: DepthOracle,
    max_depth: usize,
}
impl<V> Mutation<V> {
    /// Fails with [`Error::Grammar`] if some non-terminal has no finite derivation.
    pub fn new(grammar: Arc<Grammar<V>>, max_depth: usize) -> Result<Self> {
        let oracle = DepthOracle::new(&grammar)?;
        Ok(Mutation {
            grammar,
            oracle,
            max_depth,
        })
    }
    /// Mutate a copy of `parent`. Returns either one offspring or none.
    pub fn mutate<R: Rng + ?Sized>(&self, parent: &Tree, rng: &mut R) -> Result<Vec<Tree>> {
        let g = &*self.grammar;
        let mut tree = parent.clone();
        let mut pool = non_root_nodes(&tree, |s| g.is_non_terminal(s));
        while let Some(cn) = draw(rng, &mut pool) {
            let budget = self.max_depth.saturating_sub(tree.depth(cn));
            let mut legal = replacement_symbols(g, &tree, cn)?;
            while let Some(symbol) = draw(rng, &mut legal) {
                if !self.oracle.fits(symbol, budget) {
                    continue;
                }
                let replacement = grow(g, &self.oracle, symbol, budget, rng)?;
                tree.replace(cn, &replacement)?;
                return Ok(vec![tree]);
            }
        }
        trace!("mutation found no replaceable subtree");
        Ok(Vec::new())
    }
}
impl<V> GeneticOperator for Mutation<V> {
    fn evolve(&self, parents: &[&Tree], rng: &mut dyn RngCore) -> Result<Vec<Tree>> {
        let parent = parents
            .first()
            .ok_or_else(|| Error::Config(String::from("mutation needs a parent")))?;
        self.mutate(parent, rng)
    }
    fn name(&self) -> &str {
        "mutation"
    }
}
