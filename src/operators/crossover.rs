use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::trace;

use super::{non_root_nodes, replacement_symbols, GeneticOperator};
use crate::grammar::{Grammar, SymbolId};
use crate::tree::Tree;
use crate::utils::draw;
use crate::{Error, Result};

/// Grammar-based crossover: exchanges one subtree between two parents such that both offspring
/// remain valid derivations no deeper than `max_depth`.
///
/// Subtrees of the first parent are tried in random order. For each, the second parent is
/// searched, again in random order, for a subtree that can legally take its place and whose own
/// place can legally take it. The first such pair is swapped and both offspring are returned. If
/// no pair exists the result is empty.
pub struct Crossover<V> {
    grammar: Arc<Grammar<V>>,
    max_depth: usize,
}
impl<V> Crossover<V> {
    pub fn new(grammar: Arc<Grammar<V>>, max_depth: usize) -> Self {
        Crossover { grammar, max_depth }
    }
    /// Cross copies of `parent1` and `parent2`. Returns either two offspring or none.
    pub fn cross<R: Rng + ?Sized>(
        &self,
        parent1: &Tree,
        parent2: &Tree,
        rng: &mut R,
    ) -> Result<Vec<Tree>> {
        let g = &*self.grammar;
        let mut t1 = parent1.clone();
        let mut t2 = parent2.clone();
        let mut pool1 = non_root_nodes(&t1, |s| g.is_non_terminal(s));
        while let Some(cn1) = draw(rng, &mut pool1) {
            let legal = replacement_symbols(g, &t1, cn1)?;
            let mut pool2 = non_root_nodes(&t2, |s| legal.contains(&s));
            while let Some(cn2) = draw(rng, &mut pool2) {
                if t1.depth(cn1) + t2.subtree_depth(cn2) > self.max_depth
                    || t2.depth(cn2) + t1.subtree_depth(cn1) > self.max_depth
                {
                    continue;
                }
                let s1 = t1.symbol(cn1);
                if s1 != t2.symbol(cn2) {
                    // cn1 must also be able to stand in cn2's place
                    let (parent, position) = t2.position(cn2)?;
                    let mut rhs: Vec<SymbolId> =
                        t2.children(parent).iter().map(|&c| t2.symbol(c)).collect();
                    rhs[position] = s1;
                    if !g.has_production(t2.symbol(parent), &rhs) {
                        continue;
                    }
                }
                Tree::swap(&mut t1, cn1, &mut t2, cn2)?;
                return Ok(vec![t1, t2]);
            }
        }
        trace!("crossover found no exchangeable subtrees");
        Ok(Vec::new())
    }
}
impl<V> GeneticOperator for Crossover<V> {
    fn evolve(&self, parents: &[&Tree], rng: &mut dyn RngCore) -> Result<Vec<Tree>> {
        match parents {
            [p1, p2, ..] => self.cross(p1, p2, rng),
            _ => Err(Error::Config(format!(
                "crossover needs two parents, got {}",
                parents.len()
            ))),
        }
    }
    fn name(&self) -> &str {
        "crossover"
    }
}
