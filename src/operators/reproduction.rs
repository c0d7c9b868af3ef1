use rand::RngCore;

use super::GeneticOperator;
use crate::tree::Tree;
use crate::{Error, Result};

/// Passes an unchanged copy of the first parent on to the next generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reproduction;
impl GeneticOperator for Reproduction {
    fn evolve(&self, parents: &[&Tree], _rng: &mut dyn RngCore) -> Result<Vec<Tree>> {
        match parents.first() {
            Some(&parent) => Ok(vec![parent.clone()]),
            None => Err(Error::Config(String::from("reproduction needs a parent"))),
        }
    }
    fn name(&self) -> &str {
        "reproduction"
    }
}
