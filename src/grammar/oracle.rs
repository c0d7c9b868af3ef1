use itertools::Itertools;
use std::collections::HashMap;
use tracing::debug;

use super::{Grammar, ProductionId, SymbolId};
use crate::{Error, Result};

/// Derivation depth bounds for every production and non-terminal of a grammar.
///
/// The length of a production is `1` for an all-terminal right-hand side, otherwise one more
/// than the length of its deepest non-terminal. The length of a non-terminal is the smallest
/// length among its productions. Lengths are resolved in declaration order and a production's
/// length is fixed the first time all of its non-terminals have one, so a later, shorter
/// production of a non-terminal does not shorten productions already resolved through it. The
/// lengths are therefore upper bounds on the shallowest derivation, and they can depend on
/// production order: with `B → c`, `A → B`, `S → A`, `A → c` declared in that order, `S` gets
/// length `3` although `S(A(c))` has depth `2`.
///
/// Every length is achievable, so random growth that only picks productions whose length fits
/// the remaining depth never hits a dead end.
#[derive(Debug, Clone)]
pub struct DepthOracle {
    productions: Vec<Option<usize>>,
    symbols: HashMap<SymbolId, usize>,
}
impl DepthOracle {
    /// Resolve lengths by fixed-point iteration. Fails with [`Error::Grammar`] when some
    /// non-terminal can never reach an all-terminal derivation.
    pub fn new<V>(grammar: &Grammar<V>) -> Result<Self> {
        let n = grammar.n_productions();
        let mut productions: Vec<Option<usize>> = vec![None; n];
        let mut symbols: HashMap<SymbolId, usize> = HashMap::new();
        let mut resolved = 0;
        let mut passes = 0;
        let mut stalls = 0;
        while resolved < n {
            passes += 1;
            let mut progressed = false;
            for (id, p) in grammar.productions() {
                if productions[id.0].is_some() {
                    continue;
                }
                let deepest = p
                    .rhs()
                    .iter()
                    .filter(|&&s| grammar.is_non_terminal(s))
                    .try_fold(0, |acc, s| symbols.get(s).map(|&l| acc.max(l)));
                if let Some(deepest) = deepest {
                    let length = deepest + 1;
                    productions[id.0] = Some(length);
                    symbols
                        .entry(p.lhs())
                        .and_modify(|l| *l = (*l).min(length))
                        .or_insert(length);
                    resolved += 1;
                    progressed = true;
                }
            }
            if !progressed {
                stalls += 1;
                if stalls > n {
                    let stuck = grammar
                        .non_terminals()
                        .iter()
                        .filter(|&&nt| !symbols.contains_key(&nt))
                        .map(|&nt| grammar.name(nt))
                        .join(", ");
                    return Err(Error::Grammar(format!(
                        "no finite derivation for {}",
                        if stuck.is_empty() { "some productions" } else { stuck.as_str() }
                    )));
                }
            }
        }
        debug!(productions = n, passes, "resolved derivation depths");
        Ok(DepthOracle {
            productions,
            symbols,
        })
    }
    pub fn production_length(&self, production: ProductionId) -> Option<usize> {
        self.productions.get(production.0).copied().flatten()
    }
    /// `None` for terminals, which need no derivation.
    pub fn symbol_length(&self, symbol: SymbolId) -> Option<usize> {
        self.symbols.get(&symbol).copied()
    }
    /// Whether a tree rooted at `symbol` can be grown within `budget` levels. Terminals always fit.
    pub fn fits(&self, symbol: SymbolId, budget: usize) -> bool {
        self.symbol_length(symbol).map_or(true, |l| l <= budget)
    }
}
