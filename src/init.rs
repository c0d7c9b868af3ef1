use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::debug;

use crate::grammar::{DepthOracle, Grammar, SymbolId};
use crate::tree::{NodeId, Tree};
use crate::{Error, Result};

/// A source of initial populations.
///
/// The [`Engine`](crate::Engine) seeds generation `0` through this trait, so callers can plug in
/// their own initialization scheme with [`Engine::with_initializer`](crate::Engine::with_initializer).
/// [`Initializer`] is the default.
pub trait Genesis {
    /// Create `population_size` trees rooted at `root` (the start symbol if `None`) for a
    /// position at `current_depth`.
    fn generate(
        &self,
        current_depth: usize,
        population_size: usize,
        root: Option<SymbolId>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Tree>>;
}

/// Builds random trees from a grammar without ever exceeding a maximum depth.
///
/// # Examples
///
/// ```
/// use grammargp::grammar::Grammar;
/// use grammargp::Initializer;
/// use rand::{rngs::SmallRng, SeedableRng};
/// use std::sync::Arc;
///
/// let mut b = Grammar::builder();
/// let e = b.non_terminal("E");
/// let plus = b.operation("+", |args: &[i32], _| args[0] + args[1]);
/// let one = b.constant("1", 1);
/// b.non_terminals(&[e]).terminals(&[plus, one]).start(e);
/// b.production(e, &[e, plus, e]).unwrap();
/// b.production(e, &[one]).unwrap();
/// let g = Arc::new(b.build().unwrap());
///
/// let init = Initializer::new(g.clone(), 3).unwrap();
/// let rng = &mut SmallRng::seed_from_u64(7);
/// let trees = init.generate(0, 20, None, rng).unwrap();
/// assert_eq!(trees.len(), 20);
/// assert!(trees.iter().all(|t| t.height() <= 3 && g.check(t).is_ok()));
/// ```
pub struct Initializer<V> {
    grammar: Arc<Grammar<V>>,
    oracle: DepthOracle,
    max_depth: usize,
}
impl<V> Initializer<V> {
    /// Fails with [`Error::Grammar`] if some non-terminal has no finite derivation.
    pub fn new(grammar: Arc<Grammar<V>>, max_depth: usize) -> Result<Self> {
        let oracle = DepthOracle::new(&grammar)?;
        Ok(Initializer {
            grammar,
            oracle,
            max_depth,
        })
    }
    pub fn oracle(&self) -> &DepthOracle {
        &self.oracle
    }
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
    /// Create `population_size` independent trees rooted at `root` (the start symbol if `None`)
    /// that fit below a node sitting at `current_depth`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        current_depth: usize,
        population_size: usize,
        root: Option<SymbolId>,
        rng: &mut R,
    ) -> Result<Vec<Tree>> {
        let root = root.unwrap_or_else(|| self.grammar.start());
        if !self.grammar.is_non_terminal(root) {
            return Err(Error::Config(format!(
                "cannot grow trees from terminal {}",
                self.grammar.name(root)
            )));
        }
        let required = self.oracle.symbol_length(root).ok_or_else(|| {
            Error::Grammar(format!("{} has no derivation", self.grammar.name(root)))
        })?;
        let available = self.max_depth.saturating_sub(current_depth);
        if required > available {
            return Err(Error::DepthUnsatisfiable {
                required,
                available,
            });
        }
        debug!(
            population_size,
            root = self.grammar.name(root),
            available,
            "growing population"
        );
        (0..population_size)
            .map(|_| grow(&self.grammar, &self.oracle, root, available, rng))
            .collect()
    }
}

impl<V> Genesis for Initializer<V> {
    fn generate(
        &self,
        current_depth: usize,
        population_size: usize,
        root: Option<SymbolId>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Tree>> {
        Initializer::generate(self, current_depth, population_size, root, rng)
    }
}

/// Grow a random tree rooted at `symbol` whose height is at most `budget`.
///
/// Every non-terminal picks uniformly among its productions whose oracle length still fits the
/// remaining depth. Callers check [`DepthOracle::fits`] for the root first; below the root a fitting
/// production always exists, so an empty choice is reported as [`Error::Structural`]. A terminal
/// `symbol` grows into a single leaf.
pub(crate) fn grow<V, R: Rng + ?Sized>(
    grammar: &Grammar<V>,
    oracle: &DepthOracle,
    symbol: SymbolId,
    budget: usize,
    rng: &mut R,
) -> Result<Tree> {
    let mut tree = Tree::new(symbol);
    if grammar.is_non_terminal(symbol) {
        let root = tree.root();
        grow_node(grammar, oracle, &mut tree, root, 0, budget, rng)?;
    }
    Ok(tree)
}

fn grow_node<V, R: Rng + ?Sized>(
    grammar: &Grammar<V>,
    oracle: &DepthOracle,
    tree: &mut Tree,
    node: NodeId,
    size: usize,
    budget: usize,
    rng: &mut R,
) -> Result<()> {
    let symbol = tree.symbol(node);
    let viable = grammar
        .productions_of(symbol)
        .iter()
        .copied()
        .filter(|&p| {
            oracle
                .production_length(p)
                .map_or(false, |length| length + size <= budget)
        })
        .collect_vec();
    let &production = viable.choose(rng).ok_or_else(|| {
        Error::Structural(format!(
            "no production of {} fits in depth {}",
            grammar.name(symbol),
            budget.saturating_sub(size)
        ))
    })?;
    for child in grammar.expand(tree, node, production)? {
        if grammar.is_non_terminal(tree.symbol(child)) {
            grow_node(grammar, oracle, tree, child, size + 1, budget, rng)?;
        }
    }
    Ok(())
}
