//! Grammar-guided genetic programming.
//!
//! Programs are derivation trees of a context-free [`grammar`]. Every tree the crate creates,
//! whether by random growth, [crossover](operators::Crossover) or
//! [mutation](operators::Mutation), is a valid derivation of its grammar and no deeper than a
//! configured maximum. Terminals carry meaning: constants and variables are values, operations
//! are functions applied to the values of their sibling subtrees, so a tree can be evaluated
//! with [`Grammar::eval`](grammar::Grammar::eval).
//!
//! A good place to start is [`Engine`].
//!
//! # Examples
//!
//! Find an expression over `x` that doubles its input:
//!
//! ```
//! use grammargp::grammar::Grammar;
//! use grammargp::{Engine, EngineParams, Task};
//! use rand::{rngs::SmallRng, SeedableRng};
//! use std::sync::Arc;
//!
//! let mut b = Grammar::builder();
//! let e = b.non_terminal("E");
//! let plus = b.operation("+", |args: &[i64], _| args[0] + args[1]);
//! let times = b.operation("*", |args: &[i64], _| args[0] * args[1]);
//! let x = b.variable("x");
//! let two = b.constant("2", 2);
//! b.non_terminals(&[e])
//!     .terminals(&[plus, times, x, two])
//!     .start(e);
//! b.production(e, &[e, plus, e]).unwrap();
//! b.production(e, &[e, times, e]).unwrap();
//! b.leaf_productions(e, &[x, two]).unwrap();
//! let g = Arc::new(b.build().unwrap());
//!
//! let examples = vec![(vec![2], 4), (vec![3], 6), (vec![5], 10)];
//! let task = Task::from_examples(&examples, |a: &i64, b: &i64| (a - b).abs() as f64);
//! let params = EngineParams {
//!     max_depth: 3,
//!     population_size: 30,
//!     generations: 20,
//!     terminate_on_optimum: true,
//! };
//! let mut engine = Engine::new(g.clone(), task, params).unwrap();
//! let ranked = engine.run(&mut SmallRng::seed_from_u64(42)).unwrap();
//! let best = &ranked[0];
//! assert!(best.tree().height() <= 3);
//! assert!(g.check(best.tree()).is_ok());
//! ```

pub mod grammar;
pub mod operators;
pub mod tree;
mod error;
mod gp;
mod init;
mod select;
mod utils;

pub use error::{Error, Result};
pub use gp::{Engine, EngineParams};
pub use init::{Genesis, Initializer};
pub use select::{rank_and_sort, RankedCandidate, Selector, TournamentSelector};

use grammar::Grammar;
use tree::Tree;

/// The representation of a task which is solved by a [`Tree`] under some [`Grammar`].
///
/// We adopt the convention that the oracle measures error: smaller values are better and `0`
/// means solved. A task can be made from input/output examples with [`from_examples`].
///
/// [`from_examples`]: #method.from_examples
pub struct Task<'a, V> {
    /// Evaluate a tree by getting its fitness.
    pub oracle: Box<dyn Fn(&Grammar<V>, &Tree) -> f64 + 'a>,
}
impl<'a, V: Clone + 'a> Task<'a, V> {
    /// Each example pairs the variable bindings of one input with the value the tree should
    /// produce for it. Fitness is the sum of `distance(target, actual)` over all examples, or
    /// infinity if the tree fails to evaluate on any of them.
    pub fn from_examples<F>(examples: &'a [(Vec<V>, V)], distance: F) -> Self
    where
        F: Fn(&V, &V) -> f64 + 'a,
    {
        let oracle = Box::new(move |g: &Grammar<V>, tree: &Tree| {
            examples
                .iter()
                .map(|(bindings, target)| {
                    g.eval(tree, bindings)
                        .map_or(f64::INFINITY, |actual| distance(target, &actual))
                })
                .sum::<f64>()
        });
        Task { oracle }
    }
}
