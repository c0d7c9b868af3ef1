//! Ranking and rank-proportional selection.

use rand::{Rng, RngCore};
use std::cmp::Ordering;

use crate::tree::Tree;

/// A tree together with its fitness. Lower fitness is better and `0` is optimal.
///
/// Candidates are ordered by ascending fitness (IEEE total order), then by ascending node
/// count, so that among equally fit trees the smaller one ranks first.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    tree: Tree,
    fitness: f64,
    size: usize,
}
impl RankedCandidate {
    pub fn new(tree: Tree, fitness: f64) -> Self {
        let size = tree.size();
        RankedCandidate {
            tree,
            fitness,
            size,
        }
    }
    pub fn tree(&self) -> &Tree {
        &self.tree
    }
    pub fn fitness(&self) -> f64 {
        self.fitness
    }
    /// Node count of the tree.
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn into_tree(self) -> Tree {
        self.tree
    }
}
impl Ord for RankedCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fitness
            .total_cmp(&other.fitness)
            .then(self.size.cmp(&other.size))
    }
}
impl PartialOrd for RankedCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for RankedCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for RankedCandidate {}

/// Score every tree once with `fitness` and sort best first. The sort is stable, so a
/// population that is already in order keeps its order.
pub fn rank_and_sort<F>(population: Vec<Tree>, fitness: F) -> Vec<RankedCandidate>
where
    F: Fn(&Tree) -> f64,
{
    let mut ranked: Vec<_> = population
        .into_iter()
        .map(|tree| {
            let f = fitness(&tree);
            RankedCandidate::new(tree, f)
        })
        .collect();
    ranked.sort();
    ranked
}

/// Picks individuals out of a ranked population.
pub trait Selector {
    fn next(&self, rng: &mut dyn RngCore) -> &RankedCandidate;
}

/// Rank-proportional selection over a population sorted best first.
///
/// Of `N` candidates, the one at rank `i` is picked with probability `(N - i) / (N(N+1)/2)`: the
/// best is `N` times as likely as the worst.
///
/// # Examples
///
/// ```
/// use grammargp::grammar::Grammar;
/// use grammargp::tree::Tree;
/// use grammargp::{rank_and_sort, Selector, TournamentSelector};
/// use rand::{rngs::SmallRng, SeedableRng};
///
/// let mut b = Grammar::<i32>::builder();
/// let s = b.non_terminal("S");
/// let ranked = rank_and_sort(vec![Tree::new(s), Tree::new(s)], |_| 1.0);
/// let selector = TournamentSelector::new(&ranked).unwrap();
/// let rng = &mut SmallRng::seed_from_u64(0);
/// assert_eq!(selector.next(rng).fitness(), 1.0);
/// ```
pub struct TournamentSelector<'a> {
    population: &'a [RankedCandidate],
    cumulative: Vec<f64>,
}
impl<'a> TournamentSelector<'a> {
    /// `None` if `population` is empty.
    pub fn new(population: &'a [RankedCandidate]) -> Option<Self> {
        if population.is_empty() {
            return None;
        }
        let n = population.len() as f64;
        let total = n * (n + 1.0) / 2.0;
        let cumulative = (0..population.len())
            .scan(0.0, |acc, i| {
                *acc += (n - i as f64) / total;
                Some(*acc)
            })
            .collect();
        Some(TournamentSelector {
            population,
            cumulative,
        })
    }
    /// Probability of picking rank `i`.
    pub fn weight(&self, i: usize) -> f64 {
        let n = self.population.len() as f64;
        (n - i as f64) / (n * (n + 1.0) / 2.0)
    }
}
impl Selector for TournamentSelector<'_> {
    fn next(&self, rng: &mut dyn RngCore) -> &RankedCandidate {
        let r: f64 = rng.gen();
        let i = self
            .cumulative
            .iter()
            .position(|&c| r < c)
            .unwrap_or(0);
        &self.population[i]
    }
}
