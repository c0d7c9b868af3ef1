//! The generational evolution loop.

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::grammar::Grammar;
use crate::operators::{Crossover, GeneticOperator, Mutation, Reproduction};
use crate::select::{rank_and_sort, RankedCandidate, Selector, TournamentSelector};
use crate::tree::Tree;
use crate::utils::cumulative;
use crate::init::Genesis;
use crate::{Error, Initializer, Result, Task};

/// Consecutive empty breeding rounds after which a warning is logged.
const BARREN_ROUNDS: usize = 1000;

/// Parameters for a run of the [`Engine`].
///
/// Every field has a default, so partial configurations deserialize:
///
/// ```
/// use grammargp::EngineParams;
///
/// let params: EngineParams = serde_json::from_str(r#"{"population_size": 20}"#).unwrap();
/// assert_eq!(params.population_size, 20);
/// assert_eq!(params.max_depth, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineParams {
    /// No tree in any generation is deeper than this.
    #[serde(alias = "maxDepth")]
    pub max_depth: usize,
    #[serde(alias = "populationSize")]
    pub population_size: usize,
    /// Number of breeding rounds after the initial population.
    pub generations: usize,
    /// Stop as soon as a generation contains an individual of fitness `0`.
    #[serde(alias = "terminate_on_max_fitness")]
    pub terminate_on_optimum: bool,
}
impl Default for EngineParams {
    fn default() -> Self {
        EngineParams {
            max_depth: 5,
            population_size: 100,
            generations: 100,
            terminate_on_optimum: false,
        }
    }
}

/// Grammar-guided genetic programming.
///
/// An engine grows a random initial population from the grammar, then repeatedly ranks it with
/// the [`Task`] oracle and breeds the next generation from parents chosen by
/// [`TournamentSelector`]. Each breeding round picks one operator at random according to the
/// operator percentages. By default these are [`Reproduction`], [`Crossover`] and [`Mutation`]
/// at 5%, 90% and 2%, so a few rounds pass without offspring.
///
/// # Examples
///
/// ```
/// use grammargp::grammar::Grammar;
/// use grammargp::tree::Tree;
/// use grammargp::{Engine, EngineParams, Task};
/// use rand::{rngs::SmallRng, SeedableRng};
/// use std::sync::Arc;
///
/// let mut b = Grammar::builder();
/// let e = b.non_terminal("E");
/// let plus = b.operation("+", |args: &[i64], _| args[0] + args[1]);
/// let one = b.constant("1", 1);
/// let two = b.constant("2", 2);
/// b.non_terminals(&[e]).terminals(&[plus, one, two]).start(e);
/// b.production(e, &[e, plus, e]).unwrap();
/// b.leaf_productions(e, &[one, two]).unwrap();
/// let g = Arc::new(b.build().unwrap());
///
/// let task = Task {
///     oracle: Box::new(|g: &Grammar<i64>, t: &Tree| match g.eval(t, &[]) {
///         Ok(n) => (n - 7).abs() as f64,
///         Err(_) => f64::INFINITY,
///     }),
/// };
/// let params = EngineParams {
///     max_depth: 4,
///     population_size: 20,
///     generations: 10,
///     terminate_on_optimum: true,
/// };
/// let mut engine = Engine::new(g, task, params).unwrap();
/// let rng = &mut SmallRng::seed_from_u64(1);
/// let ranked = engine.run(rng).unwrap();
/// assert_eq!(ranked.len(), 20);
/// assert!(ranked.windows(2).all(|w| w[0] <= w[1]));
/// ```
pub struct Engine<'a, V> {
    grammar: Arc<Grammar<V>>,
    task: Task<'a, V>,
    params: EngineParams,
    initializer: Box<dyn Genesis + 'a>,
    operators: Vec<Box<dyn GeneticOperator + 'a>>,
    thresholds: Vec<u32>,
    observer: Option<Box<dyn FnMut(usize, &[RankedCandidate]) + 'a>>,
}
impl<'a, V: 'a> Engine<'a, V> {
    /// Fails with [`Error::Config`] if `population_size` is below two, or with
    /// [`Error::Grammar`] if some non-terminal has no finite derivation.
    pub fn new(
        grammar: Arc<Grammar<V>>,
        task: Task<'a, V>,
        params: EngineParams,
    ) -> Result<Self> {
        if params.population_size < 2 {
            return Err(Error::Config(format!(
                "population size must be at least 2, got {}",
                params.population_size
            )));
        }
        let initializer = Box::new(Initializer::new(grammar.clone(), params.max_depth)?);
        let mut engine = Engine {
            grammar,
            task,
            params,
            initializer,
            operators: Vec::new(),
            thresholds: Vec::new(),
            observer: None,
        };
        engine.install_defaults(5, 90, 2)?;
        Ok(engine)
    }
    /// Use the default operators with the given percentages for reproduction, crossover and
    /// mutation.
    pub fn with_probabilities(
        mut self,
        reproduction: u32,
        crossover: u32,
        mutation: u32,
    ) -> Result<Self> {
        self.install_defaults(reproduction, crossover, mutation)?;
        Ok(self)
    }
    /// Replace the operator table. `percentages[i]` is the chance, out of 100, that a breeding
    /// round applies `operators[i]`. Rounds whose draw falls beyond the total do nothing.
    pub fn with_operators(
        mut self,
        operators: Vec<Box<dyn GeneticOperator + 'a>>,
        percentages: Vec<u32>,
    ) -> Result<Self> {
        if operators.is_empty() {
            return Err(Error::Config(String::from("no genetic operators given")));
        }
        if operators.len() != percentages.len() {
            return Err(Error::Config(format!(
                "{} operators but {} percentages",
                operators.len(),
                percentages.len()
            )));
        }
        check_percentages(&percentages)?;
        let names = operators.iter().map(|op| op.name()).join(", ");
        debug!(operators = %names, ?percentages, "installed genetic operators");
        self.thresholds = cumulative(&percentages);
        self.operators = operators;
        Ok(self)
    }
    /// Seed generation `0` from `initializer` instead of the default [`Initializer`].
    pub fn with_initializer<I>(mut self, initializer: I) -> Self
    where
        I: Genesis + 'a,
    {
        self.initializer = Box::new(initializer);
        self
    }
    /// Call `observer` with every ranked generation, starting with generation `0`.
    pub fn on_generation<F>(mut self, observer: F) -> Self
    where
        F: FnMut(usize, &[RankedCandidate]) + 'a,
    {
        self.observer = Some(Box::new(observer));
        self
    }
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Evolve a population and return its final generation, best first.
    pub fn run<R: Rng>(&mut self, rng: &mut R) -> Result<Vec<RankedCandidate>> {
        let population = self
            .initializer
            .generate(0, self.params.population_size, None, rng)?;
        if population.len() < 2 {
            return Err(Error::Config(format!(
                "initial population needs at least 2 trees, got {}",
                population.len()
            )));
        }
        let mut ranked = self.rank(population);
        let mut generation = 0;
        loop {
            let best = ranked
                .first()
                .ok_or_else(|| Error::Config(String::from("empty population")))?;
            let optimal = best.fitness() == 0.0;
            info!(
                generation,
                best_fitness = best.fitness(),
                best_size = best.size(),
                population = ranked.len(),
                "ranked generation"
            );
            if let Some(observer) = self.observer.as_mut() {
                observer(generation, &ranked);
            }
            if self.params.terminate_on_optimum && optimal {
                break;
            }
            if generation >= self.params.generations {
                break;
            }
            let next = self.breed(&ranked, rng)?;
            ranked = self.rank(next);
            generation += 1;
        }
        Ok(ranked)
    }

    fn install_defaults(
        &mut self,
        reproduction: u32,
        crossover: u32,
        mutation: u32,
    ) -> Result<()> {
        let percentages = vec![reproduction, crossover, mutation];
        check_percentages(&percentages)?;
        let max_depth = self.params.max_depth;
        let operators: Vec<Box<dyn GeneticOperator + 'a>> = vec![
            Box::new(Reproduction),
            Box::new(Crossover::new(self.grammar.clone(), max_depth)),
            Box::new(Mutation::new(self.grammar.clone(), max_depth)?),
        ];
        self.thresholds = cumulative(&percentages);
        self.operators = operators;
        debug!(reproduction, crossover, mutation, "installed default operators");
        Ok(())
    }

    fn rank(&self, population: Vec<Tree>) -> Vec<RankedCandidate> {
        rank_and_sort(population, |tree| (self.task.oracle)(&self.grammar, tree))
    }

    /// Fill a new generation of exactly `population_size` trees.
    fn breed<R: Rng>(&self, ranked: &[RankedCandidate], rng: &mut R) -> Result<Vec<Tree>> {
        let size = self.params.population_size;
        let selector = TournamentSelector::new(ranked)
            .ok_or_else(|| Error::Config(String::from("cannot breed from an empty population")))?;
        let mut next = Vec::with_capacity(size);
        let mut barren = 0;
        while next.len() < size {
            let parent1 = selector.next(rng);
            let mut parent2 = selector.next(rng);
            while ptr::eq(parent1, parent2) {
                parent2 = selector.next(rng);
            }
            let draw: u32 = rng.gen_range(0..100);
            let offspring = match self.thresholds.iter().position(|&t| draw < t) {
                Some(i) => {
                    let op = &self.operators[i];
                    let offspring = op.evolve(&[parent1.tree(), parent2.tree()], rng)?;
                    trace!(
                        operator = op.name(),
                        offspring = offspring.len(),
                        "applied operator"
                    );
                    offspring
                }
                None => Vec::new(),
            };
            if offspring.is_empty() {
                barren += 1;
                if barren % BARREN_ROUNDS == 0 {
                    warn!(
                        rounds = barren,
                        filled = next.len(),
                        "breeding keeps producing no offspring"
                    );
                }
            } else {
                barren = 0;
                next.extend(offspring);
            }
        }
        next.truncate(size);
        Ok(next)
    }
}

/// A table whose percentages are all zero never applies any operator, so breeding would never
/// finish.
fn check_percentages(percentages: &[u32]) -> Result<()> {
    if percentages.iter().all(|&p| p == 0) {
        return Err(Error::Config(format!(
            "operator percentages {:?} never select an operator",
            percentages
        )));
    }
    Ok(())
}
