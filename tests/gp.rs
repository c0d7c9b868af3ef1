use proptest::prelude::*;
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use std::sync::Arc;

use grammargp::grammar::{Grammar, SymbolId};
use grammargp::operators::{Crossover, GeneticOperator, Mutation, Reproduction};
use grammargp::tree::Tree;
use grammargp::{
    rank_and_sort, Engine, EngineParams, Error, Genesis, Initializer, RankedCandidate, Selector,
    Task, TournamentSelector,
};

/// `E → E + E | E - E | F`, `F → 0 | 1 | 2`
fn arith() -> Arc<Grammar<i64>> {
    let mut b = Grammar::builder();
    let e = b.non_terminal("E");
    let f = b.non_terminal("F");
    let plus = b.operation("+", |args: &[i64], _| args[0] + args[1]);
    let minus = b.operation("-", |args: &[i64], _| args[0] - args[1]);
    let zero = b.constant("0", 0);
    let one = b.constant("1", 1);
    let two = b.constant("2", 2);
    b.non_terminals(&[e, f])
        .terminals(&[plus, minus, zero, one, two])
        .start(e);
    b.production(e, &[e, plus, e]).unwrap();
    b.production(e, &[e, minus, e]).unwrap();
    b.production(e, &[f]).unwrap();
    b.leaf_productions(f, &[zero, one, two]).unwrap();
    Arc::new(b.build().unwrap())
}

fn symbol(g: &Grammar<i64>, name: &str) -> SymbolId {
    g.non_terminals()
        .iter()
        .chain(g.terminals())
        .copied()
        .find(|&s| g.name(s) == name)
        .unwrap()
}

fn value_task<'a>(target: i64) -> Task<'a, i64> {
    Task {
        oracle: Box::new(move |g: &Grammar<i64>, t: &Tree| match g.eval(t, &[]) {
            Ok(n) => (n - target).abs() as f64,
            Err(_) => f64::INFINITY,
        }),
    }
}

#[test]
fn initializer_respects_depth() {
    let g = arith();
    let init = Initializer::new(g.clone(), 2).unwrap();
    assert_eq!(init.max_depth(), 2);
    assert_eq!(init.oracle().symbol_length(g.start()), Some(2));
    let rng = &mut SmallRng::seed_from_u64(0);
    let trees = init.generate(0, 10, None, rng).unwrap();
    assert_eq!(trees.len(), 10);
    for tree in &trees {
        assert!(tree.height() <= 2);
        assert!(g.check(tree).is_ok());
        for leaf in g.leaves(tree).chars() {
            assert!("012+-".contains(leaf));
        }
    }
}

#[test]
fn initializer_rejects_unsatisfiable_depth() {
    let g = arith();
    let rng = &mut SmallRng::seed_from_u64(0);
    let shallow = Initializer::new(g.clone(), 1).unwrap();
    assert_eq!(
        shallow.generate(0, 5, None, rng).unwrap_err(),
        Error::DepthUnsatisfiable {
            required: 2,
            available: 1
        }
    );
    let deep = Initializer::new(g.clone(), 3).unwrap();
    assert_eq!(
        deep.generate(2, 5, None, rng).unwrap_err(),
        Error::DepthUnsatisfiable {
            required: 2,
            available: 1
        }
    );
    let f = symbol(&g, "F");
    let trees = deep.generate(2, 5, Some(f), rng).unwrap();
    assert!(trees.iter().all(|t| t.height() == 1));
}

#[test]
fn initializer_rejects_terminal_roots() {
    let g = arith();
    let init = Initializer::new(g.clone(), 3).unwrap();
    let rng = &mut SmallRng::seed_from_u64(0);
    let one = symbol(&g, "1");
    assert!(matches!(
        init.generate(0, 1, Some(one), rng),
        Err(Error::Config(_))
    ));
}

#[test]
fn initializer_rejects_grammars_without_finite_derivations() {
    let mut b = Grammar::builder();
    let e = b.non_terminal("E");
    let plus = b.operation("+", |args: &[i64], _| args[0] + args[1]);
    b.non_terminals(&[e]).terminals(&[plus]).start(e);
    b.production(e, &[e, plus, e]).unwrap();
    let g = Arc::new(b.build().unwrap());
    assert!(matches!(
        Initializer::new(g.clone(), 5).err(),
        Some(Error::Grammar(_))
    ));
    assert!(matches!(Mutation::new(g, 5).err(), Some(Error::Grammar(_))));
}

#[test]
fn crossover_swaps_compatible_subtrees() {
    let g = arith();
    let init = Initializer::new(g.clone(), 2).unwrap();
    let rng = &mut SmallRng::seed_from_u64(3);
    // at depth 2 every tree is E(F(leaf))
    let trees = init.generate(0, 2, None, rng).unwrap();
    let crossover = Crossover::new(g.clone(), 2);
    let offspring = crossover.cross(&trees[0], &trees[1], rng).unwrap();
    assert_eq!(offspring.len(), 2);
    assert_eq!(g.display(&offspring[0]), g.display(&trees[1]));
    assert_eq!(g.display(&offspring[1]), g.display(&trees[0]));
}

#[test]
fn crossover_without_candidates_is_empty() {
    let mut b = Grammar::builder();
    let s = b.non_terminal("S");
    let a = b.constant("a", 1);
    b.non_terminals(&[s]).terminals(&[a]).start(s);
    b.production(s, &[a]).unwrap();
    let g = Arc::new(b.build().unwrap());
    let init = Initializer::new(g.clone(), 3).unwrap();
    let rng = &mut SmallRng::seed_from_u64(0);
    let trees = init.generate(0, 2, None, rng).unwrap();
    let crossover = Crossover::new(g.clone(), 3);
    assert!(crossover.cross(&trees[0], &trees[1], rng).unwrap().is_empty());
    let mutation = Mutation::new(g, 3).unwrap();
    assert!(mutation.mutate(&trees[0], rng).unwrap().is_empty());
}

#[test]
fn operators_check_their_parents() {
    let g = arith();
    let init = Initializer::new(g.clone(), 3).unwrap();
    let rng = &mut SmallRng::seed_from_u64(0);
    let trees = init.generate(0, 1, None, rng).unwrap();
    let crossover = Crossover::new(g.clone(), 3);
    assert!(matches!(
        crossover.evolve(&[&trees[0]], rng),
        Err(Error::Config(_))
    ));
    assert!(matches!(Reproduction.evolve(&[], rng), Err(Error::Config(_))));
    let mutation = Mutation::new(g, 3).unwrap();
    assert!(matches!(mutation.evolve(&[], rng), Err(Error::Config(_))));
}

#[test]
fn reproduction_copies_first_parent() {
    let g = arith();
    let init = Initializer::new(g.clone(), 4).unwrap();
    let rng = &mut SmallRng::seed_from_u64(9);
    let trees = init.generate(0, 2, None, rng).unwrap();
    let offspring = Reproduction.evolve(&[&trees[0], &trees[1]], rng).unwrap();
    assert_eq!(offspring, vec![trees[0].clone()]);
    assert_eq!(Reproduction.name(), "reproduction");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn crossover_preserves_validity(seed in any::<u64>()) {
        let g = arith();
        let max_depth = 4;
        let init = Initializer::new(g.clone(), max_depth).unwrap();
        let rng = &mut SmallRng::seed_from_u64(seed);
        let trees = init.generate(0, 10, None, rng).unwrap();
        let crossover = Crossover::new(g.clone(), max_depth);
        for pair in trees.windows(2) {
            let before = (pair[0].clone(), pair[1].clone());
            let offspring = crossover.cross(&pair[0], &pair[1], rng).unwrap();
            prop_assert!(offspring.is_empty() || offspring.len() == 2);
            for child in &offspring {
                prop_assert!(child.height() <= max_depth);
                prop_assert!(g.check(child).is_ok());
            }
            prop_assert_eq!(&before.0, &pair[0]);
            prop_assert_eq!(&before.1, &pair[1]);
        }
    }

    #[test]
    fn mutation_preserves_validity(seed in any::<u64>()) {
        let g = arith();
        let max_depth = 4;
        let init = Initializer::new(g.clone(), max_depth).unwrap();
        let rng = &mut SmallRng::seed_from_u64(seed);
        let trees = init.generate(0, 10, None, rng).unwrap();
        let mutation = Mutation::new(g.clone(), max_depth).unwrap();
        for tree in &trees {
            let before = tree.clone();
            let offspring = mutation.mutate(tree, rng).unwrap();
            prop_assert!(offspring.len() <= 1);
            for child in &offspring {
                prop_assert!(child.height() <= max_depth);
                prop_assert!(g.check(child).is_ok());
            }
            prop_assert_eq!(&before, tree);
        }
    }

    #[test]
    fn initializer_preserves_validity(seed in any::<u64>(), max_depth in 2usize..6) {
        let g = arith();
        let init = Initializer::new(g.clone(), max_depth).unwrap();
        let rng = &mut SmallRng::seed_from_u64(seed);
        for tree in init.generate(0, 10, None, rng).unwrap() {
            prop_assert!(tree.height() <= max_depth);
            prop_assert!(g.check(&tree).is_ok());
        }
    }
}

#[test]
fn ranking_sorted_population_is_a_no_op() {
    let g = arith();
    let init = Initializer::new(g.clone(), 4).unwrap();
    let rng = &mut SmallRng::seed_from_u64(5);
    let population = init.generate(0, 30, None, rng).unwrap();
    let task = value_task(3);
    let fitness = |t: &Tree| (task.oracle)(&*g, t);
    let ranked = rank_and_sort(population, fitness);
    assert!(ranked.windows(2).all(|w| w[0] <= w[1]));

    let again = rank_and_sort(
        ranked.iter().map(|c| c.tree().clone()).collect(),
        fitness,
    );
    let trees = |r: &[RankedCandidate]| r.iter().map(|c| c.tree().clone()).collect::<Vec<_>>();
    assert_eq!(trees(&again[..]), trees(&ranked[..]));

    let best = ranked[0].tree().clone();
    let owned: Vec<Tree> = again.into_iter().map(RankedCandidate::into_tree).collect();
    assert_eq!(owned[0], best);
    assert_eq!(owned.len(), 30);
}

#[test]
fn ranking_breaks_ties_by_size() {
    let g = arith();
    let init = Initializer::new(g.clone(), 4).unwrap();
    let rng = &mut SmallRng::seed_from_u64(11);
    let population = init.generate(0, 30, None, rng).unwrap();
    let ranked = rank_and_sort(population, |_| 1.0);
    assert!(ranked.windows(2).all(|w| w[0].size() <= w[1].size()));
}

#[test]
fn tournament_prefers_better_ranks() {
    let g = arith();
    let e = g.start();
    let ranked: Vec<RankedCandidate> = (0..5)
        .map(|i| RankedCandidate::new(Tree::new(e), i as f64))
        .collect();
    let selector = TournamentSelector::new(&ranked).unwrap();
    let rng = &mut SmallRng::seed_from_u64(1);
    let mut counts = [0usize; 5];
    for _ in 0..20_000 {
        let picked = selector.next(rng);
        let rank = ranked.iter().position(|c| std::ptr::eq(c, picked)).unwrap();
        counts[rank] += 1;
    }
    assert!(counts.windows(2).all(|w| w[0] > w[1]), "{:?}", counts);
    assert!((selector.weight(0) - 5.0 / 15.0).abs() < 1e-12);
    assert!(TournamentSelector::new(&[]).is_none());
}

#[test]
fn early_termination_stops_at_generation_zero() {
    let g = arith();
    let task = Task {
        oracle: Box::new(|_: &Grammar<i64>, _: &Tree| 0.0),
    };
    let params = EngineParams {
        max_depth: 3,
        population_size: 10,
        generations: 50,
        terminate_on_optimum: true,
    };
    let mut seen = Vec::new();
    {
        let mut engine = Engine::new(g, task, params)
            .unwrap()
            .on_generation(|generation, ranked| seen.push((generation, ranked.len())));
        let ranked = engine.run(&mut SmallRng::seed_from_u64(0)).unwrap();
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].fitness(), 0.0);
    }
    assert_eq!(seen, vec![(0, 10)]);
}

#[test]
fn engine_runs_every_generation() {
    let g = arith();
    let params = EngineParams {
        max_depth: 4,
        population_size: 12,
        generations: 3,
        terminate_on_optimum: false,
    };
    let mut seen = Vec::new();
    let ranked = {
        let mut engine = Engine::new(g.clone(), value_task(100), params)
            .unwrap()
            .on_generation(|generation, _| seen.push(generation));
        engine.run(&mut SmallRng::seed_from_u64(4)).unwrap()
    };
    assert_eq!(seen, vec![0, 1, 2, 3]);
    assert_eq!(ranked.len(), 12);
    for candidate in &ranked {
        assert!(candidate.tree().height() <= 4);
        assert!(g.check(candidate.tree()).is_ok());
    }
}

#[test]
fn engine_finds_small_target() {
    let g = arith();
    let params = EngineParams {
        max_depth: 4,
        population_size: 30,
        generations: 30,
        terminate_on_optimum: true,
    };
    let mut engine = Engine::new(g.clone(), value_task(3), params).unwrap();
    let ranked = engine.run(&mut SmallRng::seed_from_u64(2)).unwrap();
    assert_eq!(ranked[0].fitness(), 0.0);
    assert_eq!(g.eval(ranked[0].tree(), &[]), Ok(3));
}

#[test]
fn engine_configuration_errors() {
    let g = arith();
    let tiny = EngineParams {
        population_size: 1,
        ..EngineParams::default()
    };
    assert!(matches!(
        Engine::new(g.clone(), value_task(0), tiny).err(),
        Some(Error::Config(_))
    ));

    let engine = Engine::new(g.clone(), value_task(0), EngineParams::default()).unwrap();
    let mismatched = engine.with_operators(vec![Box::new(Reproduction)], vec![50, 50]);
    assert!(matches!(mismatched.err(), Some(Error::Config(_))));

    let engine = Engine::new(g.clone(), value_task(0), EngineParams::default()).unwrap();
    assert!(matches!(
        engine.with_operators(Vec::new(), Vec::new()).err(),
        Some(Error::Config(_))
    ));
}

#[test]
fn engine_rejects_percentages_that_never_select() {
    let g = arith();
    let engine = Engine::new(g.clone(), value_task(0), EngineParams::default()).unwrap();
    assert!(matches!(
        engine.with_probabilities(0, 0, 0).err(),
        Some(Error::Config(_))
    ));

    let engine = Engine::new(g.clone(), value_task(0), EngineParams::default()).unwrap();
    let idle = engine.with_operators(vec![Box::new(Reproduction)], vec![0]);
    assert!(matches!(idle.err(), Some(Error::Config(_))));

    let engine = Engine::new(g.clone(), value_task(0), EngineParams::default()).unwrap();
    assert!(engine.with_probabilities(0, 0, 1).is_ok());
}

/// Hands out copies of fixed trees, cycling through them.
struct Fixed(Vec<Tree>);

impl Genesis for Fixed {
    fn generate(
        &self,
        _current_depth: usize,
        population_size: usize,
        _root: Option<SymbolId>,
        _rng: &mut dyn RngCore,
    ) -> grammargp::Result<Vec<Tree>> {
        Ok(self.0.iter().cycle().take(population_size).cloned().collect())
    }
}

/// `E(F(leaf))` for the named `F` leaf.
fn single(g: &Grammar<i64>, leaf: &str) -> Tree {
    let (e, f, leaf) = (symbol(g, "E"), symbol(g, "F"), symbol(g, leaf));
    let pass = g.productions_of(e)[2];
    let to_leaf = g
        .productions_of(f)
        .iter()
        .copied()
        .find(|&p| g.production(p).rhs()[0] == leaf)
        .unwrap();
    let mut tree = Tree::new(e);
    let root = tree.root();
    let kids = g.expand(&mut tree, root, pass).unwrap();
    g.expand(&mut tree, kids[0], to_leaf).unwrap();
    tree
}

#[test]
fn engine_with_custom_initializer() {
    let g = arith();
    let params = EngineParams {
        max_depth: 3,
        population_size: 6,
        generations: 0,
        terminate_on_optimum: false,
    };
    let fixed = Fixed(vec![single(&g, "1"), single(&g, "2")]);
    let mut seen = Vec::new();
    {
        let mut engine = Engine::new(g.clone(), value_task(2), params.clone())
            .unwrap()
            .with_initializer(fixed)
            .on_generation(|generation, ranked| {
                let shown: Vec<String> = ranked.iter().map(|c| g.display(c.tree())).collect();
                seen.push((generation, shown));
            });
        let ranked = engine.run(&mut SmallRng::seed_from_u64(0)).unwrap();
        assert_eq!(ranked[0].fitness(), 0.0);
    }
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 0);
    assert_eq!(seen[0].1, vec!["2", "2", "2", "1", "1", "1"]);

    let starved = Engine::new(g.clone(), value_task(2), params)
        .unwrap()
        .with_initializer(Fixed(Vec::new()))
        .run(&mut SmallRng::seed_from_u64(0));
    assert!(matches!(starved, Err(Error::Config(_))));
}

#[test]
fn engine_with_custom_operators() {
    let g = arith();
    let params = EngineParams {
        max_depth: 3,
        population_size: 8,
        generations: 2,
        terminate_on_optimum: false,
    };
    let mutation = Mutation::new(g.clone(), 3).unwrap();
    let mut engine = Engine::new(g.clone(), value_task(0), params.clone())
        .unwrap()
        .with_operators(vec![Box::new(Reproduction), Box::new(mutation)], vec![50, 50])
        .unwrap();
    let ranked = engine.run(&mut SmallRng::seed_from_u64(6)).unwrap();
    assert_eq!(ranked.len(), 8);

    let mut engine = Engine::new(g.clone(), value_task(0), params.clone())
        .unwrap()
        .with_probabilities(0, 100, 0)
        .unwrap();
    assert_eq!(engine.params(), &params);
    assert_eq!(engine.run(&mut SmallRng::seed_from_u64(6)).unwrap().len(), 8);
}

#[test]
fn params_from_json() {
    let params: EngineParams = serde_json::from_str(
        r#"{
            "max_depth": 7,
            "population_size": 40,
            "generations": 12,
            "terminate_on_max_fitness": true
        }"#,
    )
    .unwrap();
    assert_eq!(
        params,
        EngineParams {
            max_depth: 7,
            population_size: 40,
            generations: 12,
            terminate_on_optimum: true,
        }
    );
    let defaults: EngineParams = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, EngineParams::default());
    assert_eq!(defaults.population_size, 100);
    let round = serde_json::to_string(&params).unwrap();
    assert!(round.contains("\"terminate_on_optimum\":true"));
}
