//! (representation) Context-free grammars whose symbols are compared by identity.
//!
//! Symbols are created through a [`GrammarBuilder`], which hands out [`SymbolId`] handles. Two
//! symbols that happen to share a name are still different symbols unless they are the same
//! handle, so a grammar may reuse names freely.
//!
//! # Examples
//!
//! ```
//! use grammargp::grammar::Grammar;
//! use grammargp::tree::Tree;
//!
//! let mut b = Grammar::builder();
//! let e = b.non_terminal("E");
//! let f = b.non_terminal("F");
//! let plus = b.operation("+", |args: &[i64], _| args[0] + args[1]);
//! let one = b.constant("1", 1);
//! let two = b.constant("2", 2);
//! b.non_terminals(&[e, f]).terminals(&[plus, one, two]).start(e);
//! let sum = b.production(e, &[e, plus, e]).unwrap();
//! let pass = b.production(e, &[f]).unwrap();
//! let to_one = b.production(f, &[one]).unwrap();
//! let to_two = b.production(f, &[two]).unwrap();
//! let g = b.build().unwrap();
//!
//! // the operation is moved to the front of the right-hand side
//! assert_eq!(g.production(sum).rhs(), &[plus, e, e][..]);
//!
//! let mut tree = Tree::new(e);
//! let root = tree.root();
//! let kids = g.expand(&mut tree, root, sum).unwrap();
//! for (&kid, leaf) in kids[1..].iter().zip([to_one, to_two]) {
//!     let f_node = g.expand(&mut tree, kid, pass).unwrap()[0];
//!     g.expand(&mut tree, f_node, leaf).unwrap();
//! }
//! assert_eq!(g.display(&tree), "+(1,2)");
//! assert_eq!(g.eval(&tree, &[]), Ok(3));
//! ```

mod oracle;
pub use self::oracle::DepthOracle;

use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::tree::{NodeId, Tree};
use crate::{Error, Result};

/// Handle to a symbol in a grammar's symbol table. Equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(usize);

/// Handle to a production of a [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionId(usize);
impl ProductionId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An operation receives its evaluated operands, in order, and the evaluation bindings.
pub type Operation<V> = Arc<dyn Fn(&[V], &[V]) -> V + Send + Sync>;

/// A grammar symbol. Everything except `NonTerminal` is a terminal and can only be a leaf.
#[derive(Clone)]
pub enum Symbol<V> {
    NonTerminal { name: String },
    Constant { name: String, value: V },
    /// `index` selects the binding this variable reads during evaluation.
    Variable { name: String, index: usize },
    Operation { name: String, op: Operation<V> },
}
impl<V> Symbol<V> {
    pub fn name(&self) -> &str {
        match self {
            Symbol::NonTerminal { name }
            | Symbol::Constant { name, .. }
            | Symbol::Variable { name, .. }
            | Symbol::Operation { name, .. } => name,
        }
    }
    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal { .. })
    }
    pub fn is_operation(&self) -> bool {
        matches!(self, Symbol::Operation { .. })
    }
}
impl<V: fmt::Debug> fmt::Debug for Symbol<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::NonTerminal { name } => f.debug_tuple("NonTerminal").field(name).finish(),
            Symbol::Constant { name, value } => {
                f.debug_tuple("Constant").field(name).field(value).finish()
            }
            Symbol::Variable { name, index } => {
                f.debug_tuple("Variable").field(name).field(index).finish()
            }
            Symbol::Operation { name, .. } => f.debug_tuple("Operation").field(name).finish(),
        }
    }
}

/// A rewrite rule `lhs → rhs`. Any operation in `rhs` sits at position 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Production {
    lhs: SymbolId,
    rhs: Vec<SymbolId>,
}
impl Production {
    pub fn lhs(&self) -> SymbolId {
        self.lhs
    }
    pub fn rhs(&self) -> &[SymbolId] {
        &self.rhs
    }
}

/// (representation) A validated context-free grammar.
///
/// A `Grammar` is immutable once built. Every component of a run shares one grammar, usually
/// behind an [`Arc`].
///
/// Methods that take a [`SymbolId`] or [`ProductionId`] panic if the handle was not issued by
/// the builder of this grammar.
pub struct Grammar<V> {
    symbols: Vec<Symbol<V>>,
    non_terminals: Vec<SymbolId>,
    terminals: Vec<SymbolId>,
    productions: Vec<Production>,
    start: SymbolId,
    by_lhs: HashMap<SymbolId, Vec<ProductionId>>,
}
impl<V> Grammar<V> {
    pub fn builder() -> GrammarBuilder<V> {
        GrammarBuilder::default()
    }
    pub fn start(&self) -> SymbolId {
        self.start
    }
    pub fn symbol(&self, id: SymbolId) -> &Symbol<V> {
        &self.symbols[id.0]
    }
    pub fn name(&self, id: SymbolId) -> &str {
        self.symbol(id).name()
    }
    pub fn is_non_terminal(&self, id: SymbolId) -> bool {
        self.symbol(id).is_non_terminal()
    }
    pub fn non_terminals(&self) -> &[SymbolId] {
        &self.non_terminals
    }
    pub fn terminals(&self) -> &[SymbolId] {
        &self.terminals
    }
    pub fn productions(&self) -> impl Iterator<Item = (ProductionId, &Production)> {
        self.productions
            .iter()
            .enumerate()
            .map(|(i, p)| (ProductionId(i), p))
    }
    pub fn n_productions(&self) -> usize {
        self.productions.len()
    }
    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.0]
    }
    /// The productions whose left-hand side is `non_terminal`. Empty for terminals.
    pub fn productions_of(&self, non_terminal: SymbolId) -> &[ProductionId] {
        self.by_lhs
            .get(&non_terminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
    /// Whether `lhs → rhs` is a production of this grammar, comparing symbols by identity.
    pub fn has_production(&self, lhs: SymbolId, rhs: &[SymbolId]) -> bool {
        self.productions_of(lhs)
            .iter()
            .any(|&p| self.productions[p.0].rhs == rhs)
    }

    /// Attach the right-hand side of `production` as the children of a childless `node` whose
    /// symbol is the production's left-hand side. Returns the new children in order.
    pub fn expand(
        &self,
        tree: &mut Tree,
        node: NodeId,
        production: ProductionId,
    ) -> Result<Vec<NodeId>> {
        let p = self.production(production);
        if tree.symbol(node) != p.lhs {
            return Err(Error::Structural(format!(
                "cannot expand {} with a production of {}",
                self.name(tree.symbol(node)),
                self.name(p.lhs)
            )));
        }
        if !tree.children(node).is_empty() {
            return Err(Error::Structural(format!(
                "{} is already expanded",
                self.name(p.lhs)
            )));
        }
        Ok(p.rhs.iter().map(|&s| tree.push_child(node, s)).collect())
    }

    /// Verify that every node of `tree` is a legal derivation step of this grammar: terminals
    /// are leaves and every non-terminal's children spell one of its productions.
    pub fn check(&self, tree: &Tree) -> Result<()> {
        for node in tree.nodes() {
            let symbol = tree.symbol(node);
            let children = tree.children(node);
            if self.is_non_terminal(symbol) {
                let rhs: Vec<SymbolId> = children.iter().map(|&c| tree.symbol(c)).collect();
                if !self.has_production(symbol, &rhs) {
                    return Err(Error::Structural(format!(
                        "{} ::= {} is not a production",
                        self.name(symbol),
                        rhs.iter().map(|&s| self.name(s)).join(" ")
                    )));
                }
            } else if !children.is_empty() {
                return Err(Error::Structural(format!(
                    "terminal {} has children",
                    self.name(symbol)
                )));
            }
        }
        Ok(())
    }

    /// Function notation of a tree, e.g. `+(1,*(v0,2))`. Pass-through derivations are
    /// collapsed onto their only child.
    pub fn display(&self, tree: &Tree) -> String {
        self.display_node(tree, tree.root())
    }
    pub fn display_node(&self, tree: &Tree, node: NodeId) -> String {
        match tree.children(node) {
            [] => self.name(tree.symbol(node)).to_string(),
            [only] => self.display_node(tree, *only),
            [first, rest @ ..] if self.symbol(tree.symbol(*first)).is_operation() => format!(
                "{}({})",
                self.name(tree.symbol(*first)),
                rest.iter().map(|&c| self.display_node(tree, c)).join(",")
            ),
            children => children
                .iter()
                .map(|&c| self.display_node(tree, c))
                .join(" "),
        }
    }
    /// The names of the terminal leaves, concatenated left to right.
    pub fn leaves(&self, tree: &Tree) -> String {
        tree.nodes()
            .filter(|&n| tree.children(n).is_empty())
            .map(|n| self.name(tree.symbol(n)))
            .collect()
    }
    /// Full derivation notation including non-terminals, e.g. `E(+ E(F(1)) E(F(2)))`.
    pub fn derivation(&self, tree: &Tree) -> String {
        self.derivation_node(tree, tree.root())
    }
    fn derivation_node(&self, tree: &Tree, node: NodeId) -> String {
        let name = self.name(tree.symbol(node));
        match tree.children(node) {
            [] => name.to_string(),
            children => format!(
                "{}({})",
                name,
                children
                    .iter()
                    .map(|&c| self.derivation_node(tree, c))
                    .join(" ")
            ),
        }
    }

    fn fmt_production(&self, p: &Production) -> String {
        format!(
            "{} ::= {}",
            self.name(p.lhs),
            p.rhs.iter().map(|&s| self.name(s)).join(" ")
        )
    }
}
impl<V: Clone> Grammar<V> {
    /// Evaluate a tree under `bindings`, which are indexed by variable declaration order.
    pub fn eval(&self, tree: &Tree, bindings: &[V]) -> Result<V> {
        self.eval_node(tree, tree.root(), bindings)
    }
    pub fn eval_node(&self, tree: &Tree, node: NodeId, bindings: &[V]) -> Result<V> {
        match self.symbol(tree.symbol(node)) {
            Symbol::Constant { value, .. } => Ok(value.clone()),
            Symbol::Variable { name, index } => bindings.get(*index).cloned().ok_or_else(|| {
                Error::Evaluation(format!("no binding for {} at index {}", name, index))
            }),
            Symbol::Operation { name, .. } => Err(Error::Evaluation(format!(
                "operation {} cannot be evaluated on its own",
                name
            ))),
            Symbol::NonTerminal { name } => match tree.children(node) {
                [] => Err(Error::Evaluation(format!("{} has no children", name))),
                [only] => {
                    if self.symbol(tree.symbol(*only)).is_operation() {
                        Err(Error::Evaluation(format!(
                            "{} derives a bare operation",
                            name
                        )))
                    } else {
                        self.eval_node(tree, *only, bindings)
                    }
                }
                [first, operands @ ..] => match self.symbol(tree.symbol(*first)) {
                    Symbol::Operation { op, .. } => {
                        let args = operands
                            .iter()
                            .map(|&c| self.eval_node(tree, c, bindings))
                            .collect::<Result<Vec<V>>>()?;
                        Ok(op(&args, bindings))
                    }
                    other => Err(Error::Evaluation(format!(
                        "{} must start with an operation, found {}",
                        name,
                        other.name()
                    ))),
                },
            },
        }
    }
}
impl<V> fmt::Display for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = |ids: &[SymbolId]| ids.iter().map(|&s| self.name(s)).join(", ");
        writeln!(f, "Terminals: [{}]", names(&self.terminals))?;
        writeln!(f, "NonTerminals: [{}]", names(&self.non_terminals))?;
        writeln!(
            f,
            "Productions: [{}]",
            self.productions
                .iter()
                .map(|p| self.fmt_production(p))
                .join(", ")
        )?;
        write!(f, "Start: {}", self.name(self.start))
    }
}
impl<V: fmt::Debug> fmt::Debug for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("symbols", &self.symbols)
            .field("non_terminals", &self.non_terminals)
            .field("terminals", &self.terminals)
            .field("productions", &self.productions)
            .field("start", &self.start)
            .finish()
    }
}

/// Assembles a [`Grammar`]. Symbols are created here, declared as terminals or non-terminals,
/// and wired together with productions; [`build`] validates the whole thing once.
///
/// Variables receive binding indices in the order they are created, starting from 0.
///
/// [`build`]: #method.build
pub struct GrammarBuilder<V> {
    symbols: Vec<Symbol<V>>,
    non_terminals: Vec<SymbolId>,
    terminals: Vec<SymbolId>,
    productions: Vec<Production>,
    start: Option<SymbolId>,
    n_variables: usize,
}
impl<V> Default for GrammarBuilder<V> {
    fn default() -> Self {
        GrammarBuilder {
            symbols: Vec::new(),
            non_terminals: Vec::new(),
            terminals: Vec::new(),
            productions: Vec::new(),
            start: None,
            n_variables: 0,
        }
    }
}
impl<V> GrammarBuilder<V> {
    fn add(&mut self, symbol: Symbol<V>) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() - 1)
    }
    pub fn non_terminal(&mut self, name: impl Into<String>) -> SymbolId {
        self.add(Symbol::NonTerminal { name: name.into() })
    }
    pub fn constant(&mut self, name: impl Into<String>, value: V) -> SymbolId {
        self.add(Symbol::Constant {
            name: name.into(),
            value,
        })
    }
    pub fn variable(&mut self, name: impl Into<String>) -> SymbolId {
        let index = self.n_variables;
        self.n_variables += 1;
        self.add(Symbol::Variable {
            name: name.into(),
            index,
        })
    }
    pub fn operation<F>(&mut self, name: impl Into<String>, op: F) -> SymbolId
    where
        F: Fn(&[V], &[V]) -> V + Send + Sync + 'static,
    {
        self.add(Symbol::Operation {
            name: name.into(),
            op: Arc::new(op),
        })
    }

    pub fn non_terminals(&mut self, symbols: &[SymbolId]) -> &mut Self {
        self.non_terminals.extend_from_slice(symbols);
        self
    }
    pub fn terminals(&mut self, symbols: &[SymbolId]) -> &mut Self {
        self.terminals.extend_from_slice(symbols);
        self
    }
    pub fn start(&mut self, symbol: SymbolId) -> &mut Self {
        self.start = Some(symbol);
        self
    }

    /// Declare `lhs → rhs`. At most one operation may appear in `rhs`; it is moved to the front.
    pub fn production(&mut self, lhs: SymbolId, rhs: &[SymbolId]) -> Result<ProductionId> {
        let symbol = |id: SymbolId| {
            self.symbols.get(id.0).ok_or_else(|| {
                Error::Config(format!("symbol #{} does not belong to this grammar", id.0))
            })
        };
        if !symbol(lhs)?.is_non_terminal() {
            return Err(Error::Config(format!(
                "production lhs {} is not a non-terminal",
                symbol(lhs)?.name()
            )));
        }
        if rhs.is_empty() {
            return Err(Error::Config(format!(
                "production of {} has no rhs",
                symbol(lhs)?.name()
            )));
        }
        let mut ops = Vec::new();
        for (i, &s) in rhs.iter().enumerate() {
            if symbol(s)?.is_operation() {
                ops.push(i);
            }
        }
        if ops.len() > 1 {
            return Err(Error::Config(format!(
                "production of {} has {} operations",
                symbol(lhs)?.name(),
                ops.len()
            )));
        }
        if rhs.len() == 1 && ops.len() == 1 {
            return Err(Error::Config(format!(
                "production of {} has an operation without operands",
                symbol(lhs)?.name()
            )));
        }
        let mut rhs = rhs.to_vec();
        if let Some(&i) = ops.first() {
            let op = rhs.remove(i);
            rhs.insert(0, op);
        }
        self.productions.push(Production { lhs, rhs });
        Ok(ProductionId(self.productions.len() - 1))
    }
    /// One production `lhs → c` per constant or variable `c`.
    pub fn leaf_productions(
        &mut self,
        lhs: SymbolId,
        leaves: &[SymbolId],
    ) -> Result<Vec<ProductionId>> {
        leaves
            .iter()
            .map(|&leaf| self.production(lhs, &[leaf]))
            .collect()
    }

    /// Validate and freeze the grammar.
    pub fn build(self) -> Result<Grammar<V>> {
        let start = self
            .start
            .ok_or_else(|| Error::Config(String::from("no start symbol")))?;
        if self.non_terminals.is_empty() {
            return Err(Error::Config(String::from("no non-terminals declared")));
        }
        if self.terminals.is_empty() {
            return Err(Error::Config(String::from("no terminals declared")));
        }
        if self.productions.is_empty() {
            return Err(Error::Config(String::from("no productions declared")));
        }
        let non_terminals: Vec<SymbolId> = self.non_terminals.into_iter().unique().collect();
        let terminals: Vec<SymbolId> = self.terminals.into_iter().unique().collect();
        let symbols = self.symbols;
        let name = |id: SymbolId| {
            symbols
                .get(id.0)
                .map(Symbol::name)
                .ok_or_else(|| {
                    Error::Config(format!("symbol #{} does not belong to this grammar", id.0))
                })
        };
        for &nt in &non_terminals {
            if !symbols.get(nt.0).map_or(false, Symbol::is_non_terminal) {
                return Err(Error::Config(format!(
                    "{} is declared as a non-terminal but is a terminal",
                    name(nt)?
                )));
            }
        }
        for &t in &terminals {
            if symbols.get(t.0).map_or(true, Symbol::is_non_terminal) {
                return Err(Error::Config(format!(
                    "{} is declared as a terminal but is a non-terminal",
                    name(t)?
                )));
            }
        }

        let declared: HashSet<SymbolId> =
            non_terminals.iter().chain(&terminals).copied().collect();
        if let Some(undeclared) = self
            .productions
            .iter()
            .flat_map(|p| std::iter::once(&p.lhs).chain(&p.rhs))
            .find(|s| !declared.contains(s))
        {
            return Err(Error::Config(format!(
                "productions use undeclared symbol {}",
                name(*undeclared)?
            )));
        }

        let mut by_lhs: HashMap<SymbolId, Vec<ProductionId>> = HashMap::new();
        for (i, p) in self.productions.iter().enumerate() {
            by_lhs.entry(p.lhs).or_default().push(ProductionId(i));
        }
        if let Some(&barren) = non_terminals.iter().find(|nt| !by_lhs.contains_key(nt)) {
            return Err(Error::Config(format!(
                "non-terminal {} has no productions",
                name(barren)?
            )));
        }
        if !non_terminals.contains(&start) {
            return Err(Error::Config(format!(
                "start symbol {} is not a declared non-terminal",
                name(start)?
            )));
        }

        Ok(Grammar {
            symbols,
            non_terminals,
            terminals,
            productions: self.productions,
            start,
            by_lhs,
        })
    }
}
