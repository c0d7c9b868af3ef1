use thiserror::Error;

/// Everything that can go wrong while building a grammar, growing trees or running an engine.
///
/// An operator that finds no valid move is *not* an error: it returns an empty `Vec`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A malformed grammar or engine setup, reported once at construction.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The depth oracle could not resolve every production of the grammar.
    #[error("grammar is not well-founded: {0}")]
    Grammar(String),
    /// A tree violated an internal invariant, e.g. a node missing from its parent's children.
    #[error("structural invariant violated: {0}")]
    Structural(String),
    /// A tree had a shape that cannot be evaluated.
    #[error("cannot evaluate tree: {0}")]
    Evaluation(String),
    /// The root symbol needs a deeper tree than the remaining depth allows.
    #[error("root symbol needs depth {required} but only {available} is available")]
    DepthUnsatisfiable { required: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
