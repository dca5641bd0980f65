use thiserror::Error;

/// Errors surfaced by a search or by the views it walks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A decision was requested on a terminal or stalled view.
    #[error("no legal actions at this position")]
    NoLegalActions,

    /// An action outside the current legal set was applied.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// A view reported data the search cannot reconcile.
    #[error("inconsistent view: {0}")]
    InconsistentView(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A fixed-depth evaluation ran out of time or nodes. Decisions never
    /// report this; they fall back to a shallower answer instead.
    #[error("search budget exhausted")]
    BudgetExhausted,
}

pub type Result<T> = std::result::Result<T, SearchError>;
