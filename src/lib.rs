//! A generic game-tree search engine.
//!
//! Games implement [`GameView`] and score positions with an [`Evaluator`].
//! The engine offers alpha-beta search with iterative deepening and a
//! transposition table, an expectimax variant for chance-driven opponents, a
//! parallel root search, and a Monte Carlo risk estimator for single-agent
//! puzzles. A [`SearchAgent`] wraps one configured strategy and its budget.

pub mod agent;
pub mod config;
pub mod error;
pub mod evaluators;
pub mod games;
pub mod interface;
pub mod strategies;
pub mod util;

pub use agent::{Decision, SearchAgent};
pub use config::{AgentConfig, StrategyKind};
pub use error::{Result, SearchError};
pub use interface::*;
pub use strategies::expectimax::ExpectimaxSearch;
pub use strategies::{
    Choice, IterativeSearch, MonteCarlo, Opponent, ParallelOptions, ParallelSearch, Replacement,
    RiskEstimate, RiskReport, Sampled, SearchOptions, SearchStats,
};
pub use util::play_match;
