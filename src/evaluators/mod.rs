//! Heuristic evaluators shared by families of games.

pub mod hand;
pub mod lines;

pub use hand::{classify, Card, HandStrengthEvaluator, HandTier, PokerView, Suit};
pub use lines::{summarize, Grid, LineEvaluator, LineSummary};
