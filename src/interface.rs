//! The common structures and traits.

use crate::error::Result;
use std::fmt::Debug;
use std::hash::Hash;

/// An assessment of a game state from the perspective of the searching agent.
/// Higher values mean a more favorable state.
/// A draw is defined as a score of zero.
pub type Evaluation = i32;

// These definitions ensure that they negate to each other, but it leaves
// i32::MIN as a valid value less than WORST_EVAL. Don't use this value.

/// An absolutely wonderful outcome, e.g. a win.
pub const BEST_EVAL: Evaluation = i32::MAX;
/// An absolutely disastrous outcome, e.g. a loss.
pub const WORST_EVAL: Evaluation = -BEST_EVAL;

/// Width of the band next to each sentinel reserved for "win/loss in N
/// plies". Heuristic evaluations must stay strictly inside it.
pub const SENTINEL_BAND: Evaluation = 100;

/// The result of a finished game for one agent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// Canonical evaluations for end states.
    pub fn evaluate(&self) -> Evaluation {
        match *self {
            Outcome::Win => BEST_EVAL,
            Outcome::Loss => WORST_EVAL,
            Outcome::Draw => 0,
        }
    }
}

/// How a node combines the values of its children.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// The searching agent acts: take the best child.
    Maximize,
    /// An adversary acts: take the worst child.
    Minimize,
    /// An unmodeled or stochastic actor: average over all children.
    Expect,
}

impl Role {
    /// Whether sibling cutoffs are sound at a node with this role.
    pub fn prunes(&self) -> bool {
        !matches!(self, Role::Expect)
    }
}

/// A game position as seen by the search.
///
/// Actions are applied and reverted in place, so a whole search walks the
/// tree with a single mutable view and no per-node allocation of states.
pub trait GameView: Clone {
    /// A legal move, e.g. a column index, a board cell or a wager tier.
    type Action: Copy + Eq + Hash + Debug;
    /// Identifies a participant.
    type Agent: Copy + Eq + Debug;

    /// Push the legal actions at this view, in canonical order, onto
    /// `actions`. Pushes nothing on a terminal or stalled view.
    fn legal_actions(&self, actions: &mut Vec<Self::Action>);

    /// Change the view so that `action` is applied.
    ///
    /// Applying an action outside the legal set fails with
    /// [`SearchError::InvalidAction`](crate::SearchError::InvalidAction).
    fn apply(&mut self, action: Self::Action) -> Result<()>;

    /// Revert the view so that `action`, the last applied action, is undone.
    fn undo(&mut self, action: Self::Action);

    /// Whether the game has ended.
    fn is_terminal(&self) -> bool;

    /// Result for `agent`. Only meaningful when [`is_terminal`](Self::is_terminal) holds.
    fn outcome(&self, agent: Self::Agent) -> Outcome;

    /// The agent who acts next.
    fn to_move(&self) -> Self::Agent;

    /// Structural hash of the position. Two views may share a key only if
    /// the search should treat them as the same node.
    fn position_key(&self) -> u64;

    /// Human-readable description of an action, for logs.
    fn notation(&self, action: Self::Action) -> Option<String> {
        let _ = action;
        None
    }
}

/// Scores non-terminal positions.
pub trait Evaluator {
    /// The type of view that can be evaluated.
    type V: GameView;
    /// Evaluate the non-terminal view from the perspective of `agent`.
    ///
    /// Must be pure: calling it twice on an unmodified view returns the
    /// same value.
    fn evaluate(&self, view: &Self::V, agent: <Self::V as GameView>::Agent) -> Evaluation;
}

/// The action type searched by an evaluator's game.
pub type ActionOf<E> = <<E as Evaluator>::V as GameView>::Action;
/// The agent type of an evaluator's game.
pub type AgentOf<E> = <<E as Evaluator>::V as GameView>::Agent;

/// A cheap move-ordering heuristic. Higher priorities are searched first.
pub trait MovePriority<V: GameView> {
    fn priority(&self, view: &V, action: V::Action) -> i32;
}

impl<V: GameView, F: Fn(&V, V::Action) -> i32> MovePriority<V> for F {
    fn priority(&self, view: &V, action: V::Action) -> i32 {
        self(view, action)
    }
}

/// Leaves actions in enumeration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<V: GameView> MovePriority<V> for NaturalOrder {
    fn priority(&self, _: &V, _: V::Action) -> i32 {
        0
    }
}

/// Actions with an index nearer to `center` come first.
#[derive(Debug, Clone, Copy)]
pub struct CenterFirst {
    pub center: i32,
}

impl<V: GameView> MovePriority<V> for CenterFirst
where
    V::Action: Into<i32>,
{
    fn priority(&self, _: &V, action: V::Action) -> i32 {
        -(action.into() - self.center).abs()
    }
}

/// Defines a method of choosing an action for the agent to move.
pub trait Strategy<V: GameView> {
    fn choose_action(&mut self, view: &V) -> Result<V::Action>;
}
