//! An implementation of iterative deepening minimax with alpha-beta pruning.
//!
//! Search and evaluate at depth 1, then start over at depth 2, then depth 3,
//! etc. Can keep going until a maximum depth, a maximum time or a node
//! budget. Uses a transposition table to reuse information from previous
//! iterations, and only ever answers with the result of the last iteration
//! that ran to completion.
//!
//! The agents other than the one searching are modeled either as an
//! adversary (minimizing nodes) or as a stochastic actor (expectation
//! nodes). Both share one recursion; only the way child values are combined
//! differs.

use super::table::*;
use super::util::*;
use super::{Choice, SearchStats};
use crate::error::{Result, SearchError};
use crate::interface::*;

use std::cmp::{max, min, Reverse};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How the search models the agents it is not choosing for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Opponent {
    /// Always plays the reply that is worst for the searching agent.
    Adversarial,
    /// Picks uniformly at random among its legal actions.
    Stochastic,
}

impl Opponent {
    pub fn role(&self) -> Role {
        match *self {
            Opponent::Adversarial => Role::Minimize,
            Opponent::Stochastic => Role::Expect,
        }
    }
}

/// Options to use for the iterative search engine.
#[derive(Clone, Copy, Debug)]
pub struct SearchOptions {
    pub(super) table_byte_size: usize,
    pub(super) strategy: Replacement,
    pub(super) use_table: bool,
    pub(super) pruning: bool,
    pub(super) internal_ordering: bool,
    pub(super) iterative: bool,
    pub(super) step_increment: u8,
}

impl SearchOptions {
    pub fn new() -> Self {
        SearchOptions {
            table_byte_size: 1_000_000,
            strategy: Replacement::TwoTier,
            use_table: true,
            pruning: true,
            internal_ordering: true,
            iterative: true,
            step_increment: 1,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchOptions {
    /// Approximately how large the transposition table should be in memory.
    pub fn with_table_byte_size(mut self, size: usize) -> Self {
        self.table_byte_size = size;
        self
    }

    /// When to overwrite entries in the transposition table.
    pub fn with_replacement_strategy(mut self, strategy: Replacement) -> Self {
        self.strategy = strategy;
        self
    }

    /// Whether to consult and fill the transposition table at all.
    pub fn with_table(mut self, enabled: bool) -> Self {
        self.use_table = enabled;
        self
    }

    /// Whether to cut off siblings that cannot change the result. Disabling
    /// searches the full tree; only useful for checking results.
    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.pruning = enabled;
        self
    }

    /// Whether to apply the move-ordering heuristic below the root too.
    pub fn with_internal_ordering(mut self, enabled: bool) -> Self {
        self.internal_ordering = enabled;
        self
    }

    /// Whether to search shallower depths first. Without it, one pass at the
    /// maximum depth is made.
    pub fn with_iterative_deepening(mut self, enabled: bool) -> Self {
        self.iterative = enabled;
        self
    }

    /// Increment the depth by two between iterations.
    pub fn with_double_step_increment(mut self) -> Self {
        self.step_increment = 2;
        self
    }
}

// The recursion shared by the serial and parallel engines. Each thread owns
// one; only the table may be shared.
pub(super) struct Minimaxer<E: Evaluator, P, T> {
    table: T,
    pub(super) eval: E,
    priority: P,
    opponent: Role,
    opts: SearchOptions,
    pub(super) timeout: Arc<AtomicBool>,
    pub(super) node_limit: u64,
    pub(super) nodes: u64,
    pub(super) table_hits: u64,
}

impl<E, P, T> Minimaxer<E, P, T>
where
    E: Evaluator,
    P: MovePriority<E::V>,
    T: Table<ActionOf<E>>,
{
    pub(super) fn new(table: T, eval: E, priority: P, opponent: Role, opts: SearchOptions) -> Self {
        Minimaxer {
            table,
            eval,
            priority,
            opponent,
            opts,
            timeout: Arc::new(AtomicBool::new(false)),
            node_limit: u64::MAX,
            nodes: 0,
            table_hits: 0,
        }
    }

    pub(super) fn table(&self) -> &T {
        &self.table
    }

    pub(super) fn role_at(&self, v: &E::V, agent: AgentOf<E>) -> Role {
        if v.to_move() == agent {
            Role::Maximize
        } else {
            self.opponent
        }
    }

    // Legal root actions tagged with their canonical index, sorted by the
    // move-ordering heuristic. The sort is stable.
    pub(super) fn heuristic_order(&self, v: &E::V) -> Vec<(usize, ActionOf<E>)> {
        let mut moves = Vec::new();
        v.legal_actions(&mut moves);
        let mut indexed = moves.into_iter().enumerate().collect::<Vec<_>>();
        indexed.sort_by_cached_key(|&(_, a)| Reverse(self.priority.priority(v, a)));
        indexed
    }

    // Heuristic order, with the table's best move from an earlier pass first.
    pub(super) fn root_order(&self, v: &E::V) -> Vec<(usize, ActionOf<E>)> {
        let mut indexed = self.heuristic_order(v);
        if self.opts.use_table {
            let hint = self.table.lookup(v.position_key(), Role::Maximize).and_then(|e| e.best_move);
            if let Some(i) = hint.and_then(|m| indexed.iter().position(|&(_, a)| a == m)) {
                indexed[0..i + 1].rotate_right(1);
            }
        }
        indexed
    }

    fn budget_spent(&self) -> bool {
        self.timeout.load(Ordering::Relaxed) || self.nodes >= self.node_limit
    }

    // Recursively compute the value of the view for `agent`, `ply` moves
    // below the root. Returns Abort::Budget if it hits the timeout or the
    // node budget.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn value(
        &mut self, v: &mut E::V, agent: AgentOf<E>, depth: u8, ply: u8, mut alpha: Evaluation,
        mut beta: Evaluation,
    ) -> std::result::Result<Evaluation, Abort> {
        if self.budget_spent() {
            return Err(Abort::Budget);
        }
        self.nodes += 1;

        // Terminal values never depend on whose turn it is.
        if v.is_terminal() {
            return Ok(at_ply(v.outcome(agent).evaluate(), ply));
        }
        if depth == 0 {
            return Ok(at_ply(self.eval.evaluate(v, agent), ply));
        }

        let role = self.role_at(v, agent);
        if !self.opts.pruning || !role.prunes() {
            alpha = WORST_EVAL;
            beta = BEST_EVAL;
        }

        let hash = v.position_key();
        let mut good_move = None;
        if self.opts.use_table {
            if let Some(value) =
                self.table.check(hash, role, depth, ply, &mut good_move, &mut alpha, &mut beta)
            {
                self.table_hits += 1;
                return Ok(value);
            }
        }
        let (alpha_orig, beta_orig) = (alpha, beta);

        let mut moves = Vec::new();
        v.legal_actions(&mut moves);
        if moves.is_empty() {
            // Stalled without being over.
            return Ok(at_ply(self.eval.evaluate(v, agent), ply));
        }
        if self.opts.internal_ordering {
            order_actions(v, &mut moves, &self.priority);
        }
        if let Some(m) = good_move {
            // Rearrange so predicted good move is first.
            move_to_front(m, &mut moves);
        }

        let next = ply.saturating_add(1);
        let mut best_move = moves[0];
        let best = match role {
            Role::Expect => {
                // Every child counts, so every child gets a full window.
                let mut sum = 0i64;
                for &m in moves.iter() {
                    let value = with_applied(v, m, |v| {
                        self.value(v, agent, depth - 1, next, WORST_EVAL, BEST_EVAL)
                    })?;
                    sum += value as i64;
                }
                mean(sum, moves.len())
            }
            Role::Maximize => {
                let mut best = WORST_EVAL;
                for &m in moves.iter() {
                    let value =
                        with_applied(v, m, |v| self.value(v, agent, depth - 1, next, alpha, beta))?;
                    if value > best {
                        best = value;
                        best_move = m;
                    }
                    alpha = max(alpha, value);
                    if self.opts.pruning && alpha >= beta {
                        break;
                    }
                }
                best
            }
            Role::Minimize => {
                let mut best = BEST_EVAL;
                for &m in moves.iter() {
                    let value =
                        with_applied(v, m, |v| self.value(v, agent, depth - 1, next, alpha, beta))?;
                    if value < best {
                        best = value;
                        best_move = m;
                    }
                    beta = min(beta, value);
                    if self.opts.pruning && alpha >= beta {
                        break;
                    }
                }
                best
            }
        };

        if self.opts.use_table {
            self.table.update(hash, role, alpha_orig, beta_orig, depth, ply, best, best_move);
        }
        Ok(best)
    }

    // Value every root action and return the best. Siblings after the first
    // are searched with alpha just below the best value so far, so an equal
    // value comes back exact and ties go to the earliest canonical action.
    pub(super) fn search_root(
        &mut self, v: &mut E::V, agent: AgentOf<E>, depth: u8,
    ) -> std::result::Result<(Evaluation, ActionOf<E>), Abort> {
        let ordered = self.root_order(v);
        let mut best: Option<ValueMove<ActionOf<E>>> = None;
        for &(index, m) in ordered.iter() {
            let alpha = match best {
                Some(ref b) if self.opts.pruning => b.value.saturating_sub(1),
                _ => WORST_EVAL,
            };
            let value =
                with_applied(v, m, |v| self.value(v, agent, depth - 1, 1, alpha, BEST_EVAL))?;
            match best.as_mut() {
                Some(b) => b.max(value, m, index),
                None => best = Some(ValueMove::new(value, m, index)),
            }
        }
        let (value, m) = best.ok_or(Abort::Failed(SearchError::NoLegalActions))?.into_inner();
        if self.opts.use_table {
            self.table.store(Entry {
                hash: v.position_key(),
                role: Role::Maximize,
                value,
                depth,
                flag: EntryFlag::Exact,
                generation: self.table.generation(),
                best_move: Some(m),
            });
        }
        Ok((value, m))
    }
}

// The depths an iterative deepening run visits, ending at `max_depth`.
pub(super) fn depth_schedule(opts: &SearchOptions, max_depth: u8) -> impl Iterator<Item = u8> {
    let step = opts.step_increment.max(1);
    let first = if !opts.iterative {
        max_depth
    } else {
        match max_depth % step {
            0 => step,
            d => d,
        }
    };
    (first..=max_depth).step_by(step as usize).filter(|&d| d >= 1)
}

/// Alpha-beta or expectimax search, deepened one iteration at a time.
pub struct IterativeSearch<E: Evaluator, P = NaturalOrder> {
    max_depth: u8,
    max_time: Duration,
    max_nodes: u64,
    minimaxer: Minimaxer<E, P, TranspositionTable<ActionOf<E>>>,
    prev_value: Evaluation,
    opts: SearchOptions,

    // Runtime stats for the last decision.
    stats: SearchStats,
    pv: Vec<ActionOf<E>>,
}

impl<E: Evaluator> IterativeSearch<E> {
    /// Alpha-beta search against an adversarial opponent, with actions
    /// searched in enumeration order.
    pub fn new(eval: E, opts: SearchOptions) -> Self {
        Self::with_opponent(eval, NaturalOrder, Opponent::Adversarial, opts)
    }
}

impl<E: Evaluator, P: MovePriority<E::V>> IterativeSearch<E, P> {
    pub fn with_opponent(eval: E, priority: P, opponent: Opponent, opts: SearchOptions) -> Self {
        let table = TranspositionTable::new(opts.table_byte_size, opts.strategy);
        IterativeSearch {
            max_depth: 4,
            max_time: Duration::ZERO,
            max_nodes: 0,
            minimaxer: Minimaxer::new(table, eval, priority, opponent.role(), opts),
            prev_value: 0,
            opts,
            stats: SearchStats::default(),
            pv: Vec::new(),
        }
    }

    /// Set the maximum depth to search. Disables the timeout.
    /// This can be changed between decisions while reusing the transposition table.
    pub fn set_max_depth(&mut self, depth: u8) {
        self.max_depth = depth;
        self.max_time = Duration::ZERO;
    }

    /// Set the maximum time to compute the best action. When the timeout is
    /// hit, it returns the best action found by the previous full
    /// iteration. Unlimited max depth.
    pub fn set_timeout(&mut self, max_time: Duration) {
        self.max_time = max_time;
        self.max_depth = 100;
    }

    /// Stop after exploring roughly this many nodes. Zero means no limit.
    pub fn set_max_nodes(&mut self, nodes: u64) {
        self.max_nodes = nodes;
    }

    /// Stats for the last decision.
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Value of the root as of the last completed iteration.
    pub fn root_value(&self) -> Evaluation {
        unclamp_value(self.prev_value)
    }

    /// Return what the engine considered to be the best sequence of actions
    /// from all sides.
    pub fn principal_variation(&self) -> &[ActionOf<E>] {
        &self.pv[..]
    }

    fn arm_budget(&mut self) {
        self.minimaxer.timeout = if self.max_time == Duration::ZERO {
            Arc::new(AtomicBool::new(false))
        } else {
            timeout_signal(self.max_time)
        };
        self.minimaxer.node_limit = if self.max_nodes == 0 { u64::MAX } else { self.max_nodes };
        self.minimaxer.nodes = 0;
        self.minimaxer.table_hits = 0;
    }

    /// The value of `s` for the agent to move, searched `depth` plies deep.
    ///
    /// Terminal views get their outcome's sentinel at any depth, and depth
    /// zero is the static evaluation.
    pub fn evaluate_root(&mut self, s: &E::V, depth: u8) -> Result<Evaluation> {
        self.arm_budget();
        let mut v = s.clone();
        let agent = v.to_move();
        match self.minimaxer.value(&mut v, agent, depth, 0, WORST_EVAL, BEST_EVAL) {
            Ok(value) => Ok(unclamp_value(value)),
            Err(Abort::Budget) => Err(SearchError::BudgetExhausted),
            Err(Abort::Failed(e)) => Err(e),
        }
    }

    /// Choose an action for the agent to move at `s`.
    pub fn search(&mut self, s: &E::V) -> Result<Choice<ActionOf<E>>> {
        if s.is_terminal() {
            return Err(SearchError::NoLegalActions);
        }
        let mut v = s.clone();
        let agent = v.to_move();
        let fallback = match self.minimaxer.heuristic_order(&v).first() {
            Some(&(_, a)) => a,
            None => return Err(SearchError::NoLegalActions),
        };

        self.minimaxer.table().advance_generation();
        self.stats = SearchStats::default();
        self.pv.clear();
        let start_time = Instant::now();
        self.arm_budget();

        let mut best = None;
        for depth in depth_schedule(&self.opts, self.max_depth) {
            let pass_start = self.minimaxer.nodes;
            match self.minimaxer.search_root(&mut v, agent, depth) {
                Ok((value, m)) => {
                    debug!(
                        depth,
                        value = unclamp_value(value),
                        action = %action_id(&v, Some(m)),
                        nodes = self.minimaxer.nodes - pass_start,
                        "completed search pass"
                    );
                    best = Some((value, m));
                    self.prev_value = value;
                    self.stats.depth = depth;
                    self.stats.nodes_explored = self.minimaxer.nodes;
                    let minimaxer = &self.minimaxer;
                    minimaxer.table().populate_pv(
                        &mut self.pv,
                        &mut v,
                        |v| minimaxer.role_at(v, agent),
                        depth,
                    );
                    if unclamp_value(value).abs() == BEST_EVAL {
                        // Proven win or loss; deeper passes can't change it.
                        break;
                    }
                }
                // Timeout. Keep the best action from the previous depth.
                Err(Abort::Budget) => break,
                Err(Abort::Failed(e)) => return Err(e),
            }
        }

        self.stats.interrupted_nodes = self.minimaxer.nodes - self.stats.nodes_explored;
        self.stats.table_hits = self.minimaxer.table_hits;
        self.stats.wall_time = start_time.elapsed();

        Ok(match best {
            Some((value, action)) => Choice {
                action,
                value: unclamp_value(value),
                depth: self.stats.depth,
                fallback: false,
            },
            None => {
                warn!(
                    nodes = self.minimaxer.nodes,
                    action = %action_id(&v, Some(fallback)),
                    "budget spent before depth 1 completed, using move-ordering fallback"
                );
                Choice {
                    action: fallback,
                    value: self.minimaxer.eval.evaluate(&v, agent),
                    depth: 0,
                    fallback: true,
                }
            }
        })
    }
}

impl<E: Evaluator, P: MovePriority<E::V>> Strategy<E::V> for IterativeSearch<E, P> {
    fn choose_action(&mut self, s: &E::V) -> Result<ActionOf<E>> {
        self.search(s).map(|choice| choice.action)
    }
}
