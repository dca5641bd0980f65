//! The decision unit callers hold: one configured strategy plus its budget.

use crate::config::{AgentConfig, StrategyKind};
use crate::error::{Result, SearchError};
use crate::interface::*;
use crate::strategies::{
    Choice, IterativeSearch, MonteCarlo, Opponent, ParallelOptions, ParallelSearch, Sampled,
    SearchStats,
};

use std::time::Instant;
use tracing::info;

/// One decision and what it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<A> {
    pub action: A,
    /// Search value of `action`. For Monte Carlo, the negated count of
    /// adverse samples.
    pub value: Evaluation,
    pub depth: u8,
    /// The budget ran out before a full iteration; `action` came from move ordering.
    pub fallback: bool,
    pub stats: SearchStats,
}

// Object-safe face of every strategy an agent can drive.
trait DecisionEngine<V: GameView> {
    fn run(&mut self, view: &V) -> Result<Decision<V::Action>>;
}

fn decision<A>(choice: Choice<A>, stats: SearchStats) -> Decision<A> {
    Decision {
        action: choice.action,
        value: choice.value,
        depth: choice.depth,
        fallback: choice.fallback,
        stats,
    }
}

impl<E: Evaluator, P: MovePriority<E::V>> DecisionEngine<E::V> for IterativeSearch<E, P> {
    fn run(&mut self, view: &E::V) -> Result<Decision<ActionOf<E>>> {
        let choice = self.search(view)?;
        Ok(decision(choice, *self.stats()))
    }
}

impl<E, P> DecisionEngine<E::V> for ParallelSearch<E, P>
where
    E: Evaluator + Clone + Sync,
    P: MovePriority<E::V> + Clone + Sync,
    E::V: Send + Sync,
    ActionOf<E>: Send + Sync,
    AgentOf<E>: Send + Sync,
{
    fn run(&mut self, view: &E::V) -> Result<Decision<ActionOf<E>>> {
        let choice = self.search(view)?;
        Ok(decision(choice, *self.stats()))
    }
}

impl<V: Sampled> DecisionEngine<V> for MonteCarlo<V> {
    fn run(&mut self, view: &V) -> Result<Decision<V::Action>> {
        let start = Instant::now();
        let report = self.estimate(view, None)?;
        let chosen = report.estimates.iter().find(|e| e.action == report.chosen);
        let adverse = chosen.map_or(0, |e| e.adverse);
        let stats = SearchStats {
            nodes_explored: report.estimates.iter().map(|e| e.samples as u64).sum(),
            wall_time: start.elapsed(),
            ..SearchStats::default()
        };
        Ok(Decision {
            action: report.chosen,
            value: -(adverse.min(i32::MAX as u32) as Evaluation),
            depth: 0,
            fallback: false,
            stats,
        })
    }
}

/// Chooses one action per call with a strategy fixed at construction.
///
/// The strategy, and with it the transposition table, lives as long as the
/// agent; each decision starts a new table generation.
pub struct SearchAgent<V: GameView> {
    name: String,
    kind: StrategyKind,
    engine: Box<dyn DecisionEngine<V>>,
}

impl<V: GameView + 'static> SearchAgent<V> {
    /// An agent driven by one of the tree searches.
    pub fn from_config<E, P>(
        name: impl Into<String>, config: &AgentConfig, eval: E, priority: P,
    ) -> Result<Self>
    where
        E: Evaluator<V = V> + Clone + Sync + 'static,
        P: MovePriority<V> + Clone + Sync + 'static,
        V: Send + Sync,
        V::Action: Send + Sync,
        V::Agent: Send + Sync,
    {
        config.validate()?;
        let opts = config.search_options();
        let engine: Box<dyn DecisionEngine<V>> = match config.strategy {
            StrategyKind::AlphaBeta | StrategyKind::Expectimax => {
                let opponent = if config.strategy == StrategyKind::Expectimax {
                    Opponent::Stochastic
                } else {
                    Opponent::Adversarial
                };
                let mut search = IterativeSearch::with_opponent(eval, priority, opponent, opts);
                search.set_max_depth(config.max_depth);
                if let Some(limit) = config.time_limit() {
                    search.set_timeout(limit);
                }
                if let Some(nodes) = config.max_nodes {
                    search.set_max_nodes(nodes);
                }
                Box::new(search)
            }
            StrategyKind::ParallelAlphaBeta => {
                let mut par_opts = ParallelOptions::new();
                if let Some(threads) = config.threads {
                    par_opts = par_opts.with_num_threads(threads);
                }
                let mut search = ParallelSearch::with_opponent(
                    eval,
                    priority,
                    Opponent::Adversarial,
                    opts,
                    par_opts,
                )?;
                search.set_max_depth(config.max_depth);
                if let Some(limit) = config.time_limit() {
                    search.set_timeout(limit);
                }
                Box::new(search)
            }
            StrategyKind::MonteCarlo => {
                return Err(SearchError::InvalidConfig(
                    "monte_carlo agents are built with SearchAgent::monte_carlo".into(),
                ))
            }
        };
        Ok(SearchAgent { name: name.into(), kind: config.strategy, engine })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> StrategyKind {
        self.kind
    }

    /// Choose exactly one action at `view`.
    ///
    /// A view with no legal actions is rejected before any search runs, and
    /// failures from the view or the search are passed through unchanged.
    pub fn decide(&mut self, view: &V) -> Result<Decision<V::Action>> {
        let mut actions = Vec::new();
        view.legal_actions(&mut actions);
        if actions.is_empty() {
            return Err(SearchError::NoLegalActions);
        }
        let decision = self.engine.run(view)?;
        info!(
            agent = %self.name,
            strategy = ?self.kind,
            action = %view.notation(decision.action).unwrap_or_else(|| format!("{:?}", decision.action)),
            value = decision.value,
            depth = decision.depth,
            fallback = decision.fallback,
            stats = %decision.stats,
            "decided"
        );
        Ok(decision)
    }
}

impl<V: Sampled + 'static> SearchAgent<V> {
    /// An agent that samples each candidate's immediate risk.
    pub fn monte_carlo(name: impl Into<String>, config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        if config.strategy != StrategyKind::MonteCarlo {
            return Err(SearchError::InvalidConfig(format!(
                "{:?} agents need an evaluator; use SearchAgent::from_config",
                config.strategy
            )));
        }
        let estimator = match config.seed {
            Some(seed) => MonteCarlo::with_seed(config.samples, seed),
            None => MonteCarlo::new(config.samples),
        };
        Ok(SearchAgent { name: name.into(), kind: config.strategy, engine: Box::new(estimator) })
    }
}

impl<V: GameView + 'static> Strategy<V> for SearchAgent<V> {
    fn choose_action(&mut self, view: &V) -> Result<V::Action> {
        self.decide(view).map(|d| d.action)
    }
}
