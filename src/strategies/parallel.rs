//! Iterative deepening with each iteration's root executed in parallel.
//!
//! This uses the Young Brothers Wait Concept at the root: the best guess
//! action is searched serially first, then all other actions are searched
//! in parallel using rayon. Every worker owns a clone of the view and its own
//! recursion; they share a sharded transposition table and the best value so
//! far, which tightens each sibling's window as results come in.

use super::iterative::{depth_schedule, Minimaxer, Opponent, SearchOptions};
use super::table::*;
use super::util::*;
use super::{Choice, SearchStats};
use crate::error::{Result, SearchError};
use crate::interface::*;

use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// Work done by the root and every worker in one search.
#[derive(Default)]
struct Tally {
    nodes: AtomicU64,
    table_hits: AtomicU64,
}

impl Tally {
    fn add(&self, nodes: u64, table_hits: u64) {
        self.nodes.fetch_add(nodes, Ordering::Relaxed);
        self.table_hits.fetch_add(table_hits, Ordering::Relaxed);
    }
}

/// Options to use for the parallel search engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelOptions {
    num_threads: Option<usize>,
}

impl ParallelOptions {
    pub fn new() -> Self {
        ParallelOptions { num_threads: None }
    }

    /// Set the total number of threads to use. Otherwise defaults to num_cpus.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }
}

pub struct ParallelSearch<E: Evaluator, P = NaturalOrder> {
    max_depth: u8,
    max_time: Duration,
    table: Arc<ShardedTable<ActionOf<E>>>,
    eval: E,
    priority: P,
    opponent: Role,
    prev_value: Evaluation,

    thread_pool: rayon::ThreadPool,
    opts: SearchOptions,

    stats: SearchStats,
    pv: Vec<ActionOf<E>>,
}

impl<E> ParallelSearch<E>
where
    E: Evaluator + Clone + Sync,
    E::V: Send + Sync,
    ActionOf<E>: Send + Sync,
    AgentOf<E>: Send + Sync,
{
    pub fn new(eval: E, opts: SearchOptions, par_opts: ParallelOptions) -> Result<Self> {
        Self::with_opponent(eval, NaturalOrder, Opponent::Adversarial, opts, par_opts)
    }
}

impl<E, P> ParallelSearch<E, P>
where
    E: Evaluator + Clone + Sync,
    P: MovePriority<E::V> + Clone + Sync,
    E::V: Send + Sync,
    ActionOf<E>: Send + Sync,
    AgentOf<E>: Send + Sync,
{
    pub fn with_opponent(
        eval: E, priority: P, opponent: Opponent, opts: SearchOptions, par_opts: ParallelOptions,
    ) -> Result<Self> {
        let num_threads = par_opts.num_threads.unwrap_or_else(num_cpus::get);
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| SearchError::InvalidConfig(format!("thread pool: {}", e)))?;
        Ok(ParallelSearch {
            max_depth: 4,
            max_time: Duration::ZERO,
            table: Arc::new(ShardedTable::new(opts.table_byte_size)),
            eval,
            priority,
            opponent: opponent.role(),
            prev_value: 0,
            thread_pool,
            opts,
            stats: SearchStats::default(),
            pv: Vec::new(),
        })
    }

    /// Set the maximum depth to search. Disables the timeout.
    pub fn set_max_depth(&mut self, depth: u8) {
        self.max_depth = depth;
        self.max_time = Duration::ZERO;
    }

    /// Set the maximum time to compute the best action. Unlimited max depth.
    pub fn set_timeout(&mut self, max_time: Duration) {
        self.max_time = max_time;
        self.max_depth = 100;
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn root_value(&self) -> Evaluation {
        unclamp_value(self.prev_value)
    }

    pub fn principal_variation(&self) -> &[ActionOf<E>] {
        &self.pv[..]
    }

    fn minimaxer(
        &self, timeout: &Arc<AtomicBool>,
    ) -> Minimaxer<E, P, Arc<ShardedTable<ActionOf<E>>>> {
        let mut m = Minimaxer::new(
            self.table.clone(),
            self.eval.clone(),
            self.priority.clone(),
            self.opponent,
            self.opts,
        );
        m.timeout = timeout.clone();
        m
    }

    // One iteration at `depth`. Workers search with alpha one below the best
    // value seen so far, so any sibling that ties the best comes back exact.
    fn search_root(
        &self, v: &E::V, agent: AgentOf<E>, depth: u8, timeout: &Arc<AtomicBool>,
        tally: &Tally,
    ) -> std::result::Result<(Evaluation, ActionOf<E>), Abort> {
        let mut root = self.minimaxer(timeout);
        let ordered = root.root_order(v);
        let (&(first_index, first_move), rest) =
            ordered.split_first().ok_or(Abort::Failed(SearchError::NoLegalActions))?;

        // Evaluate first move serially.
        let mut state = v.clone();
        let initial = with_applied(&mut state, first_move, |s| {
            root.value(s, agent, depth - 1, 1, WORST_EVAL, BEST_EVAL)
        });
        tally.add(root.nodes, root.table_hits);
        let initial = initial?;

        let best_value = AtomicI32::new(initial);
        let best = Mutex::new(ValueMove::new(initial, first_move, first_index));
        rest.par_iter().with_max_len(1).try_for_each(|&(index, m)| {
            let mut worker = self.minimaxer(timeout);
            let alpha = if self.opts.pruning {
                best_value.load(Ordering::SeqCst).saturating_sub(1)
            } else {
                WORST_EVAL
            };
            let mut state = v.clone();
            let value = with_applied(&mut state, m, |s| {
                worker.value(s, agent, depth - 1, 1, alpha, BEST_EVAL)
            });
            tally.add(worker.nodes, worker.table_hits);
            let value = value?;
            best_value.fetch_max(value, Ordering::SeqCst);
            best.lock().max(value, m, index);
            Ok::<(), Abort>(())
        })?;

        let (value, m) = best.into_inner().into_inner();
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

    /// Choose an action for the agent to move at `s`.
    pub fn search(&mut self, s: &E::V) -> Result<Choice<ActionOf<E>>> {
        if s.is_terminal() {
            return Err(SearchError::NoLegalActions);
        }
        let timeout = if self.max_time == Duration::ZERO {
            Arc::new(AtomicBool::new(false))
        } else {
            timeout_signal(self.max_time)
        };
        let mut v = s.clone();
        let agent = v.to_move();
        let helper = self.minimaxer(&timeout);
        let fallback = match helper.heuristic_order(&v).first() {
            Some(&(_, a)) => a,
            None => return Err(SearchError::NoLegalActions),
        };

        self.table.advance_generation();
        self.stats = SearchStats::default();
        self.pv.clear();
        let start_time = Instant::now();
        let tally = Tally::default();

        let mut best = None;
        for depth in depth_schedule(&self.opts, self.max_depth) {
            let result =
                self.thread_pool.install(|| self.search_root(&v, agent, depth, &timeout, &tally));
            match result {
                Ok((value, m)) => {
                    let explored = tally.nodes.load(Ordering::Relaxed);
                    debug!(
                        depth,
                        value = unclamp_value(value),
                        action = %action_id(&v, Some(m)),
                        nodes = explored - self.stats.nodes_explored,
                        "completed parallel search pass"
                    );
                    best = Some((value, m));
                    self.prev_value = value;
                    self.stats.depth = depth;
                    self.stats.nodes_explored = explored;
                    self.table.populate_pv(
                        &mut self.pv,
                        &mut v,
                        |v| helper.role_at(v, agent),
                        depth,
                    );
                    if unclamp_value(value).abs() == BEST_EVAL {
                        break;
                    }
                }
                // Timeout. Keep the best action from the previous depth.
                Err(Abort::Budget) => break,
                Err(Abort::Failed(e)) => return Err(e),
            }
        }

        self.stats.interrupted_nodes =
            tally.nodes.load(Ordering::Relaxed) - self.stats.nodes_explored;
        self.stats.table_hits = tally.table_hits.load(Ordering::Relaxed);
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
                    action = %action_id(&v, Some(fallback)),
                    "deadline passed before depth 1 completed, using move-ordering fallback"
                );
                Choice {
                    action: fallback,
                    value: self.eval.evaluate(&v, agent),
                    depth: 0,
                    fallback: true,
                }
            }
        })
    }
}

impl<E, P> Strategy<E::V> for ParallelSearch<E, P>
where
    E: Evaluator + Clone + Sync,
    P: MovePriority<E::V> + Clone + Sync,
    E::V: Send + Sync,
    ActionOf<E>: Send + Sync,
    AgentOf<E>: Send + Sync,
{
    fn choose_action(&mut self, s: &E::V) -> Result<ActionOf<E>> {
        self.search(s).map(|choice| choice.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::lines::LineEvaluator;
    use crate::games::connect4::{Board, Disc};
    use crate::strategies::IterativeSearch;

    #[test]
    fn matches_serial_search() {
        let b = Board::from_diagram(
            ".......\n\
             .......\n\
             .......\n\
             ...Y...\n\
             ..RR...\n\
             .YRY...",
            Disc::Red,
        )
        .unwrap();
        for depth in 1..=4 {
            let mut serial =
                IterativeSearch::new(LineEvaluator::<Board>::new(4), SearchOptions::new());
            serial.set_max_depth(depth);
            let mut parallel = ParallelSearch::new(
                LineEvaluator::<Board>::new(4),
                SearchOptions::new(),
                ParallelOptions::new().with_num_threads(3),
            )
            .unwrap();
            parallel.set_max_depth(depth);
            assert_eq!(serial.search(&b).unwrap(), parallel.search(&b).unwrap());
            assert_eq!(parallel.stats().depth, serial.stats().depth);
        }
    }

    #[test]
    fn terminal_root_is_rejected() {
        let b = Board::from_diagram(
            ".......\n\
             .......\n\
             .......\n\
             .......\n\
             YYY....\n\
             RRRR...",
            Disc::Yellow,
        )
        .unwrap();
        let mut parallel = ParallelSearch::new(
            LineEvaluator::<Board>::new(4),
            SearchOptions::new(),
            ParallelOptions::new(),
        )
        .unwrap();
        assert_eq!(parallel.search(&b), Err(SearchError::NoLegalActions));
    }

    #[test]
    fn counts_table_hits_from_every_worker() {
        let b = Board::default();
        let searcher = |opts| {
            let mut p = ParallelSearch::new(
                LineEvaluator::<Board>::new(4),
                opts,
                ParallelOptions::new().with_num_threads(2),
            )
            .unwrap();
            p.set_max_depth(4);
            p
        };

        // The second search finds the first one's entries.
        let mut parallel = searcher(SearchOptions::new());
        parallel.search(&b).unwrap();
        parallel.search(&b).unwrap();
        assert!(parallel.stats().table_hits > 0);

        let mut untabled = searcher(SearchOptions::new().with_table(false));
        untabled.search(&b).unwrap();
        untabled.search(&b).unwrap();
        assert_eq!(untabled.stats().table_hits, 0);
        assert!(untabled.stats().nodes_explored > 0);
    }
}
