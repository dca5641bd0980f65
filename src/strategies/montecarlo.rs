//! One-step risk estimation by sampling.
//!
//! Each candidate action is simulated a fixed number of times with any hidden
//! state drawn fresh per trial, and the candidate that led to the adverse
//! event least often is chosen. There is no tree search here.

use crate::error::{Result, SearchError};
use crate::interface::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;
use tracing::debug;

/// A view whose actions can be simulated with hidden state re-drawn.
pub trait Sampled: GameView {
    /// A successor with `action` applied, after re-deriving any hidden state
    /// consistently with what is visible. Each call is an independent trial.
    fn sample<R: Rng + ?Sized>(&self, action: Self::Action, rng: &mut R) -> Result<Self>;

    /// Whether this sampled successor shows the adverse event for `action`,
    /// the action that produced it.
    fn is_adverse(&self, action: Self::Action) -> bool;
}

/// How often one candidate led to the adverse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskEstimate<A> {
    pub action: A,
    pub adverse: u32,
    pub samples: u32,
}

impl<A> RiskEstimate<A> {
    pub fn probability(&self) -> f64 {
        self.adverse as f64 / self.samples as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskReport<A> {
    /// The candidate with the fewest adverse outcomes, earliest on ties.
    pub chosen: A,
    /// One estimate per candidate, in candidate order.
    pub estimates: Vec<RiskEstimate<A>>,
}

pub struct MonteCarlo<V> {
    samples: u32,
    rng: StdRng,
    view: PhantomData<fn(&V)>,
}

impl<V: Sampled> MonteCarlo<V> {
    /// Estimator drawing `samples` trials per candidate from an entropy-seeded generator.
    pub fn new(samples: u32) -> Self {
        Self::from_rng(samples, StdRng::from_entropy())
    }

    /// Reproducible estimator.
    pub fn with_seed(samples: u32, seed: u64) -> Self {
        Self::from_rng(samples, StdRng::seed_from_u64(seed))
    }

    fn from_rng(samples: u32, rng: StdRng) -> Self {
        MonteCarlo { samples, rng, view: PhantomData }
    }

    /// Estimate the risk of each candidate. With no candidates given, every
    /// legal action at `view` is a candidate.
    pub fn estimate(
        &mut self, view: &V, candidates: Option<&[V::Action]>,
    ) -> Result<RiskReport<V::Action>> {
        if self.samples == 0 {
            return Err(SearchError::InvalidConfig("monte carlo needs at least one sample".into()));
        }
        let mut legal = Vec::new();
        let candidates = match candidates {
            Some(c) => c,
            None => {
                view.legal_actions(&mut legal);
                &legal[..]
            }
        };

        let mut estimates: Vec<RiskEstimate<V::Action>> = Vec::with_capacity(candidates.len());
        let mut best: Option<usize> = None;
        for &action in candidates {
            let mut adverse = 0;
            for _ in 0..self.samples {
                if view.sample(action, &mut self.rng)?.is_adverse(action) {
                    adverse += 1;
                }
            }
            let estimate = RiskEstimate { action, adverse, samples: self.samples };
            // Strictly fewer, so the first-seen candidate wins ties.
            if best.map_or(true, |b| adverse < estimates[b].adverse) {
                best = Some(estimates.len());
            }
            estimates.push(estimate);
        }

        let chosen = match best {
            Some(b) => estimates[b],
            None => return Err(SearchError::NoLegalActions),
        };
        debug!(
            action = ?chosen.action,
            risk = chosen.probability(),
            candidates = estimates.len(),
            "estimated action risk"
        );
        Ok(RiskReport { chosen: chosen.action, estimates })
    }
}

impl<V: Sampled> Strategy<V> for MonteCarlo<V> {
    fn choose_action(&mut self, view: &V) -> Result<V::Action> {
        self.estimate(view, None).map(|report| report.chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Picking a lever trips a trap with a fixed probability.
    #[derive(Clone)]
    struct Levers {
        risk: Vec<f64>,
        tripped: Option<bool>,
    }

    impl GameView for Levers {
        type Action = usize;
        type Agent = ();

        fn legal_actions(&self, actions: &mut Vec<usize>) {
            if self.tripped.is_none() {
                actions.extend(0..self.risk.len());
            }
        }

        fn apply(&mut self, action: usize) -> Result<()> {
            if action >= self.risk.len() {
                return Err(SearchError::InvalidAction(action.to_string()));
            }
            self.tripped = Some(self.risk[action] >= 1.0);
            Ok(())
        }

        fn undo(&mut self, _: usize) {
            self.tripped = None;
        }

        fn is_terminal(&self) -> bool {
            self.tripped.is_some()
        }

        fn outcome(&self, _: ()) -> Outcome {
            if self.tripped == Some(true) { Outcome::Loss } else { Outcome::Draw }
        }

        fn to_move(&self) {}

        fn position_key(&self) -> u64 {
            self.tripped.map_or(0, |t| 1 + t as u64)
        }
    }

    impl Sampled for Levers {
        fn sample<R: Rng + ?Sized>(&self, action: usize, rng: &mut R) -> Result<Self> {
            let p = *self
                .risk
                .get(action)
                .ok_or_else(|| SearchError::InvalidAction(action.to_string()))?;
            let mut next = self.clone();
            next.tripped = Some(rng.gen_bool(p));
            Ok(next)
        }

        fn is_adverse(&self, _: usize) -> bool {
            self.tripped == Some(true)
        }
    }

    fn levers(risk: &[f64]) -> Levers {
        Levers { risk: risk.to_vec(), tripped: None }
    }

    #[test]
    fn certain_and_impossible_hazards() {
        let mut mc = MonteCarlo::with_seed(5, 1);
        let report = mc.estimate(&levers(&[1.0, 0.0]), None).unwrap();
        assert_eq!(report.chosen, 1);
        assert_eq!(report.estimates[0].probability(), 1.0);
        assert_eq!(report.estimates[1].probability(), 0.0);
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let mut mc = MonteCarlo::with_seed(3, 7);
        let v = levers(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(mc.estimate(&v, Some(&[3, 1, 2][..])).unwrap().chosen, 3);
        assert_eq!(mc.choose_action(&v).unwrap(), 1);
    }

    #[test]
    fn seeded_runs_repeat() {
        let v = levers(&[0.5, 0.4, 0.6]);
        let a = MonteCarlo::with_seed(50, 99).estimate(&v, None).unwrap();
        let b = MonteCarlo::with_seed(50, 99).estimate(&v, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_input() {
        let v = levers(&[0.5]);
        assert!(matches!(
            MonteCarlo::with_seed(0, 0).estimate(&v, None),
            Err(SearchError::InvalidConfig(_))
        ));
        assert_eq!(
            MonteCarlo::with_seed(1, 0).estimate(&v, Some(&[][..])),
            Err(SearchError::NoLegalActions)
        );
        assert_eq!(
            MonteCarlo::with_seed(1, 0).estimate(&v, Some(&[4][..])),
            Err(SearchError::InvalidAction("4".into()))
        );
    }
}
