//! A Monte Carlo agent sweeps a beginner field, always stepping on the
//! square that the fewest sampled layouts put a mine under.

extern crate gametree;
extern crate rand;

use gametree::games::minesweeper::Minefield;
use gametree::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gametree=info".parse().unwrap()),
        )
        .init();

    let seed = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(7);
    let mut field = Minefield::new(9, 9, 10, &mut StdRng::seed_from_u64(seed)).unwrap();
    let config = AgentConfig::new(StrategyKind::MonteCarlo).with_samples(20).with_seed(seed);
    let mut agent = SearchAgent::<Minefield>::monte_carlo("sweeper", &config).unwrap();

    while !field.is_terminal() {
        let decision = agent.decide(&field).unwrap();
        println!(
            "({}, {}): {} of {} samples hit a mine",
            decision.action.row,
            decision.action.col,
            -decision.value,
            config.samples
        );
        field.apply(decision.action).unwrap();
        println!("{}", field);
    }
    match field.outcome(()) {
        Outcome::Win => println!("Cleared the field"),
        _ => println!("Boom"),
    }
}
