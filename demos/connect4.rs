//! Two agents play connect four. Set RUST_LOG=gametree=debug to watch the
//! iterative deepening passes.

extern crate gametree;

use gametree::evaluators::LineEvaluator;
use gametree::games::connect4::{Board, Disc};
use gametree::*;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gametree=info".parse().unwrap()),
        )
        .init();

    let mut b = Board::default();
    let eval = LineEvaluator::<Board>::new(4).with_weight(4);
    let red = AgentConfig::new(StrategyKind::ParallelAlphaBeta)
        .with_time_limit(Duration::from_millis(500));
    let yellow = AgentConfig::from_toml_str(
        r#"
        strategy = "alpha_beta"
        max_depth = 6
        replacement = "depth_preferred"
        "#,
    )
    .unwrap();
    let mut agents = [
        SearchAgent::from_config("red", &red, eval.clone(), b.center_first()).unwrap(),
        SearchAgent::from_config("yellow", &yellow, eval, b.center_first()).unwrap(),
    ];

    while !b.is_terminal() {
        println!("{}", b);
        let agent = match b.to_move() {
            Disc::Red => &mut agents[0],
            Disc::Yellow => &mut agents[1],
        };
        let decision = agent.decide(&b).unwrap();
        println!(
            "{} plays column {} (value {}, {})",
            agent.name(),
            decision.action.0 + 1,
            decision.value,
            decision.stats
        );
        b.apply(decision.action).unwrap();
    }
    println!("{}", b);
    match b.winner() {
        Some(disc) => println!("{:?} wins", disc),
        None => println!("Draw"),
    }
}
