pub mod data;
pub mod ev_calculator;
pub mod market_probs;
pub mod pipeline;
pub mod poisson;
pub mod predictor;
pub mod quotes;
pub mod staking;
pub mod value_bets;
