pub mod engine;
pub mod ranker;
