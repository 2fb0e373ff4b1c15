pub mod runner;

pub use runner::Evaluator;
