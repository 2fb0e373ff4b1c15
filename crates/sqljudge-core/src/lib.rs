pub mod compare;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod judge;
pub mod model;
pub mod registry;
pub mod sandbox;
pub mod storage;
pub mod translate;

pub use errors::{ConfigError, EvalError, JudgeError, PersistenceError};
pub use judge::Judge;
