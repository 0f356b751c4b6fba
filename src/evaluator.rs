mod eval;

pub use eval::{evaluate, Evaluator};
