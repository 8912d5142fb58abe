//! Health evaluator (C5).

pub mod operations;

pub use operations::{evaluate, transition_state};
