//! Strategy: pricing the round trip around a triangle.

pub mod evaluator;

pub use evaluator::{Evaluation, ProfitEvaluator};
