//! Domain layer: violations, reports and the token model shared by scanner and evaluator

pub mod tokens;
pub mod violations;
