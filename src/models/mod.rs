/// BERT variants
pub mod bert;

/// Prediction heads shared across model families
pub mod heads;
