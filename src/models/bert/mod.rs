/// BERT for Token Classification (such as named entity recognition)
pub mod token_classification;
