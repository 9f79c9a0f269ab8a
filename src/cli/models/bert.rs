use std::collections::HashMap;

use lazy_static::lazy_static;

/// Model Variants
/// --------------

/// The base model type
pub static MODEL_TYPE: &str = "bert";

/// bert-base-uncased
pub static BASE_UNCASED: &str = "bert-base-uncased";

/// bert-base-cased
pub static BASE_CASED: &str = "bert-base-cased";

/// bert-base-multilingual-cased
pub static BASE_MULTILINGUAL_CASED: &str = "bert-base-multilingual-cased";

/// bert-base-german-cased
pub static BASE_GERMAN_CASED: &str = "bert-base-german-cased";

/// All available BERT models
pub static ALL_MODELS: &[&str; 4] = &[
    BASE_UNCASED,
    BASE_CASED,
    BASE_MULTILINGUAL_CASED,
    BASE_GERMAN_CASED,
];

/// Token Classification
/// --------------------

/// The default model to use
pub static DEFAULT_TOKEN_CLASSIFICATION_MODEL: &str = BASE_MULTILINGUAL_CASED;

lazy_static! {
    /// Whether each model expects lower-cased input
    pub static ref LOWER_CASE: HashMap<&'static str, bool> = [
        (BASE_UNCASED, true),
        (BASE_CASED, false),
        (BASE_MULTILINGUAL_CASED, false),
        (BASE_GERMAN_CASED, false),
    ]
    .iter()
    .copied()
    .collect();
}
