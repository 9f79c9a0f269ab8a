use std::fmt::Display;

/// CLI Indexes: BERT models
pub mod bert;

/// Available Models
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Model {
    /// The BERT family of models, with the specific model name contained within
    Bert(String),
}

impl Model {
    /// Get the model type
    pub fn model_type(&self) -> &str {
        match self {
            Model::Bert(_) => bert::MODEL_TYPE,
        }
    }

    /// Whether the model's tokenizer expects lower-cased input
    pub fn do_lower_case(&self) -> bool {
        match self {
            Model::Bert(name) => bert::LOWER_CASE.get(name.as_str()).copied().unwrap_or(false),
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Bert(bert::DEFAULT_TOKEN_CLASSIFICATION_MODEL.to_string())
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Model::Bert(name) = self;

        write!(f, "{}", name)
    }
}

impl TryFrom<&str> for Model {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if bert::ALL_MODELS.contains(&value) {
            Ok(Model::Bert(value.to_string()))
        } else {
            Err(ModelError::Unknown(value.to_string()))
        }
    }
}

/// Model Error
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// No model found for the given string
    #[error("no model found for {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_model_lookup() -> anyhow::Result<()> {
        let model = Model::try_from("bert-base-uncased")?;

        assert_eq!(model.model_type(), "bert");
        assert!(model.do_lower_case());
        assert!(!Model::default().do_lower_case());
        assert_eq!(Model::default().to_string(), "bert-base-multilingual-cased");
        assert!(Model::try_from("gpt2").is_err());

        Ok(())
    }
}
