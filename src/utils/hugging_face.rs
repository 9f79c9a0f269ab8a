use std::path::PathBuf;

use hf_hub::api::tokio;

/// Local paths to the files needed to fine-tune a pretrained model
#[derive(Debug, Clone)]
pub struct PretrainedFiles {
    /// The Hugging Face model config
    pub config: PathBuf,

    /// The model weights
    pub weights: PathBuf,

    /// The serialized tokenizer
    pub tokenizer: PathBuf,
}

/// Download model config, weights and tokenizer from Hugging Face Hub
/// If a file exists in the cache, it will not be downloaded again
// NOTE: Modified from the built-in function to work within an already-async context
pub async fn download_hf_model(model_name: &str) -> anyhow::Result<PretrainedFiles> {
    let api = tokio::Api::new()?;
    let repo = api.model(model_name.to_string());

    let weights = repo.get("model.safetensors").await.map_err(|e| {
        anyhow!(
            "Failed to download: {} weights with name: model.safetensors from HuggingFace Hub: {}",
            model_name,
            e
        )
    })?;

    let config = repo.get("config.json").await.map_err(|e| {
        anyhow!(
            "Failed to download: {} config with name: config.json from HuggingFace Hub: {}",
            model_name,
            e
        )
    })?;

    let tokenizer = download_hf_tokenizer(model_name).await?;

    Ok(PretrainedFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Download only the tokenizer definition for a model
pub async fn download_hf_tokenizer(model_name: &str) -> anyhow::Result<PathBuf> {
    let api = tokio::Api::new()?;
    let repo = api.model(model_name.to_string());

    repo.get("tokenizer.json").await.map_err(|e| {
        anyhow!(
            "Failed to download: {} tokenizer with name: tokenizer.json from HuggingFace Hub: {}",
            model_name,
            e
        )
    })
}
