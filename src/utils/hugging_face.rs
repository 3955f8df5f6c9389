use std::path::PathBuf;

use hf_hub::api::tokio::Api;

/// Download a model's `config.json` from the Hugging Face Hub
/// If the file exists in the cache, it will not be downloaded again
pub async fn download_hf_config(model_name: &str) -> anyhow::Result<PathBuf> {
    let api = Api::new()?;
    let repo = api.model(model_name.to_string());

    let config_filepath = repo.get("config.json").await.map_err(|e| {
        anyhow!(
            "Failed to download: {} config with name: config.json from HuggingFace Hub: {}",
            model_name,
            e
        )
    })?;

    Ok(config_filepath)
}
